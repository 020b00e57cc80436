//! Calibration file persistence (SPEC_FULL.md #4.C.1): atomic write with
//! timestamped backups, schema-versioned JSON, staleness warning.

use super::types::{
    CalibrationMetadata, CalibrationMethod, CalibrationParameters, ReliabilityMetrics,
    CALIBRATION_SCHEMA_VERSION,
};
use super::Calibrator;
use crate::error::{Error, Result};
use crate::span::FilterType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const DEFAULT_MAX_BACKUPS: usize = 5;
const DEFAULT_STALENESS_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CalibrationFile {
    metadata: CalibrationMetadata,
    parameters: CalibrationParameters,
    #[serde(default)]
    per_filter: HashMap<String, CalibrationParameters>,
}

/// Serializes a fitted [`Calibrator`] to the spec's JSON schema. Returns
/// `None` if the calibrator has not been fit (nothing to export).
pub fn export(calibrator: &Calibrator, source_files: Vec<String>) -> Option<String> {
    let parameters = calibrator.global_parameters()?.clone();
    let metrics = calibrator.global_metrics();
    let preferred_method = parameters.method();

    let per_filter: HashMap<String, CalibrationParameters> = calibrator
        .per_filter_parameters()
        .map(|(ft, p)| (ft.tag().to_string(), p.clone()))
        .collect();

    let file = CalibrationFile {
        metadata: CalibrationMetadata {
            version: CALIBRATION_SCHEMA_VERSION.to_string(),
            fitted_at: Utc::now(),
            data_point_count: 0,
            preferred_method,
            metrics,
            source_files,
        },
        parameters,
        per_filter,
    };

    serde_json::to_string_pretty(&file).ok()
}

/// Parses a calibration JSON document. Rejects a major-version mismatch
/// against [`CALIBRATION_SCHEMA_VERSION`].
pub fn import(json: &str) -> Result<Calibrator> {
    let file: CalibrationFile = serde_json::from_str(json)?;
    check_version(&file.metadata.version)?;
    warn_if_stale(file.metadata.fitted_at, DEFAULT_STALENESS_DAYS);

    let mut calibrator = Calibrator::new();
    calibrator.load_fitted(file.parameters, file.metadata.metrics.unwrap_or_default(), parse_per_filter(file.per_filter));
    Ok(calibrator)
}

fn parse_per_filter(
    raw: HashMap<String, CalibrationParameters>,
) -> HashMap<FilterType, CalibrationParameters> {
    raw.into_iter()
        .filter_map(|(tag, params)| filter_type_from_tag(&tag).map(|ft| (ft, params)))
        .collect()
}

fn filter_type_from_tag(tag: &str) -> Option<FilterType> {
    use FilterType::*;
    [
        Name, Date, Ssn, Mrn, Phone, Fax, Email, Address, Zipcode, City, State, Age, Account,
        HealthPlan, License, Npi, Dea, Ip, Url, CreditCard, Vehicle, Device, Biometric, Passport,
    ]
    .into_iter()
    .find(|ft| ft.tag() == tag)
}

fn check_version(version: &str) -> Result<()> {
    let expected_major = CALIBRATION_SCHEMA_VERSION.split('.').next().unwrap_or("0");
    let got_major = version.split('.').next().unwrap_or("0");
    if expected_major != got_major {
        return Err(Error::ConfigError(format!(
            "calibration file schema version {version} is incompatible with {CALIBRATION_SCHEMA_VERSION}"
        )));
    }
    Ok(())
}

fn warn_if_stale(fitted_at: DateTime<Utc>, staleness_days: i64) {
    let age = Utc::now().signed_duration_since(fitted_at);
    if age.num_days() > staleness_days {
        log::warn!(
            "calibration parameters are {} days old (staleness window is {} days)",
            age.num_days(),
            staleness_days
        );
    }
}

/// Writes `contents` to `path` atomically (temp file + rename), then rotates
/// up to `max_backups` timestamped copies of the previous file alongside it.
pub fn save_atomic(path: &Path, contents: &str, max_backups: usize) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    if path.exists() {
        rotate_backup(path, max_backups)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn save_atomic_default(path: &Path, contents: &str) -> Result<()> {
    save_atomic(path, contents, DEFAULT_MAX_BACKUPS)
}

fn rotate_backup(path: &Path, max_backups: usize) -> Result<()> {
    if max_backups == 0 {
        return Ok(());
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("calibration");
    let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let timestamp = Utc::now().timestamp();
    let backup_path = parent.join(format!("{stem}-backup-{timestamp}.json"));
    std::fs::copy(path, &backup_path)?;
    prune_old_backups(&parent, stem, max_backups)
}

fn prune_old_backups(dir: &Path, stem: &str, max_backups: usize) -> Result<()> {
    let prefix = format!("{stem}-backup-");
    let mut backups: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(&prefix))
                .unwrap_or(false)
        })
        .collect();
    backups.sort();
    while backups.len() > max_backups {
        let oldest = backups.remove(0);
        let _ = std::fs::remove_file(oldest);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationDataPoint;

    fn fitted_calibrator() -> Calibrator {
        let mut calibrator = Calibrator::new();
        let points: Vec<CalibrationDataPoint> = (0..60)
            .map(|i| {
                let x = i as f64 / 60.0;
                CalibrationDataPoint { confidence: x, is_actual_phi: x > 0.5, filter_type: None }
            })
            .collect();
        calibrator.fit(CalibrationMethod::Platt, &points).unwrap();
        calibrator
    }

    #[test]
    fn export_then_import_round_trips_calibration_behavior() {
        let original = fitted_calibrator();
        let json = export(&original, vec!["synthetic".into()]).unwrap();
        let restored = import(&json).unwrap();
        for x in [0.1, 0.3, 0.5, 0.7, 0.9] {
            assert!((original.calibrate(x, None) - restored.calibrate(x, None)).abs() < 1e-9);
        }
    }

    #[test]
    fn import_rejects_major_version_mismatch() {
        let original = fitted_calibrator();
        let json = export(&original, vec![]).unwrap();
        let bumped = json.replace("\"1.0.0\"", "\"2.0.0\"");
        let err = import(&bumped).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn save_atomic_creates_file_and_rotates_backups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibration.json");
        save_atomic(&path, "{}", 2).unwrap();
        assert!(path.exists());
        save_atomic(&path, "{\"a\":1}", 2).unwrap();
        let backups: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("backup"))
            .collect();
        assert_eq!(backups.len(), 1);
    }
}
