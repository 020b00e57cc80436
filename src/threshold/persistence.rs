//! Adaptive threshold file persistence (SPEC_FULL.md #4.D.1): the same
//! atomic-write-plus-backup discipline as [`crate::calibration::persistence`],
//! applied to the base [`ThresholdSet`] and learned per-context feedback
//! table instead of calibration parameters.

use super::{context_key, AdaptiveThresholdService, FeedbackStats, ThresholdSet};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const DEFAULT_MAX_BACKUPS: usize = 5;
const DEFAULT_STALENESS_DAYS: i64 = 7;
pub const THRESHOLD_SCHEMA_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ThresholdMetadata {
    version: String,
    saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ThresholdFile {
    metadata: ThresholdMetadata,
    base: ThresholdSet,
    #[serde(default)]
    feedback: HashMap<String, FeedbackStats>,
}

/// Serializes an [`AdaptiveThresholdService`]'s base thresholds and learned
/// feedback table to the spec's JSON schema.
pub fn export(service: &AdaptiveThresholdService) -> String {
    let file = ThresholdFile {
        metadata: ThresholdMetadata {
            version: THRESHOLD_SCHEMA_VERSION.to_string(),
            saved_at: Utc::now(),
        },
        base: service.base(),
        feedback: service.feedback_snapshot(),
    };
    serde_json::to_string_pretty(&file).expect("ThresholdFile is always serializable")
}

/// Parses a threshold JSON document. Rejects a major-version mismatch
/// against [`THRESHOLD_SCHEMA_VERSION`].
pub fn import(json: &str) -> Result<AdaptiveThresholdService> {
    let file: ThresholdFile = serde_json::from_str(json)?;
    check_version(&file.metadata.version)?;
    warn_if_stale(file.metadata.saved_at, DEFAULT_STALENESS_DAYS);
    Ok(AdaptiveThresholdService::from_parts(file.base, file.feedback))
}

fn check_version(version: &str) -> Result<()> {
    let expected_major = THRESHOLD_SCHEMA_VERSION.split('.').next().unwrap_or("0");
    let got_major = version.split('.').next().unwrap_or("0");
    if expected_major != got_major {
        return Err(Error::ConfigError(format!(
            "adaptive threshold file schema version {version} is incompatible with {THRESHOLD_SCHEMA_VERSION}"
        )));
    }
    Ok(())
}

fn warn_if_stale(saved_at: DateTime<Utc>, staleness_days: i64) {
    let age = Utc::now().signed_duration_since(saved_at);
    if age.num_days() > staleness_days {
        log::warn!(
            "adaptive thresholds are {} days old (staleness window is {} days)",
            age.num_days(),
            staleness_days
        );
    }
}

/// Default on-disk location: `$CONFIG_DIR/adaptive-thresholds.json`, falling
/// back to the current directory when `CONFIG_DIR` is unset.
pub fn default_path() -> PathBuf {
    let dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| ".".to_string());
    Path::new(&dir).join("adaptive-thresholds.json")
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
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("adaptive-thresholds");
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
