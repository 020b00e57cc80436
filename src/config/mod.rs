//! Configuration snapshot assembled from environment variables (spec.md #6).

use crate::calibration::CalibrationMethod;
use std::sync::Arc;

/// Feature toggles read from `ENABLE_*` env vars (spec.md #6).
#[derive(Debug, Clone, Copy)]
pub struct FeatureFlags {
    pub datalog: bool,
    pub dfa_scan: bool,
    pub context_modifier: bool,
    pub optimized_weights: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            datalog: true,
            dfa_scan: false,
            context_modifier: true,
            optimized_weights: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CachePaths {
    pub config_dir: Option<String>,
    pub calibration_dir: Option<String>,
    pub prewarm_file: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    pub max_exact: usize,
    pub max_structure: usize,
    pub ttl_ms: u64,
    pub max_bytes: usize,
    pub min_similarity: f64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_exact: crate::cache::DEFAULT_MAX_EXACT_ENTRIES,
            max_structure: crate::cache::DEFAULT_MAX_STRUCTURE_ENTRIES,
            ttl_ms: crate::cache::DEFAULT_TTL.as_millis() as u64,
            max_bytes: crate::cache::DEFAULT_MAX_MEMORY_BYTES,
            min_similarity: crate::cache::DEFAULT_MIN_STRUCTURE_SIMILARITY,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TargetMetrics {
    pub calibration_method: CalibrationMethod,
    pub calibration_min_points: usize,
    pub adaptive_target_sensitivity: f64,
    pub adaptive_target_specificity: f64,
}

impl Default for TargetMetrics {
    fn default() -> Self {
        Self {
            calibration_method: CalibrationMethod::Platt,
            calibration_min_points: crate::calibration::DEFAULT_MIN_DATA_POINTS,
            adaptive_target_sensitivity: crate::threshold::DEFAULT_TARGET_SENSITIVITY,
            adaptive_target_specificity: crate::threshold::DEFAULT_TARGET_SPECIFICITY,
        }
    }
}

/// A read-mostly, `Arc`-backed snapshot of every env-var-driven setting.
/// Swapped atomically by [`crate::engine::RedactionEngine::reload_config`];
/// never mutated mid-`redact`, matching the concurrency model's read-mostly
/// `RwLock<Arc<T>>` pattern.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub features: FeatureFlags,
    pub paths: CachePaths,
    pub cache: CacheSettings,
    pub targets: TargetMetrics,
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            features: FeatureFlags::default(),
            paths: CachePaths {
                config_dir: None,
                calibration_dir: None,
                prewarm_file: None,
            },
            cache: CacheSettings::default(),
            targets: TargetMetrics::default(),
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.to_ascii_lowercase().as_str(), "on" | "true" | "1"),
        Err(_) => default,
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn env_calibration_method(key: &str, default: CalibrationMethod) -> CalibrationMethod {
    match std::env::var(key).ok().as_deref() {
        Some("platt") => CalibrationMethod::Platt,
        Some("isotonic") => CalibrationMethod::Isotonic,
        Some("beta") => CalibrationMethod::Beta,
        Some("temperature") => CalibrationMethod::Temperature,
        _ => default,
    }
}

/// Builds one [`ConfigSnapshot`] from the current process environment,
/// falling back to the defaults documented in spec.md #6 for anything unset
/// or unparseable.
pub fn load_from_env() -> Arc<ConfigSnapshot> {
    let defaults = ConfigSnapshot::default();
    Arc::new(ConfigSnapshot {
        features: FeatureFlags {
            datalog: env_bool("ENABLE_DATALOG", defaults.features.datalog),
            dfa_scan: env_bool("ENABLE_DFA_SCAN", defaults.features.dfa_scan),
            context_modifier: env_bool("ENABLE_CONTEXT_MODIFIER", defaults.features.context_modifier),
            optimized_weights: env_bool("ENABLE_OPTIMIZED_WEIGHTS", defaults.features.optimized_weights),
        },
        paths: CachePaths {
            config_dir: env_string("CONFIG_DIR"),
            calibration_dir: env_string("CALIBRATION_DIR"),
            prewarm_file: env_string("CACHE_PREWARM_FILE"),
        },
        cache: CacheSettings {
            max_exact: env_parsed("CACHE_MAX_EXACT", defaults.cache.max_exact),
            max_structure: env_parsed("CACHE_MAX_STRUCTURE", defaults.cache.max_structure),
            ttl_ms: env_parsed("CACHE_TTL_MS", defaults.cache.ttl_ms),
            max_bytes: env_parsed("CACHE_MAX_BYTES", defaults.cache.max_bytes),
            min_similarity: env_parsed("CACHE_MIN_SIMILARITY", defaults.cache.min_similarity),
        },
        targets: TargetMetrics {
            calibration_method: env_calibration_method("CALIBRATION_METHOD", defaults.targets.calibration_method),
            calibration_min_points: env_parsed(
                "CALIBRATION_MIN_POINTS",
                defaults.targets.calibration_min_points,
            ),
            adaptive_target_sensitivity: env_parsed(
                "ADAPTIVE_TARGET_SENSITIVITY",
                defaults.targets.adaptive_target_sensitivity,
            ),
            adaptive_target_specificity: env_parsed(
                "ADAPTIVE_TARGET_SPECIFICITY",
                defaults.targets.adaptive_target_specificity,
            ),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_used_when_env_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("CACHE_MAX_EXACT");
        let snapshot = load_from_env();
        assert_eq!(snapshot.cache.max_exact, CacheSettings::default().max_exact);
    }

    #[test]
    fn parses_feature_toggle_and_numeric_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("ENABLE_DFA_SCAN", "on");
        std::env::set_var("CACHE_MAX_EXACT", "42");
        let snapshot = load_from_env();
        assert!(snapshot.features.dfa_scan);
        assert_eq!(snapshot.cache.max_exact, 42);
        std::env::remove_var("ENABLE_DFA_SCAN");
        std::env::remove_var("CACHE_MAX_EXACT");
    }

    #[test]
    fn unknown_calibration_method_falls_back_to_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("CALIBRATION_METHOD", "not-a-method");
        let snapshot = load_from_env();
        assert_eq!(snapshot.targets.calibration_method, CalibrationMethod::Platt);
        std::env::remove_var("CALIBRATION_METHOD");
    }
}
