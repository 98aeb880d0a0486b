use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use proximity_cluster::config::{ClusterMode, EngineConfig};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "CLUSTER_CONFIG",
        "CLUSTER_MODE",
        "CLUSTER_DISTANCE_THRESHOLD",
        "CLUSTER_MIN_SIZE",
        "CLUSTER_OVERLAP_THRESHOLD",
        "CLUSTER_STATIONARY_THRESHOLD",
        "CLUSTER_STATIONARY_FRAMES",
        "CLUSTER_HISTORY_TIMEOUT_MS",
        "CLUSTER_LABELS",
        "CLUSTER_MIN_CONFIDENCE",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_to_crowd_preset() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = EngineConfig::load().expect("load defaults");
    assert_eq!(cfg.mode, ClusterMode::Crowd);
    assert_eq!(cfg.clustering.distance_threshold, 150.0);
    assert_eq!(cfg.clustering.min_cluster_size, 3);
    assert_eq!(cfg.clustering.overlap_suppression_threshold, 0.3);
    assert_eq!(cfg.tracking.history_timeout, Duration::from_millis(5000));
    assert!(cfg.labels.allows("truck"));
    assert!(!cfg.labels.allows("person"));
}

#[test]
fn loads_json_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "mode": "hotspot",
        "labels": ["Car", "van"],
        "min_confidence": 0.4,
        "clustering": {
            "distance_threshold": 180.0
        },
        "tracking": {
            "required_stationary_frames": 6,
            "history_timeout_ms": 8000
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("CLUSTER_CONFIG", file.path());
    std::env::set_var("CLUSTER_MIN_SIZE", "3");
    std::env::set_var("CLUSTER_STATIONARY_THRESHOLD", "12.5");

    let cfg = EngineConfig::load().expect("load config");
    assert_eq!(cfg.mode, ClusterMode::Hotspot);
    assert_eq!(cfg.labels.labels(), ["car".to_string(), "van".to_string()]);
    assert_eq!(cfg.min_confidence, 0.4);
    assert_eq!(cfg.clustering.distance_threshold, 180.0);
    assert_eq!(cfg.clustering.min_cluster_size, 3);
    // Untouched values come from the hotspot preset.
    assert_eq!(cfg.clustering.overlap_suppression_threshold, 0.5);
    assert_eq!(cfg.tracking.required_stationary_frames, 6);
    assert_eq!(cfg.tracking.stationary_movement_threshold, 12.5);
    assert_eq!(cfg.tracking.history_timeout, Duration::from_millis(8000));

    clear_env();
}

#[test]
fn loads_toml_file_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
mode = "crowd"
labels = ["bus"]

[clustering]
distance_threshold = 90.0
overlap_suppression_threshold = 0.25
"#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    let cfg = EngineConfig::load_with(Some(file.path())).expect("load toml");
    assert_eq!(cfg.mode, ClusterMode::Crowd);
    assert!(cfg.labels.allows("bus"));
    assert!(!cfg.labels.allows("car"));
    assert_eq!(cfg.clustering.distance_threshold, 90.0);
    assert_eq!(cfg.clustering.overlap_suppression_threshold, 0.25);
    assert_eq!(cfg.clustering.min_cluster_size, 3);
}

#[test]
fn env_mode_beats_file_mode_and_explicit_mode_beats_both() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{"mode": "crowd"}"#).expect("write config");

    std::env::set_var("CLUSTER_MODE", "parked");
    let cfg = EngineConfig::load_with(Some(file.path())).expect("load config");
    assert_eq!(cfg.mode, ClusterMode::Hotspot);
    assert_eq!(cfg.clustering.distance_threshold, 200.0);

    let cfg = EngineConfig::load_for(Some(file.path()), Some(ClusterMode::Crowd))
        .expect("load config");
    assert_eq!(cfg.mode, ClusterMode::Crowd);
    assert_eq!(cfg.clustering.distance_threshold, 150.0);

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("CLUSTER_OVERLAP_THRESHOLD", "1.5");
    assert!(EngineConfig::load().is_err());
    clear_env();

    std::env::set_var("CLUSTER_MIN_SIZE", "many");
    let err = EngineConfig::load().unwrap_err();
    assert!(err.to_string().contains("CLUSTER_MIN_SIZE"));
    clear_env();

    std::env::set_var("CLUSTER_MODE", "stadium");
    assert!(EngineConfig::load().is_err());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"{not json").expect("write config");
    let err = EngineConfig::load_with(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("invalid config file"));
}
