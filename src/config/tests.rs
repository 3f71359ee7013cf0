use super::settings::Settings;
use super::{load_config, load_config_from};
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 8080);
    assert_eq!(settings.graph.interval_secs, 10);
    assert_eq!(settings.graph.ttl_multiplier, 3);
    assert_eq!(settings.graph.topic, "$SYS/graph");
    assert_eq!(settings.graph.latency_topic, "$GRAPH/latency");
    assert_eq!(settings.log.level, "info");
}

#[test]
#[serial]
fn missing_file_falls_back_to_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("absent");

    let cfg = load_config_from(path.to_str().unwrap()).expect("load_config failed");
    assert_eq!(cfg.server.port, 8080);
    assert_eq!(cfg.graph.interval_secs, 10);
}

#[test]
#[serial]
fn file_overrides_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("netgraph.toml");
    let toml = r#"
        [server]
        host = "0.0.0.0"
        port = 9000

        [graph]
        interval_secs = 2
        ttl_multiplier = 5
        topic = "$SYS/topology"
    "#;
    fs::write(&path, toml).expect("write config file");

    let cfg = load_config_from(path.to_str().unwrap()).expect("load_config failed");
    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.graph.interval_secs, 2);
    assert_eq!(cfg.graph.ttl_multiplier, 5);
    assert_eq!(cfg.graph.topic, "$SYS/topology");
    // untouched values keep their defaults
    assert_eq!(cfg.graph.memory_topic, "$SYS/graph/memory");
    assert_eq!(cfg.log.level, "info");
}

#[test]
#[serial]
fn environment_overrides_defaults() {
    temp_env::with_vars(
        [
            ("NETGRAPH__GRAPH__INTERVAL_SECS", Some("0")),
            ("NETGRAPH__SERVER__PORT", Some("9100")),
            ("NETGRAPH__LOG__LEVEL", Some("debug")),
        ],
        || {
            let cfg = load_config().expect("load_config failed");
            assert_eq!(cfg.graph.interval_secs, 0);
            assert_eq!(cfg.server.port, 9100);
            assert_eq!(cfg.log.level, "debug");
        },
    );
}
