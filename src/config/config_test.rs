use std::io::Write;

use super::StoreConfig;
use crate::InitError;

#[test]
fn test_defaults_are_valid() {
    let config = StoreConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.node_id, 1);
    assert!(config.watch_capacity > 0);
}

#[test]
fn test_node_id_out_of_range_rejected() {
    let config = StoreConfig {
        node_id: 2048,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(InitError::NodeIdOutOfRange(2048))
    ));
}

#[test]
fn test_zero_watch_capacity_rejected() {
    let config = StoreConfig {
        watch_capacity: 0,
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(InitError::ZeroWatchCapacity)));
}

#[test]
fn test_load_from_toml_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("store.toml");
    let mut file = std::fs::File::create(&path).expect("create");
    writeln!(file, "node_id = 9").expect("write");
    writeln!(file, "watch_capacity = 16").expect("write");
    writeln!(file, "data_root = \"/tmp/objstore-test\"").expect("write");

    let config = StoreConfig::load(path.to_str()).expect("load");
    assert_eq!(config.node_id, 9);
    assert_eq!(config.watch_capacity, 16);
    assert_eq!(config.data_root.to_str(), Some("/tmp/objstore-test"));
}

#[test]
fn test_load_without_file_uses_defaults() {
    let config = StoreConfig::load(None).expect("load");
    assert_eq!(config.watch_capacity, StoreConfig::default().watch_capacity);
}
