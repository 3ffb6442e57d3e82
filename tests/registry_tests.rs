// Device registry: load-time validation and the name / address index views

mod common;

use common::device;
use netpoll::config::AppConfig;
use netpoll::registry::{DeviceRegistry, RegistryError};

#[test]
fn test_registry_preserves_config_order() {
    let reg = DeviceRegistry::from_descriptors(vec![
        device("zeta", "10.0.0.3"),
        device("alpha", "10.0.0.1"),
        device("mid", "10.0.0.2"),
    ])
    .unwrap();
    let names: Vec<&str> = reg.devices().iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, ["zeta", "alpha", "mid"]);
    assert_eq!(reg.position("alpha"), Some(1));
}

#[test]
fn test_duplicate_name_is_a_load_error() {
    let err = DeviceRegistry::from_descriptors(vec![
        device("sw1", "10.0.0.1"),
        device("sw1", "10.0.0.2"),
    ])
    .unwrap_err();
    assert_eq!(err, RegistryError::DuplicateName("sw1".into()));
}

#[test]
fn test_duplicate_name_from_config_file_fails_before_polling() {
    let config = AppConfig::load_from_str(
        r#"
[server]
port = 8000
host = "0.0.0.0"

[[devices]]
name = "sw1"
host = "10.0.0.1"

[[devices]]
name = "sw1"
host = "10.0.0.9"
"#,
    )
    .unwrap();
    let err = DeviceRegistry::load(&config.devices).unwrap_err();
    assert!(err.to_string().contains("duplicate device name"));
}

#[test]
fn test_blank_name_and_host_are_rejected() {
    assert_eq!(
        DeviceRegistry::from_descriptors(vec![device("  ", "10.0.0.1")]).unwrap_err(),
        RegistryError::EmptyName(0)
    );
    assert_eq!(
        DeviceRegistry::from_descriptors(vec![device("sw1", "")]).unwrap_err(),
        RegistryError::EmptyHost("sw1".into())
    );
}

#[test]
fn test_lookup_by_name_host_and_host_port() {
    let reg = DeviceRegistry::from_descriptors(vec![
        device("sw1", "10.0.0.1"),
        device("sw2", "10.0.0.2"),
    ])
    .unwrap();
    assert_eq!(reg.lookup("sw2").unwrap().host, "10.0.0.2");
    assert_eq!(reg.lookup("10.0.0.1").unwrap().name, "sw1");
    assert_eq!(reg.lookup("10.0.0.2:161").unwrap().name, "sw2");
    assert!(reg.lookup("10.0.0.3").is_none());
    assert!(reg.lookup("10.0.0.1:162").is_none());
}

#[test]
fn test_name_match_wins_over_address_match() {
    // "10.0.0.2" is both sw-b's address and the name of another device.
    let reg = DeviceRegistry::from_descriptors(vec![
        device("10.0.0.2", "10.0.0.1"),
        device("sw-b", "10.0.0.2"),
    ])
    .unwrap();
    assert_eq!(reg.lookup("10.0.0.2").unwrap().host, "10.0.0.1");
    assert_eq!(reg.by_address("10.0.0.2").unwrap().name, "sw-b");
}

#[test]
fn test_shared_host_resolves_to_first_device() {
    let mut second = device("agent-b", "10.0.0.1");
    second.port = 1161;
    let reg =
        DeviceRegistry::from_descriptors(vec![device("agent-a", "10.0.0.1"), second]).unwrap();
    assert_eq!(reg.lookup("10.0.0.1").unwrap().name, "agent-a");
    assert_eq!(reg.lookup("10.0.0.1:1161").unwrap().name, "agent-b");
}

#[test]
fn test_empty_registry_is_valid() {
    let reg = DeviceRegistry::load(&[]).unwrap();
    assert!(reg.is_empty());
    assert_eq!(reg.len(), 0);
}
