use machscope::config::{CStringLimits, ImageTableLimits, DEFAULT_PAGE_SIZE};
use machscope::io::IOLimits;
use machscope::InspectConfig;

#[test]
fn test_inspect_config_defaults() {
    let config = InspectConfig::default();

    assert_eq!(config.strings.max_len, 4096);
    assert_eq!(config.strings.chunk_size, 512);
    assert_eq!(config.images.max_images, 16384);
    assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
    assert_eq!(config.io, IOLimits::default());
}

#[test]
fn test_partial_json_keeps_defaults() {
    let config = InspectConfig::from_json_str(
        r#"{ "strings": { "max_len": 1024 }, "page_size": 16384 }"#,
    )
    .unwrap();

    assert_eq!(config.strings.max_len, 1024);
    assert_eq!(config.strings.chunk_size, CStringLimits::default().chunk_size);
    assert_eq!(config.images, ImageTableLimits::default());
    assert_eq!(config.page_size, 0x4000);
}

#[test]
fn test_config_json_round_trip() {
    let mut config = InspectConfig::default();
    config.images.max_images = 64;
    let json = config.to_json_string().unwrap();
    assert_eq!(InspectConfig::from_json_str(&json).unwrap(), config);
}

#[test]
fn test_malformed_json_is_config_error() {
    let err = InspectConfig::from_json_str("{ not json").unwrap_err();
    assert!(matches!(err, machscope::InspectError::Config(_)));
}
