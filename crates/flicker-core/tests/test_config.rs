use flicker_core::config::{
    AcquisitionMode, EnhancementMode, LineEndpoints, ProcessingConfig, Roi, SessionConfig,
};
use flicker_core::consts::{DEFAULT_BINNING, DEFAULT_CHANNEL_CAPACITY};

#[test]
fn test_default_session_round_trips_through_toml() {
    let config = SessionConfig::default();
    let text = toml::to_string_pretty(&config).unwrap();
    let parsed: SessionConfig = toml::from_str(&text).unwrap();

    assert_eq!(parsed.acquisition.binning, DEFAULT_BINNING);
    assert_eq!(parsed.acquisition.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
    assert_eq!(parsed.processing.enhancement, EnhancementMode::None);
    assert!(parsed.processing.background.is_none());
    parsed.validate().unwrap();
}

#[test]
fn test_partial_toml_uses_defaults() {
    let text = r#"
        [acquisition]
        mode = "difference"
        exposure_time = 0.1

        [processing]
        enhancement = "adaptive-equalization"
        averaging = 8
        roi = { x = 4, y = 4, width = 16, height = 16 }
        line = { start = [0, 0], end = [10, 5] }
    "#;
    let config: SessionConfig = toml::from_str(text).unwrap();
    config.validate().unwrap();

    assert_eq!(config.acquisition.mode, AcquisitionMode::Difference);
    assert_eq!(config.acquisition.exposure_time, 0.1);
    assert_eq!(config.acquisition.binning, DEFAULT_BINNING);
    assert_eq!(config.processing.enhancement, EnhancementMode::AdaptiveEqualization);
    assert_eq!(config.processing.averaging, 8);
    assert_eq!(config.processing.roi, Roi::new(4, 4, 16, 16));
    assert_eq!(
        config.processing.line,
        Some(LineEndpoints {
            start: (0, 0),
            end: (10, 5)
        })
    );
    assert_eq!(config.processing.p_high, 100.0);
}

#[test]
fn test_session_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.toml");

    let mut config = SessionConfig::default();
    config.acquisition.mode = AcquisitionMode::Difference;
    config.processing.enhancement = EnhancementMode::Percentile;
    config.processing.set_percentiles(2.0, 98.0).unwrap();
    std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

    let loaded: SessionConfig = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(loaded.acquisition.mode, AcquisitionMode::Difference);
    assert_eq!(loaded.processing.enhancement, EnhancementMode::Percentile);
    assert_eq!((loaded.processing.p_low, loaded.processing.p_high), (2.0, 98.0));
}

#[test]
fn test_invalid_values_are_rejected() {
    let mut config = SessionConfig::default();
    config.acquisition.binning = 3;
    assert!(config.validate().is_err());

    let mut config = SessionConfig::default();
    config.acquisition.exposure_time = 0.0;
    assert!(config.validate().is_err());

    let mut config = SessionConfig::default();
    config.acquisition.bit_depth = 17;
    assert!(config.validate().is_err());

    let mut config = SessionConfig::default();
    config.acquisition.channel_capacity = 0;
    assert!(config.validate().is_err());

    let mut config = SessionConfig::default();
    config.processing.averaging = 257;
    assert!(config.validate().is_err());

    assert!(toml::from_str::<SessionConfig>("[processing]\nenhancement = \"sharpen\"").is_err());
}

#[test]
fn test_percentile_setters_keep_previous_on_error() {
    let mut config = ProcessingConfig::default();
    config.set_percentiles(5.0, 95.0).unwrap();
    assert!(config.set_percentile_low(95.0).is_err());
    assert!(config.set_percentile_high(101.0).is_err());
    assert_eq!((config.p_low, config.p_high), (5.0, 95.0));

    config.set_percentile_high(99.5).unwrap();
    assert_eq!(config.p_high, 99.5);
}

#[test]
fn test_enhancement_names() {
    assert_eq!(EnhancementMode::Percentile.to_string(), "Percentile Clip");
    let parsed: ProcessingConfig = toml::from_str("enhancement = \"histogram-equalization\"").unwrap();
    assert_eq!(parsed.enhancement, EnhancementMode::HistogramEqualization);
}
