//! Configuration loading from file and environment

use poly_updown::config::{Config, ExecutionMode};
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::io::Write;

#[test]
fn test_example_config_loads() {
    let config: Config = toml::from_str(include_str!("../../config.toml.example")).unwrap();
    config.validate().unwrap();

    assert!(!config.trading.enabled);
    assert_eq!(config.trading.mode, ExecutionMode::Paper);
    assert_eq!(config.tiers.tier1.max_remaining_secs, 40);
    assert_eq!(config.tiers.tier3.min_divergence, dec!(180));
    assert_eq!(config.feeds.reference, "chainlink");
}

#[test]
fn test_file_then_environment_overrides() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [trading]
        enabled = false
        trade_size = 3

        [redeem]
        scan_interval_secs = 30
        "#
    )
    .unwrap();

    let mut config = Config::load(file.path()).unwrap();
    let env: HashMap<&str, &str> = [
        ("AUTO_TRADE", "true"),
        ("CONDITION_2_DIFF", "95"),
        ("REDEEM_SCAN_INTERVAL", "1"),
        ("POLL_INTERVAL_MS", "fast"),
    ]
    .into_iter()
    .collect();
    config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

    assert!(config.trading.enabled);
    assert_eq!(config.trading.trade_size, dec!(3));
    assert_eq!(config.tiers.tier2.min_divergence, dec!(95));
    // Floors apply to the effective interval
    assert_eq!(config.redeem.scan_interval().as_secs(), 3);
    // Unparseable override leaves the default
    assert_eq!(config.trading.poll_interval_ms, 100);
}

#[test]
fn test_invalid_tier_order_rejected() {
    let mut config = Config::default();
    config.tiers.tier2.max_remaining_secs = 30;
    assert!(config.validate().is_err());
}
