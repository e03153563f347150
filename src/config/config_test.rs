use std::time::Duration;

use serial_test::serial;
use temp_env::with_vars;

use super::*;
use crate::Endpoint;

fn cleanup_all_servok_env_vars() {
    for (key, _) in std::env::vars() {
        if key.starts_with("SERVOK__") || key == CONFIG_PATH_ENV {
            std::env::remove_var(&key);
        }
    }
}

#[test]
#[serial]
fn default_config_should_initialize_with_hardcoded_values() {
    let config = ServokConfig::default();

    assert_eq!(config.server.listen_address, "0.0.0.0:9090");
    assert_eq!(config.watch.poll_interval_ms, 10_000);
    assert_eq!(config.watch.subscriber_buffer_size, 4);
    assert_eq!(config.watch.overflow_policy, OverflowPolicy::Disconnect);
    assert_eq!(config.retry.base_delay_ms, 1000);
    assert_eq!(config.retry.max_delay_ms, 60_000);
    assert!(!config.monitoring.prometheus_enabled);
    assert!(matches!(config.resolver, ResolverConfig::Static { .. }));
}

#[test]
#[serial]
fn default_config_should_pass_validation() {
    cleanup_all_servok_env_vars();
    let config = ServokConfig::new().unwrap();

    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn new_should_merge_environment_overrides() {
    cleanup_all_servok_env_vars();
    with_vars(
        vec![
            ("SERVOK__WATCH__POLL_INTERVAL_MS", Some("2500")),
            ("SERVOK__WATCH__OVERFLOW_POLICY", Some("coalesce")),
        ],
        || {
            let config = ServokConfig::new().unwrap();

            assert_eq!(config.watch.poll_interval_ms, 2500);
            assert_eq!(config.watch.overflow_policy, OverflowPolicy::Coalesce);
        },
    );
}

#[test]
#[serial]
fn with_override_config_should_merge_file_settings() {
    cleanup_all_servok_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("override.toml");

    std::fs::write(
        &config_path,
        r#"
        [watch]
        grace_period_ms = 250

        [resolver]
        kind = "static"

        [[resolver.targets.payments]]
        hostname = "10.0.0.1"
        port = 8080
        weight = 2

        [[resolver.targets.payments]]
        hostname = "10.0.0.2"
        port = 8080
        "#,
    )
    .unwrap();

    let empty_vars: Vec<(&str, Option<&str>)> = vec![];
    with_vars(empty_vars, || {
        let base_config = ServokConfig::new().expect("success");
        let config = base_config
            .with_override_config(config_path.to_str().unwrap())
            .expect("override should load");

        assert_eq!(config.watch.grace_period(), Duration::from_millis(250));
        match config.resolver {
            ResolverConfig::Static { targets } => {
                let members = targets.get("payments").expect("payments target");
                assert_eq!(
                    members,
                    &vec![
                        Endpoint::new("10.0.0.1", 8080, 2),
                        Endpoint::new("10.0.0.2", 8080, 0),
                    ]
                );
            }
            other => panic!("unexpected resolver config {other:?}"),
        }
    });
}

#[test]
#[serial]
fn config_path_file_selects_dns_resolver() {
    cleanup_all_servok_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("dns.toml");
    std::fs::write(
        &config_path,
        r#"
        [resolver]
        kind = "dns"
        default_port = 443
        "#,
    )
    .unwrap();

    with_vars(
        vec![(CONFIG_PATH_ENV, Some(config_path.to_str().unwrap()))],
        || {
            let config = ServokConfig::new().unwrap().validate().unwrap();

            assert_eq!(config.resolver, ResolverConfig::Dns { default_port: 443 });
        },
    );
}

#[test]
#[serial]
fn environment_variables_should_have_highest_priority() {
    cleanup_all_servok_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("priority.toml");
    std::fs::write(
        &config_path,
        r#"
        [server]
        listen_address = "127.0.0.1:7000"
        "#,
    )
    .unwrap();

    with_vars(
        vec![
            (CONFIG_PATH_ENV, Some(config_path.to_str().unwrap())),
            ("SERVOK__SERVER__LISTEN_ADDRESS", Some("127.0.0.1:7001")),
        ],
        || {
            let config = ServokConfig::new().unwrap();

            assert_eq!(config.server.listen_address, "127.0.0.1:7001");
        },
    );
}

#[test]
fn validation_should_reject_bad_listen_address() {
    let mut config = ServokConfig::default();
    config.server.listen_address = "not-an-address".into();

    assert!(config.validate().is_err());
}

#[test]
fn validation_should_reject_zero_poll_interval() {
    let mut config = ServokConfig::default();
    config.watch.poll_interval_ms = 0;

    assert!(config.validate().is_err());
}

#[test]
fn validation_should_reject_oversized_subscriber_buffer() {
    let mut config = ServokConfig::default();
    config.watch.subscriber_buffer_size = 65;

    assert!(config.validate().is_err());
}

#[test]
fn validation_should_reject_inverted_backoff_bounds() {
    let mut config = ServokConfig::default();
    config.retry.base_delay_ms = 5000;
    config.retry.max_delay_ms = 1000;

    assert!(config.validate().is_err());
}

#[test]
fn validation_should_reject_privileged_prometheus_port() {
    let mut config = ServokConfig::default();
    config.monitoring.prometheus_enabled = true;
    config.monitoring.prometheus_port = 80;

    assert!(config.validate().is_err());
}

#[test]
fn backoff_doubles_and_caps_without_jitter() {
    let policy = BackoffPolicy {
        max_retries: 0,
        base_delay_ms: 1000,
        max_delay_ms: 60_000,
        jitter_ratio: 0.0,
    };

    assert_eq!(policy.delay_for(0), Duration::from_secs(1));
    assert_eq!(policy.delay_for(1), Duration::from_secs(2));
    assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    assert_eq!(policy.delay_for(6), Duration::from_secs(60));
    assert_eq!(policy.delay_for(200), Duration::from_secs(60));
}

#[test]
fn backoff_jitter_stays_within_ratio() {
    let policy = BackoffPolicy {
        jitter_ratio: 0.5,
        ..BackoffPolicy::default()
    };

    for attempt in 0..10 {
        let base = policy.base_delay(attempt);
        let delay = policy.delay_for(attempt);
        assert!(delay <= base, "attempt {attempt}: {delay:?} > {base:?}");
        assert!(delay >= base.mul_f64(0.5), "attempt {attempt}: {delay:?} too short");
    }
}

#[test]
fn backoff_exhaustion_respects_unlimited_retries() {
    let unlimited = BackoffPolicy {
        max_retries: 0,
        ..BackoffPolicy::default()
    };
    let bounded = BackoffPolicy {
        max_retries: 3,
        ..BackoffPolicy::default()
    };

    assert!(!unlimited.exhausted(u32::MAX));
    assert!(!bounded.exhausted(3));
    assert!(bounded.exhausted(4));
}
