//! Integration tests for metrics server functionality.

use hooklog_core::config::MetricsConfig;
use hooklog_daemon::metrics_server;
use serial_test::serial;

#[test]
#[serial]
fn test_install_metrics_recorder_succeeds_with_valid_config() {
    // Given: A valid metrics configuration
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "127.0.0.1".to_owned(),
        port: 19_101,
        endpoint: "/metrics".to_owned(),
    };

    // When: Installing the metrics recorder
    let result = metrics_server::install_metrics_recorder(&config);

    // Then: Should succeed
    assert!(
        result.is_ok(),
        "install_metrics_recorder should succeed with valid config: {:?}",
        result.err()
    );
}

#[test]
#[serial]
fn test_install_metrics_recorder_fails_with_invalid_address() {
    // Given: An invalid listen address
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "999.999.999.999".to_owned(),
        port: 9100,
        endpoint: "/metrics".to_owned(),
    };

    // When/Then: Installation fails before binding
    let err = metrics_server::install_metrics_recorder(&config).unwrap_err();
    assert!(err.to_string().contains("invalid metrics listen address"));
}

#[test]
#[serial]
fn test_install_metrics_recorder_rejects_custom_endpoint() {
    // Given: A non-default endpoint path
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "127.0.0.1".to_owned(),
        port: 9100,
        endpoint: "/custom".to_owned(),
    };

    // When/Then: Installation fails with an endpoint error
    let err = metrics_server::install_metrics_recorder(&config).unwrap_err();
    assert!(err.to_string().contains("unsupported metrics endpoint"));
}
