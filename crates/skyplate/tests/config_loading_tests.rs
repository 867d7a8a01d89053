//! Table-driven tests for configuration loading and validation.

use skyplate::config::load_config_from_str;

/// Represents a single config loading test case.
struct ConfigTestCase {
    /// Test case name for identification.
    name: &'static str,
    /// The config JSON content to test.
    config_json: &'static str,
    /// Whether loading should succeed.
    should_succeed: bool,
    /// Expected error substring (if should_succeed is false).
    expected_error: Option<&'static str>,
}

const CONFIG_TESTS: &[ConfigTestCase] = &[
    ConfigTestCase {
        name: "empty_object",
        config_json: "{}",
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "full",
        config_json: r#"{
            "version": "1.0",
            "api_url": "https://nova.astrometry.net/api/",
            "api_key_env_var": "NOVA_KEY",
            "poll": { "interval_secs": 10, "timeout_secs": 600 },
            "http": { "connect_timeout_secs": 5, "request_timeout_secs": 60 },
            "output_directory": "/data/solved",
            "concurrency": 4,
            "results": { "files": ["wcs", "new_fits"], "write_overlay": true },
            "upload": {
                "publicly_visible": "n",
                "scale_units": "arcsecperpix",
                "scale_lower": 20.0,
                "scale_upper": 60.0,
                "downsample_factor": 2
            }
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "no_deadline",
        config_json: r#"{ "poll": { "interval_secs": 3, "timeout_secs": 0 } }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "unknown_field",
        config_json: r#"{ "workers": 2 }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "unsupported_version",
        config_json: r#"{ "version": "2.0" }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "zero_interval",
        config_json: r#"{ "poll": { "interval_secs": 0 } }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "timeout_shorter_than_interval",
        config_json: r#"{ "poll": { "interval_secs": 30, "timeout_secs": 10 } }"#,
        should_succeed: false,
        expected_error: Some("shorter than poll.interval_secs"),
    },
    ConfigTestCase {
        name: "ftp_url",
        config_json: r#"{ "api_url": "ftp://nova.astrometry.net/api/" }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "unknown_result_file",
        config_json: r#"{ "results": { "files": ["jpeg"] } }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "negative_scale",
        config_json: r#"{ "upload": { "scale_lower": -1.0, "scale_upper": 2.0 } }"#,
        should_succeed: false,
        expected_error: Some("upload:"),
    },
    ConfigTestCase {
        name: "not_json",
        config_json: "version = 1.0",
        should_succeed: false,
        expected_error: Some("Failed to parse config JSON"),
    },
];

#[test]
fn test_config_loading_cases() {
    for case in CONFIG_TESTS {
        let result = load_config_from_str(case.config_json);
        match (case.should_succeed, result) {
            (true, Ok(_)) => {}
            (true, Err(e)) => panic!("[{}] expected success, got error: {}", case.name, e),
            (false, Ok(_)) => panic!("[{}] expected an error, got success", case.name),
            (false, Err(e)) => {
                if let Some(expected) = case.expected_error {
                    let message = e.to_string();
                    assert!(
                        message.contains(expected),
                        "[{}] expected error containing '{}', got '{}'",
                        case.name,
                        expected,
                        message
                    );
                }
            }
        }
    }
}

#[test]
fn test_full_config_values() {
    let config = load_config_from_str(CONFIG_TESTS[1].config_json).unwrap();
    assert_eq!(config.concurrency, 4);
    assert_eq!(config.poll.interval_secs, 10);
    assert_eq!(config.api_key_env_var.as_deref(), Some("NOVA_KEY"));
    assert_eq!(config.results.files.len(), 2);
    assert!(config.results.write_calibration);
}
