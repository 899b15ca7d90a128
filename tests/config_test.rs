//! Config loading (§4.10, §6.6).

use std::io::Write;

use wavecast::options::RootConfig;

fn write_temp_config(contents: &str) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("wavecast-test-config-{}.json", std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
fn loads_a_minimal_config_with_defaults_filled_in() {
    let path = write_temp_config(
        r#"{
            "default": "main",
            "servers": { "main": { "port": 6001 } },
            "apps": { "provider": "config", "apps": [
                { "app_id": "1", "key": "key1", "secret": "secret1" }
            ] }
        }"#,
    );

    let config = RootConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    let profile = config.server(None).unwrap();
    assert_eq!(profile.port, 6001);
    assert_eq!(profile.host, "0.0.0.0");
    assert!(!profile.scaling.enabled);

    let app = &config.apps.apps[0];
    assert_eq!(app.ping_interval, 120);
    assert_eq!(app.activity_timeout, 60);
}

#[test]
fn missing_file_is_a_config_error_not_a_panic() {
    let result = RootConfig::from_file("/nonexistent/wavecast/config.json");
    assert!(result.is_err());
}

#[test]
fn malformed_json_is_a_config_error() {
    let path = write_temp_config("not valid json");
    let result = RootConfig::from_file(&path);
    std::fs::remove_file(&path).ok();
    assert!(result.is_err());
}
