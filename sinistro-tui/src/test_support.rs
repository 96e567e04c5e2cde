//! Shared fixtures for unit tests.

use crate::config::TuiConfig;

pub(crate) const SAMPLE_TOML: &str = r#"
api_base_url = "http://localhost:3000"
request_timeout_ms = 5000
refresh_interval_ms = 250

[auth]
api_key = "test-key"

[log]
path = "tmp/sinistro.log"
filter = "info"

[cache]
namespace = "sinistro"
format_version = "2"
max_size_mb = 16
sweep_on_init = true

[selection]
initial_batch = 200
batch_increment = 200
search_debounce_ms = 150
load_more_threshold = 48
"#;

pub(crate) fn config() -> TuiConfig {
    match TuiConfig::from_toml(SAMPLE_TOML) {
        Ok(config) => config,
        Err(e) => panic!("sample config must parse: {e}"),
    }
}
