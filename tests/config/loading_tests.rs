// Config loading tests - reading client.toml from disk
//
// Covers file errors, the full sample configuration and environment
// expansion in server entries.

use serial_test::serial;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::tempdir;
use toolrelay_core::config::{
    ApiFormat, AppConfig, ConfigError, ServerTransport, ToolCallMode, load_config,
};
use toolrelay_core::tooling::CollisionPolicy;

fn write_config(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("client.toml");
    fs::write(&path, content).expect("Failed to write config");
    path
}

const FULL: &str = r#"
default_provider = "openai"
model = "gpt-4o-mini"
system_prompt = "You are a helpful assistant."
builtin_tools = false

[agent]
max_tool_rounds = 5
tool_call_mode = "directive"
concurrent_tools = false

[transcript]
compact_threshold = 30
keep_recent = 10

[registry]
collision = "namespace"

[[providers]]
id = "openai"
type = "openai"
endpoint = "https://api.openai.com"
api_key = "OPENAI_API_KEY"
models = ["gpt-4o-mini"]

[[providers]]
id = "ollama"
type = "ollama"
endpoint = "http://127.0.0.1:11434"
models = [{ name = "llama3", display_name = "Llama 3" }]

[[servers]]
name = "time"
transport = "stdio"
command = "uvx"
args = ["mcp-server-time"]
call_timeout_ms = 5000

[[servers]]
name = "docs"
url = "http://127.0.0.1:8000/mcp"
mandatory = true
headers = { Authorization = "Bearer static" }
"#;

#[test]
fn returns_error_when_file_not_found() {
    let result = AppConfig::load(Some(Path::new("/nonexistent/path/client.toml")));
    assert!(matches!(result, Err(ConfigError::NotFound { .. })));
}

#[test]
fn returns_parse_error_for_invalid_toml() {
    let dir = tempdir().expect("tempdir");
    let path = write_config(dir.path(), "model = [unterminated");

    let result = load_config(Some(&path));
    assert!(matches!(result, Err(ConfigError::Parse { .. })));
}

#[test]
fn returns_error_when_model_missing() {
    let dir = tempdir().expect("tempdir");
    let path = write_config(
        dir.path(),
        r#"
default_provider = "local"

[[providers]]
id = "local"
type = "ollama"
endpoint = "http://127.0.0.1:11434"
"#,
    );

    assert!(matches!(
        load_config(Some(&path)),
        Err(ConfigError::MissingModel)
    ));
}

#[test]
fn returns_error_when_provider_has_no_endpoint() {
    let dir = tempdir().expect("tempdir");
    let path = write_config(
        dir.path(),
        r#"
default_provider = "local"
model = "llama3"

[[providers]]
id = "local"
type = "ollama"
"#,
    );

    assert!(matches!(
        load_config(Some(&path)),
        Err(ConfigError::MissingEndpoint { provider }) if provider == "local"
    ));
}

#[test]
fn loads_every_section() {
    let dir = tempdir().expect("tempdir");
    let path = write_config(dir.path(), FULL);

    let config = load_config(Some(&path)).expect("config loads");

    assert_eq!(config.default_provider, "openai");
    assert_eq!(config.system_prompt.as_deref(), Some("You are a helpful assistant."));
    assert!(!config.builtin_tools);
    assert_eq!(config.agent.max_tool_rounds, 5);
    assert_eq!(config.agent.tool_call_mode, ToolCallMode::Directive);
    assert!(!config.agent.concurrent_tools);
    assert_eq!(config.transcript.compact_threshold, 30);
    assert_eq!(config.transcript.keep_recent, 10);
    assert_eq!(config.registry.collision, CollisionPolicy::Namespace);

    let ollama = config.provider("ollama").expect("ollama provider");
    assert_eq!(ollama.format, ApiFormat::Ollama);
    assert!(ollama.has_model("llama3"));

    assert_eq!(config.servers.len(), 2);
    let time = &config.servers[0];
    assert_eq!(time.transport_name(), "stdio");
    assert_eq!(time.call_timeout, Duration::from_millis(5000));
    assert!(!time.mandatory);

    let docs = &config.servers[1];
    assert_eq!(docs.transport_name(), "http");
    let mandatory: Vec<_> = config.mandatory_servers().map(|s| s.name.as_str()).collect();
    assert_eq!(mandatory, vec!["docs"]);
}

#[test]
fn rejects_zero_timeouts() {
    let dir = tempdir().expect("tempdir");
    let path = write_config(
        dir.path(),
        r#"
default_provider = "local"
model = "llama3"

[[providers]]
id = "local"
type = "ollama"
endpoint = "http://127.0.0.1:11434"

[[servers]]
name = "slow"
command = "slow-server"
handshake_timeout_ms = 0
"#,
    );

    assert!(matches!(
        load_config(Some(&path)),
        Err(ConfigError::InvalidServer { server, .. }) if server == "slow"
    ));
}

#[test]
#[serial]
fn expands_environment_in_http_headers_and_urls() {
    unsafe {
        std::env::set_var("TOOLRELAY_IT_TOKEN", "secret-token");
        std::env::set_var("TOOLRELAY_IT_PORT", "8123");
    }
    let dir = tempdir().expect("tempdir");
    let path = write_config(
        dir.path(),
        r#"
default_provider = "local"
model = "llama3"

[[providers]]
id = "local"
type = "ollama"
endpoint = "http://127.0.0.1:11434"

[[servers]]
name = "docs"
transport = "http"
url = "http://127.0.0.1:${TOOLRELAY_IT_PORT}/mcp"
headers = { Authorization = "Bearer ${TOOLRELAY_IT_TOKEN}" }
"#,
    );

    let config = load_config(Some(&path)).expect("config loads");
    let ServerTransport::Http(http) = &config.servers[0].transport else {
        panic!("expected http transport");
    };
    assert_eq!(http.url, "http://127.0.0.1:8123/mcp");
    assert_eq!(
        http.headers.get("Authorization").map(String::as_str),
        Some("Bearer secret-token")
    );

    unsafe {
        std::env::remove_var("TOOLRELAY_IT_TOKEN");
        std::env::remove_var("TOOLRELAY_IT_PORT");
    }
}
