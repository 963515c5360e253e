use std::env;
use std::fs;
use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use tablechat_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

use crate::commands::{load_config, CommandResult};

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run(options: LoadOptions) -> CommandResult {
    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config = match load_config("config", options) {
        Ok(config) => config,
        Err(result) => return result,
    };

    CommandResult { exit_code: 0, output: render(&config, config_file_path.as_deref()) }
}

pub fn render(config: &AppConfig, config_file_path: Option<&Path>) -> String {
    let config_file_doc = load_config_file_doc(config_file_path);

    let mut lines =
        vec!["effective config (source precedence: overrides > env > file > default):".to_string()];
    for field in fields(config) {
        let source =
            field_source(field.key, field.env_keys, config_file_doc.as_ref(), config_file_path);
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    vec![
        Field {
            key: "airtable.api_key",
            value: redact_token(config.airtable.api_key.expose_secret()),
            env_keys: &["TABLECHAT_AIRTABLE_API_KEY", "AIRTABLE_API_KEY"],
        },
        Field {
            key: "airtable.base_id",
            value: config.airtable.base_id.clone(),
            env_keys: &["TABLECHAT_AIRTABLE_BASE_ID", "AIRTABLE_BASE_ID"],
        },
        Field {
            key: "airtable.api_url",
            value: config.airtable.api_url.clone(),
            env_keys: &["TABLECHAT_AIRTABLE_API_URL"],
        },
        Field {
            key: "airtable.timeout_secs",
            value: config.airtable.timeout_secs.to_string(),
            env_keys: &["TABLECHAT_AIRTABLE_TIMEOUT_SECS"],
        },
        Field {
            key: "llm.provider",
            value: format!("{:?}", config.llm.provider),
            env_keys: &["TABLECHAT_LLM_PROVIDER"],
        },
        Field {
            key: "llm.base_url",
            value: config.llm.base_url.clone().unwrap_or_else(|| "<provider default>".to_string()),
            env_keys: &["TABLECHAT_LLM_BASE_URL"],
        },
        Field {
            key: "llm.api_key",
            value: redact_optional(config.llm.api_key.as_ref()),
            env_keys: &["TABLECHAT_LLM_API_KEY"],
        },
        Field {
            key: "llm.model",
            value: config.llm.model.clone(),
            env_keys: &["TABLECHAT_LLM_MODEL"],
        },
        Field {
            key: "llm.timeout_secs",
            value: config.llm.timeout_secs.to_string(),
            env_keys: &["TABLECHAT_LLM_TIMEOUT_SECS"],
        },
        Field {
            key: "llm.temperature",
            value: config.llm.temperature.to_string(),
            env_keys: &["TABLECHAT_LLM_TEMPERATURE"],
        },
        Field {
            key: "llm.max_tokens",
            value: config.llm.max_tokens.to_string(),
            env_keys: &["TABLECHAT_LLM_MAX_TOKENS"],
        },
        Field {
            key: "agent.default_table",
            value: config.agent.default_table.clone(),
            env_keys: &["TABLECHAT_AGENT_DEFAULT_TABLE"],
        },
        Field {
            key: "agent.classify_intent",
            value: config.agent.classify_intent.to_string(),
            env_keys: &["TABLECHAT_AGENT_CLASSIFY_INTENT"],
        },
        Field {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["TABLECHAT_SERVER_BIND_ADDRESS"],
        },
        Field {
            key: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["TABLECHAT_SERVER_PORT"],
        },
        Field {
            key: "server.graceful_shutdown_secs",
            value: config.server.graceful_shutdown_secs.to_string(),
            env_keys: &["TABLECHAT_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["TABLECHAT_LOGGING_LEVEL", "TABLECHAT_LOG_LEVEL"],
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["TABLECHAT_LOGGING_FORMAT", "TABLECHAT_LOG_FORMAT"],
        },
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_optional(secret: Option<&SecretString>) -> String {
    match secret {
        Some(secret) => redact_token(secret.expose_secret()),
        None => "<unset>".to_string(),
    }
}

/// Keeps the token's type prefix (`pat`, `sk-`) and hides the rest.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }
    if trimmed.starts_with("pat") && trimmed.len() > 3 {
        return "pat***".to_string();
    }

    "<redacted>".to_string()
}
