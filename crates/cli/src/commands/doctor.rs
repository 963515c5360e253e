use std::sync::Arc;

use serde::Serialize;
use tablechat_agent::{build_client, LlmClient};
use tablechat_core::config::{AppConfig, LoadOptions};
use tablechat_store::{display_name_in, is_table_id, AirtableClient, TabularStore};

use crate::commands::{runtime, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
pub struct DoctorCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub details: String,
}

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub overall_status: CheckStatus,
    pub summary: String,
    pub checks: Vec<DoctorCheck>,
}

pub fn run(options: LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\
                 \"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(options: LoadOptions) -> DoctorReport {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return summarize(vec![
                DoctorCheck {
                    name: "config_validation",
                    status: CheckStatus::Fail,
                    details: error.to_string(),
                },
                skipped("store_connectivity"),
                skipped("default_table"),
                skipped("llm_connectivity"),
            ]);
        }
    };

    let store: Arc<dyn TabularStore> = match AirtableClient::new(&config.airtable) {
        Ok(client) => Arc::new(client),
        Err(error) => {
            return summarize(vec![
                config_passed(),
                DoctorCheck {
                    name: "store_connectivity",
                    status: CheckStatus::Fail,
                    details: error.to_string(),
                },
                skipped("default_table"),
                skipped("llm_connectivity"),
            ]);
        }
    };
    let llm = match build_client(&config.llm) {
        Ok(client) => client,
        Err(error) => {
            return summarize(vec![
                config_passed(),
                skipped("store_connectivity"),
                skipped("default_table"),
                DoctorCheck {
                    name: "llm_connectivity",
                    status: CheckStatus::Fail,
                    details: error.to_string(),
                },
            ]);
        }
    };

    let runtime = match runtime("doctor") {
        Ok(runtime) => runtime,
        Err(_) => {
            return summarize(vec![
                config_passed(),
                DoctorCheck {
                    name: "runtime_init",
                    status: CheckStatus::Fail,
                    details: "failed to initialize async runtime".to_string(),
                },
            ]);
        }
    };

    let mut checks = vec![config_passed()];
    checks.extend(runtime.block_on(connectivity_checks(&config, store.as_ref(), llm.as_ref())));
    summarize(checks)
}

/// Store reachability, default table presence, and model reachability.
pub async fn connectivity_checks(
    config: &AppConfig,
    store: &dyn TabularStore,
    llm: &dyn LlmClient,
) -> Vec<DoctorCheck> {
    let mut checks = Vec::new();

    match store.list_tables().await {
        Ok(tables) => {
            checks.push(DoctorCheck {
                name: "store_connectivity",
                status: CheckStatus::Pass,
                details: format!(
                    "base `{}` lists {} table(s)",
                    config.airtable.base_id,
                    tables.len()
                ),
            });

            let default_table = &config.agent.default_table;
            let found = if is_table_id(default_table) {
                display_name_in(default_table, &tables).is_some()
            } else {
                tables.iter().any(|table| &table.name == default_table)
            };
            checks.push(if found {
                DoctorCheck {
                    name: "default_table",
                    status: CheckStatus::Pass,
                    details: format!("`{default_table}` exists in the base"),
                }
            } else {
                DoctorCheck {
                    name: "default_table",
                    status: CheckStatus::Fail,
                    details: format!(
                        "`{default_table}` is not a table in the base; \
                         set agent.default_table to one of: {}",
                        tables
                            .iter()
                            .map(|table| table.name.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                }
            });
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "store_connectivity",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(skipped("default_table"));
        }
    }

    checks.push(match llm.check_health().await {
        Ok(()) => DoctorCheck {
            name: "llm_connectivity",
            status: CheckStatus::Pass,
            details: format!("model `{}` reachable", llm.model()),
        },
        Err(error) => DoctorCheck {
            name: "llm_connectivity",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    });

    checks
}

fn config_passed() -> DoctorCheck {
    DoctorCheck {
        name: "config_validation",
        status: CheckStatus::Pass,
        details: "configuration loaded and validated".to_string(),
    }
}

fn skipped(name: &'static str) -> DoctorCheck {
    DoctorCheck {
        name,
        status: CheckStatus::Skipped,
        details: "skipped because an earlier check failed".to_string(),
    }
}

fn summarize(checks: Vec<DoctorCheck>) -> DoctorReport {
    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use tablechat_agent::llm::ScriptedLlmClient;
    use tablechat_core::config::AppConfig;
    use tablechat_store::InMemoryTabularStore;

    use super::{connectivity_checks, render_human, summarize, CheckStatus};

    fn config(default_table: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.airtable.base_id = "appTEST123".to_string();
        config.agent.default_table = default_table.to_string();
        config
    }

    #[tokio::test]
    async fn healthy_dependencies_pass_every_check() {
        let store = InMemoryTabularStore::new();
        store.add_table("tblTasks000000001", "Tasks");

        let llm = ScriptedLlmClient::default();
        let checks = connectivity_checks(&config("Tasks"), &store, &llm).await;

        assert!(checks.iter().all(|check| check.status == CheckStatus::Pass));
        assert_eq!(summarize(checks).overall_status, CheckStatus::Pass);
    }

    #[tokio::test]
    async fn missing_default_table_lists_alternatives() {
        let store = InMemoryTabularStore::new();
        store.add_table("tblTasks000000001", "Tasks");

        let llm = ScriptedLlmClient::default();
        let checks = connectivity_checks(&config("Table 1"), &store, &llm).await;

        let check = checks.iter().find(|check| check.name == "default_table").expect("check");
        assert_eq!(check.status, CheckStatus::Fail);
        assert!(check.details.contains("Tasks"));
    }

    #[tokio::test]
    async fn default_table_may_be_an_identifier() {
        let store = InMemoryTabularStore::new();
        store.add_table("tblTasks000000001", "Tasks");

        let llm = ScriptedLlmClient::default();
        let checks = connectivity_checks(&config("tblTasks000000001"), &store, &llm).await;

        let check = checks.iter().find(|check| check.name == "default_table").expect("check");
        assert_eq!(check.status, CheckStatus::Pass);
    }

    #[tokio::test]
    async fn unreachable_store_skips_table_check() {
        let store = InMemoryTabularStore::new();
        store.set_unavailable(Some("maintenance"));

        let llm = ScriptedLlmClient::default();
        let report = summarize(connectivity_checks(&config("Tasks"), &store, &llm).await);

        assert_eq!(report.overall_status, CheckStatus::Fail);
        let rendered = render_human(&report);
        assert!(rendered.contains("- [fail] store_connectivity"));
        assert!(rendered.contains("- [skip] default_table"));
        assert!(rendered.contains("- [ok] llm_connectivity"));
    }
}
