use anyhow::{anyhow, Context};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

use crate::helpers::{llm::DEFAULT_MODEL, storage::ArtifactStore, validator::ValidationPolicy};
use crate::service::ReportConfig;

pub const DEFAULT_PROMPT: &str = r#"You receive a month of work chat messages as JSON.
Reply with one JSON object and nothing else:
{"days": [{"date": "YYYY-MM-DD", "done": [{"task": "<project>: <what>", "duration": <hours>, "description": "<text>", "tags": ["<tag>"], "type": "task" | "meeting"}]}],
 "not-mentioned-days": ["YYYY-MM-DD"]}
Rules:
- every date of the month goes either into "days" or into "not-mentioned-days", never both;
- every working day starts with {"task": "daily", "duration": 1, "type": "meeting"};
- a working day totals 7 to 10 hours;
- one project per task, split "a: x, b: y" into two tasks."#;

/// Process configuration for the binary. Only `main` reads the environment;
/// everything below it receives explicit values.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub openrouter_api_key: String,
    pub openrouter_model: String,
    pub resend_api_key: String,
    pub owner: String,
    pub chat_id: String,
    pub from: String,
    pub destination: String,
    pub export_dir: PathBuf,
    pub data_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub prompt_path: Option<PathBuf>,
    pub min_daily_hours: u32,
    pub max_daily_hours: u32,
    pub max_missing_days: Option<usize>,
    pub bind: String,
}

impl ServiceConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| anyhow!("{} must be set", key))
        };
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let policy = policy_from_lookup(&lookup)?;

        let config = Self {
            openrouter_api_key: required("OPENROUTER_API_KEY")?,
            openrouter_model: or_default("OPENROUTER_MODEL", DEFAULT_MODEL),
            resend_api_key: required("RESEND_API_KEY")?,
            owner: required("REPORT_OWNER")?,
            chat_id: required("REPORT_CHAT_ID")?,
            from: or_default("REPORT_FROM", "Worklog Reports <reports@resend.dev>"),
            destination: required("REPORT_DESTINATION")?,
            export_dir: or_default("REPORT_EXPORT_DIR", "exports").into(),
            data_dir: or_default("REPORT_DATA_DIR", "data").into(),
            reports_dir: or_default("REPORT_REPORTS_DIR", "reports").into(),
            prompt_path: lookup("REPORT_PROMPT_PATH").map(PathBuf::from),
            min_daily_hours: policy.min_daily_hours,
            max_daily_hours: policy.max_daily_hours,
            max_missing_days: policy.max_missing_days,
            bind: or_default("REPORT_BIND", "0.0.0.0:3000"),
        };

        Ok(config)
    }

    pub fn policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            min_daily_hours: self.min_daily_hours,
            max_daily_hours: self.max_daily_hours,
            max_missing_days: self.max_missing_days,
            ..ValidationPolicy::default()
        }
    }

    pub fn store(&self) -> ArtifactStore {
        ArtifactStore::new(self.data_dir.clone(), self.reports_dir.clone())
    }

    pub async fn prompt_template(&self) -> anyhow::Result<String> {
        match &self.prompt_path {
            Some(path) => {
                info!("Loading prompt template from {}", path.display());
                tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("failed to read prompt {}", path.display()))
            }
            None => Ok(DEFAULT_PROMPT.to_string()),
        }
    }

    pub fn report_config(&self, prompt_template: String) -> ReportConfig {
        ReportConfig {
            owner: self.owner.clone(),
            chat_id: self.chat_id.clone(),
            destination: self.destination.clone(),
            prompt_template,
            policy: self.policy(),
            store: self.store(),
        }
    }
}

/// Workload bounds from `REPORT_MIN_HOURS`, `REPORT_MAX_HOURS` and
/// `REPORT_MAX_MISSING_DAYS`. Needs no credentials, so offline validation
/// applies the same policy as the service.
pub fn policy_from_lookup<F>(lookup: &F) -> anyhow::Result<ValidationPolicy>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = ValidationPolicy::default();
    let policy = ValidationPolicy {
        min_daily_hours: parse_or(lookup, "REPORT_MIN_HOURS", defaults.min_daily_hours)?,
        max_daily_hours: parse_or(lookup, "REPORT_MAX_HOURS", defaults.max_daily_hours)?,
        max_missing_days: lookup("REPORT_MAX_MISSING_DAYS")
            .map(|value| parse_value("REPORT_MAX_MISSING_DAYS", &value))
            .transpose()?,
        ..defaults
    };

    if policy.min_daily_hours > policy.max_daily_hours {
        return Err(anyhow!(
            "REPORT_MIN_HOURS ({}) exceeds REPORT_MAX_HOURS ({})",
            policy.min_daily_hours,
            policy.max_daily_hours
        ));
    }

    Ok(policy)
}

pub fn policy_from_env() -> anyhow::Result<ValidationPolicy> {
    policy_from_lookup(&|key: &str| std::env::var(key).ok())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => parse_value(key, &value),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, value: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("{} has invalid value '{}'", key, value))
}
