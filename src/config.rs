use serde::Deserialize;

/// Connection settings for the text-completion provider used by the estimator.
#[derive(Debug, Clone, Deserialize)]
pub struct EstimatorConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_ms: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifierKind {
    KnowledgeGraph,
    None,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    pub kind: NotifierKind,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub estimator: EstimatorConfig,
    pub notifier: NotifierConfig,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".into(),
            api_key: None,
            model: "qwen2.5:14b-instruct".into(),
            timeout_ms: 30_000,
            max_tokens: 1000,
            temperature: 0.1,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = EstimatorConfig::default();
        let estimator = EstimatorConfig {
            base_url: std::env::var("ESTIMATOR_BASE_URL").unwrap_or(defaults.base_url),
            api_key: std::env::var("ESTIMATOR_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            model: std::env::var("ESTIMATOR_MODEL").unwrap_or(defaults.model),
            timeout_ms: env_parse("ESTIMATOR_TIMEOUT_MS").unwrap_or(defaults.timeout_ms),
            max_tokens: env_parse("ESTIMATOR_MAX_TOKENS").unwrap_or(defaults.max_tokens),
            temperature: env_parse("ESTIMATOR_TEMPERATURE").unwrap_or(defaults.temperature),
        };

        let notifier = NotifierConfig {
            kind: parse_notifier_kind(std::env::var("NOTIFIER").ok().as_deref()),
            timeout_ms: env_parse("NOTIFIER_TIMEOUT_MS").unwrap_or(5_000),
        };

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://meal-log.db".into()),
            max_connections: env_parse("DB_MAX_CONNECTIONS").unwrap_or(5),
            estimator,
            notifier,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn parse_notifier_kind(raw: Option<&str>) -> NotifierKind {
    match raw.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if v == "none" || v == "off" => NotifierKind::None,
        _ => NotifierKind::KnowledgeGraph,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifier_kind_defaults_to_knowledge_graph() {
        assert_eq!(parse_notifier_kind(None), NotifierKind::KnowledgeGraph);
        assert_eq!(parse_notifier_kind(Some("bogus")), NotifierKind::KnowledgeGraph);
        assert_eq!(parse_notifier_kind(Some(" None ")), NotifierKind::None);
        assert_eq!(parse_notifier_kind(Some("off")), NotifierKind::None);
    }

    #[test]
    fn estimator_defaults_use_low_temperature() {
        let cfg = EstimatorConfig::default();
        assert_eq!(cfg.timeout_ms, 30_000);
        assert!(cfg.temperature < 0.5);
        assert!(cfg.api_key.is_none());
    }
}
