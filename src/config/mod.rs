use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_server: ServerConfig,
    pub sheets: SheetsConfig,
    pub pipeline: PipelineConfig,
    pub insights: InsightsConfig,
    pub auth: AuthConfig,
    pub pagination: PaginationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub api_key: String,
    pub base_url: String,
    /// Optional tab name prefixed to every requested range (`Tab!A1:K50000`)
    #[serde(default)]
    pub sheet_name: Option<String>,
    pub first_column: String,
    pub last_column: String,
    pub page_size: usize,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub cache_ttl_secs: u64,
    pub metric_memo_max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightsConfig {
    /// Completion API key; insights are disabled when unset
    #[serde(default)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub cooldown_secs: u64,
    pub context_records: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Accepted dashboard API keys. Empty means the check is disabled.
    #[serde(default)]
    pub api_keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PaginationConfig {
    #[serde(default)]
    pub cursor_hmac_secret: Option<String>,
}

impl SheetsConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://sheets.googleapis.com";
    pub const DEFAULT_PAGE_SIZE: usize = 50_000;
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 10_000,
            cache_ttl_secs: 300,
            metric_memo_max_entries: 100_000,
        }
    }
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 150,
            temperature: 0.7,
            cooldown_secs: 12,
            context_records: 100,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let api_host = env_or("API_HOST", "127.0.0.1");
        let api_port = env_parse::<u16>("API_PORT", 8080)?;

        let spreadsheet_id = std::env::var("SHEETS_SPREADSHEET_ID")
            .context("SHEETS_SPREADSHEET_ID must be set")?;
        let sheets_api_key =
            std::env::var("SHEETS_API_KEY").context("SHEETS_API_KEY must be set")?;

        let page_size = env_parse::<usize>("SHEETS_PAGE_SIZE", SheetsConfig::DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            anyhow::bail!("SHEETS_PAGE_SIZE must be greater than zero");
        }

        let sheets = SheetsConfig {
            spreadsheet_id,
            api_key: sheets_api_key,
            base_url: env_or("SHEETS_BASE_URL", SheetsConfig::DEFAULT_BASE_URL),
            sheet_name: std::env::var("SHEETS_SHEET_NAME")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            first_column: env_or("SHEETS_FIRST_COLUMN", "A").to_uppercase(),
            last_column: env_or("SHEETS_LAST_COLUMN", "K").to_uppercase(),
            page_size,
            request_timeout_secs: env_parse::<u64>("SHEETS_REQUEST_TIMEOUT_SECS", 60)?,
        };

        let pipeline_defaults = PipelineConfig::default();
        let batch_size = env_parse::<usize>("PIPELINE_BATCH_SIZE", pipeline_defaults.batch_size)?;
        let pipeline = PipelineConfig {
            batch_size: if batch_size == 0 {
                tracing::warn!(
                    "PIPELINE_BATCH_SIZE=0 is not usable, falling back to {}",
                    pipeline_defaults.batch_size
                );
                pipeline_defaults.batch_size
            } else {
                batch_size
            },
            cache_ttl_secs: env_parse::<u64>(
                "AD_DATA_CACHE_TTL_SECS",
                pipeline_defaults.cache_ttl_secs,
            )?,
            metric_memo_max_entries: env_parse::<usize>(
                "METRIC_MEMO_MAX_ENTRIES",
                pipeline_defaults.metric_memo_max_entries,
            )?,
        };

        let insights_defaults = InsightsConfig::default();
        let insights = InsightsConfig {
            api_key: std::env::var("INSIGHTS_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            base_url: env_or("INSIGHTS_BASE_URL", &insights_defaults.base_url),
            model: env_or("INSIGHTS_MODEL", &insights_defaults.model),
            max_tokens: env_parse::<u32>("INSIGHTS_MAX_TOKENS", insights_defaults.max_tokens)?,
            temperature: env_parse::<f32>("INSIGHTS_TEMPERATURE", insights_defaults.temperature)?,
            cooldown_secs: env_parse::<u64>(
                "INSIGHTS_COOLDOWN_SECS",
                insights_defaults.cooldown_secs,
            )?,
            context_records: env_parse::<usize>(
                "INSIGHTS_CONTEXT_RECORDS",
                insights_defaults.context_records,
            )?,
        };

        let api_keys = std::env::var("API_KEYS")
            .map(|v| parse_list(&v))
            .unwrap_or_default();

        let cursor_hmac_secret = std::env::var("CURSOR_HMAC_SECRET").ok();
        if cursor_hmac_secret.is_none() {
            tracing::warn!(
                "CURSOR_HMAC_SECRET is not set; pagination cursors will not survive restarts"
            );
        }

        Ok(Config {
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            sheets,
            pipeline,
            insights,
            auth: AuthConfig { api_keys },
            pagination: PaginationConfig { cursor_hmac_secret },
        })
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
