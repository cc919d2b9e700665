use serde::Deserialize;

/// Main configuration structure for the catalog crawler
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub memo: MemoConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub driver: DriverConfig,
    pub genres: GenreConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Minimum time between two remote calls (milliseconds)
    #[serde(rename = "request-delay-ms", default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Retries for throttled or server-error responses
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff (milliseconds)
    #[serde(rename = "retry-backoff-ms", default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Hydration attempts per artist before it is marked failed
    #[serde(rename = "max-artist-retries", default = "default_max_artist_retries")]
    pub max_artist_retries: u32,

    /// Artists requested per genre search page
    #[serde(rename = "search-page-size", default = "default_search_page_size")]
    pub search_page_size: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: default_request_delay_ms(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_artist_retries: default_max_artist_retries(),
            search_page_size: default_search_page_size(),
        }
    }
}

/// Remote catalog API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the catalog API (no trailing slash)
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// App-level bearer token. Overridden by `CATALOG_CRAWLER_ACCESS_TOKEN`.
    #[serde(rename = "access-token", default)]
    pub access_token: Option<String>,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            access_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Memoization store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MemoConfig {
    /// Connection string of the shared store. When absent, progress is kept
    /// in process memory only.
    #[serde(default)]
    pub connection: Option<String>,

    /// Prefix applied to every memo key
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Expiry applied to every written key (seconds, 0 disables)
    #[serde(rename = "ttl-seconds", default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl Default for MemoConfig {
    fn default() -> Self {
        Self {
            connection: None,
            namespace: default_namespace(),
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite catalog database
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Settings for the looping driver
#[derive(Debug, Clone, Deserialize)]
pub struct DriverConfig {
    /// Sleep between cycles (seconds)
    #[serde(rename = "loop-sleep-secs", default = "default_loop_sleep_secs")]
    pub loop_sleep_secs: f64,

    /// Multiplier applied to the sleep after an idle cycle
    #[serde(
        rename = "idle-backoff-multiplier",
        default = "default_idle_backoff_multiplier"
    )]
    pub idle_backoff_multiplier: f64,

    /// Upper bound for the idle sleep (seconds)
    #[serde(rename = "idle-max-sleep-secs", default = "default_idle_max_sleep_secs")]
    pub idle_max_sleep_secs: f64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            loop_sleep_secs: default_loop_sleep_secs(),
            idle_backoff_multiplier: default_idle_backoff_multiplier(),
            idle_max_sleep_secs: default_idle_max_sleep_secs(),
        }
    }
}

/// Genre seeds driving artist discovery
#[derive(Debug, Clone, Deserialize)]
pub struct GenreConfig {
    pub seeds: Vec<String>,
}

fn default_request_delay_ms() -> u64 {
    200
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_max_artist_retries() -> u32 {
    5
}

fn default_search_page_size() -> u32 {
    50
}

fn default_base_url() -> String {
    "https://api.spotify.com/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_namespace() -> String {
    "crawl_catalog".to_string()
}

fn default_ttl_seconds() -> u64 {
    86_400
}

fn default_loop_sleep_secs() -> f64 {
    900.0
}

fn default_idle_backoff_multiplier() -> f64 {
    2.0
}

fn default_idle_max_sleep_secs() -> f64 {
    3600.0
}
