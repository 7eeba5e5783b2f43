use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Model used when `PIPE_MODEL` is not set.
pub const DEFAULT_PIPE_MODEL: &str = "anthropic:claude-sonnet-4-20250514";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Langbase API access.
    pub langbase: LangbaseConfig,
    /// Session database.
    pub database: DatabaseConfig,
    /// Log level and format.
    pub logging: LoggingConfig,
    /// HTTP request behavior.
    pub request: RequestConfig,
    /// Pipe names and model.
    pub pipes: PipeConfig,
    /// Report rendering.
    pub report: ReportConfig,
}

/// Langbase API configuration
#[derive(Debug, Clone)]
pub struct LangbaseConfig {
    /// Bearer token for the Langbase API.
    pub api_key: String,
    /// API base URL without a trailing slash.
    pub base_url: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// SQLite file path; created if missing.
    pub path: PathBuf,
    /// Pool size.
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    /// Human-readable lines.
    Pretty,
    /// One JSON object per event.
    Json,
}

/// HTTP request configuration.
///
/// Engine calls are never retried; a failed call degrades to the caller's
/// documented default.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

/// Langbase pipe name configuration, one pipe per request shape
#[derive(Debug, Clone)]
pub struct PipeConfig {
    /// Streams opening and follow-up interview questions.
    pub dialogue: String,
    /// Returns the structured completion verdict for a topic.
    pub completion: String,
    /// Returns the structured four-box synthesis.
    pub synthesis: String,
    /// Model the pipes are provisioned with.
    pub model: String,
}

/// Report rendering configuration
#[derive(Debug, Clone, Default)]
pub struct ReportConfig {
    /// TrueType font used for report text. Builtin Helvetica when unset.
    pub font_path: Option<PathBuf>,
    /// Directory the console writes rendered reports into.
    pub output_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let langbase = LangbaseConfig {
            api_key: env::var("LANGBASE_API_KEY").map_err(|_| AppError::Config {
                message: "LANGBASE_API_KEY is required".to_string(),
            })?,
            base_url: env::var("LANGBASE_BASE_URL")
                .unwrap_or_else(|_| "https://api.langbase.com".to_string()),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/ethics_navi.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60000),
        };

        let pipes = PipeConfig {
            dialogue: env::var("PIPE_DIALOGUE")
                .unwrap_or_else(|_| "ethics-navi-dialogue-v1".to_string()),
            completion: env::var("PIPE_COMPLETION")
                .unwrap_or_else(|_| "ethics-navi-completion-v1".to_string()),
            synthesis: env::var("PIPE_SYNTHESIS")
                .unwrap_or_else(|_| "ethics-navi-synthesis-v1".to_string()),
            model: env::var("PIPE_MODEL").unwrap_or_else(|_| DEFAULT_PIPE_MODEL.to_string()),
        };

        let report = ReportConfig {
            font_path: env::var("REPORT_FONT_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            output_dir: PathBuf::from(
                env::var("REPORT_OUTPUT_DIR").unwrap_or_else(|_| "./reports".to_string()),
            ),
        };

        Ok(Config {
            langbase,
            database,
            logging,
            request,
            pipes,
            report,
        })
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self { timeout_ms: 60000 }
    }
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            dialogue: "ethics-navi-dialogue-v1".to_string(),
            completion: "ethics-navi-completion-v1".to_string(),
            synthesis: "ethics-navi-synthesis-v1".to_string(),
            model: DEFAULT_PIPE_MODEL.to_string(),
        }
    }
}
