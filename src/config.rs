use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{AppError, Result};

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_COMPLETIONS_PATH: &str = "/chat/completions";
const DEFAULT_MODEL: &str = "minimax/minimax-m2.5";
const DEFAULT_MAX_TOKENS: u64 = 4000;
const DEFAULT_TIMEOUT_SECS: u64 = 180;
const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

const DEFAULT_MAX_FILE_CHARS: u64 = 4000;
const DEFAULT_MAX_CONTEXT_CHARS: u64 = 120_000;
const DEFAULT_MAX_FILE_BYTES: u64 = 100_000;
const DEFAULT_GUIDANCE_MAX_CHARS: u64 = 5000;

/// Fully resolved settings for one run. Built once by [`AppConfig::load`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub issue_number: u64,
    pub github: GitHubConfig,
    pub llm: LlmConfig,
    pub context: ContextConfig,
    /// Path from `GITHUB_OUTPUT`; outputs go to stdout when unset.
    pub output_file: Option<PathBuf>,
}

#[derive(Clone)]
pub struct GitHubConfig {
    pub token: String,
    /// `owner/repo`
    pub repository: String,
    pub api_url: String,
}

// Manual Debug impl to avoid leaking the access token
impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("token", &"[REDACTED]")
            .field("repository", &self.repository)
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub completions_path: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub http_referer: String,
    pub title: String,
}

// Manual Debug impl to avoid leaking the API key
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("completions_path", &self.completions_path)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl LlmConfig {
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, self.completions_path)
    }
}

#[derive(Debug, Clone)]
pub struct ContextConfig {
    pub max_file_chars: usize,
    pub max_context_chars: usize,
    pub max_file_bytes: u64,
    pub guidance_max_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_file_chars: DEFAULT_MAX_FILE_CHARS as usize,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS as usize,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            guidance_max_chars: DEFAULT_GUIDANCE_MAX_CHARS as usize,
        }
    }
}

/// Flat key space shared by the optional config file and the environment.
/// Everything is read as a string so bad numeric overrides can fall back
/// to defaults instead of failing deserialization.
#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    issue_number: Option<String>,
    github_token: Option<String>,
    github_repository: Option<String>,
    github_api_url: Option<String>,
    github_output: Option<String>,
    openrouter_api_key: Option<String>,
    llm_api_base_url: Option<String>,
    llm_chat_completions_path: Option<String>,
    llm_model: Option<String>,
    openrouter_model: Option<String>,
    llm_max_tokens: Option<String>,
    llm_timeout_secs: Option<String>,
    openrouter_http_referer: Option<String>,
    openrouter_x_title: Option<String>,
    context_max_file_chars: Option<String>,
    context_max_chars: Option<String>,
    context_max_file_bytes: Option<String>,
    guidance_max_chars: Option<String>,
}

impl AppConfig {
    /// Load from an optional TOML file layered under the process environment.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("hypha").required(false));
        }

        builder = builder.add_source(config::Environment::default());

        Self::from_layers(builder.build())
    }

    /// Load from an explicit variable map instead of the process environment.
    pub fn from_source(vars: HashMap<String, String>) -> Result<Self> {
        let layers = config::Config::builder()
            .add_source(config::Environment::default().source(Some(vars)))
            .build();

        Self::from_layers(layers)
    }

    fn from_layers(
        layers: std::result::Result<config::Config, config::ConfigError>,
    ) -> Result<Self> {
        let raw: RawSettings = layers
            .and_then(|c| c.try_deserialize())
            .map_err(|e| AppError::Config(e.to_string()))?;

        Self::resolve(raw)
    }

    fn resolve(raw: RawSettings) -> Result<Self> {
        let issue_raw = require(raw.issue_number, "ISSUE_NUMBER")?;
        let issue_number = issue_raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| AppError::Config(format!("Invalid ISSUE_NUMBER: {issue_raw}")))?;

        let token = require(raw.github_token, "GITHUB_TOKEN")?;
        let repository = require(raw.github_repository, "GITHUB_REPOSITORY")?;
        if !valid_repository(&repository) {
            return Err(AppError::Config(format!(
                "Invalid GITHUB_REPOSITORY (expected owner/repo): {repository}"
            )));
        }
        let api_url = non_empty(raw.github_api_url)
            .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let api_key = require(raw.openrouter_api_key, "OPENROUTER_API_KEY")?;
        let base_url = non_empty(raw.llm_api_base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let path = non_empty(raw.llm_chat_completions_path)
            .unwrap_or_else(|| DEFAULT_COMPLETIONS_PATH.to_string());
        let completions_path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        let model = non_empty(raw.llm_model)
            .or_else(|| non_empty(raw.openrouter_model))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let max_tokens = positive_number(raw.llm_max_tokens.as_deref(), DEFAULT_MAX_TOKENS)
            .min(u64::from(u32::MAX)) as u32;
        let timeout_secs = positive_number(raw.llm_timeout_secs.as_deref(), DEFAULT_TIMEOUT_SECS);
        let http_referer = non_empty(raw.openrouter_http_referer)
            .unwrap_or_else(|| format!("https://github.com/{repository}"));
        let title = non_empty(raw.openrouter_x_title)
            .unwrap_or_else(|| format!("{repository} ai issue bot"));

        let context = ContextConfig {
            max_file_chars: positive_number(
                raw.context_max_file_chars.as_deref(),
                DEFAULT_MAX_FILE_CHARS,
            ) as usize,
            max_context_chars: positive_number(
                raw.context_max_chars.as_deref(),
                DEFAULT_MAX_CONTEXT_CHARS,
            ) as usize,
            max_file_bytes: positive_number(
                raw.context_max_file_bytes.as_deref(),
                DEFAULT_MAX_FILE_BYTES,
            ),
            guidance_max_chars: positive_number(
                raw.guidance_max_chars.as_deref(),
                DEFAULT_GUIDANCE_MAX_CHARS,
            ) as usize,
        };

        Ok(Self {
            issue_number,
            github: GitHubConfig {
                token,
                repository,
                api_url,
            },
            llm: LlmConfig {
                api_key,
                base_url,
                completions_path,
                model,
                max_tokens,
                timeout_secs,
                http_referer,
                title,
            },
            context,
            output_file: non_empty(raw.github_output).map(PathBuf::from),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn require(value: Option<String>, name: &str) -> Result<String> {
    non_empty(value).ok_or_else(|| {
        AppError::Config(format!("Missing required environment variable: {name}"))
    })
}

fn valid_repository(repository: &str) -> bool {
    match repository.split_once('/') {
        Some((owner, repo)) => !owner.is_empty() && !repo.is_empty(),
        None => false,
    }
}

/// Parse a positive number, flooring fractional values. Anything else
/// (missing, non-numeric, zero, negative, non-finite) yields the default.
fn positive_number(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(f64::floor)
        .filter(|v| *v >= 1.0)
        .map(|v| v.min(u64::MAX as f64) as u64)
        .unwrap_or(default)
}
