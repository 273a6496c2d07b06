use crate::error::{Error, Result};
use crate::llm::LlmConfig;
use crate::orchestrator::RetryPolicy;
use crate::screen::DisplayId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Environment variable selecting the target display (1-based)
pub const MONITOR_ID_ENV: &str = "MONITOR_ID";
/// Environment variable holding the OpenAI credential
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "PLCCTL_CONFIG";

/// Main configuration for plcctl
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub run: RunSettings,
    #[serde(default)]
    pub matching: MatchSettings,
    #[serde(default)]
    pub input: InputSettings,
}

/// LLM backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmSettings {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Falls back to OPENAI_API_KEY when unset
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_planner_temperature")]
    pub planner_temperature: f32,
    #[serde(default = "default_generator_temperature")]
    pub generator_temperature: f32,
    #[serde(default = "default_generator_max_tokens")]
    pub generator_max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_backend() -> String {
    "openai".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_planner_temperature() -> f32 {
    0.1
}

fn default_generator_temperature() -> f32 {
    0.3
}

fn default_generator_max_tokens() -> u32 {
    500
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            planner_temperature: default_planner_temperature(),
            generator_temperature: default_generator_temperature(),
            generator_max_tokens: default_generator_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmSettings {
    /// Resolve the backend, pulling the credential from the environment if needed
    pub fn to_llm_config(&self) -> Result<LlmConfig> {
        let timeout = Duration::from_secs(self.timeout_secs);
        match self.backend.to_lowercase().as_str() {
            "ollama" => Ok(LlmConfig::Ollama {
                url: self.base_url.clone(),
                model: self.model.clone(),
                timeout,
            }),
            "openai" => {
                let api_key = self
                    .api_key
                    .clone()
                    .filter(|k| !k.trim().is_empty())
                    .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()))
                    .ok_or_else(|| {
                        Error::Configuration(format!("{} is not set", API_KEY_ENV))
                    })?;
                Ok(LlmConfig::OpenAI {
                    url: self.base_url.clone(),
                    model: self.model.clone(),
                    api_key,
                    timeout,
                })
            }
            other => Err(Error::Configuration(format!(
                "unknown LLM backend '{}' (expected 'openai' or 'ollama')",
                other
            ))),
        }
    }
}

/// Files, pacing and retry behaviour of a run
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunSettings {
    #[serde(default = "default_instruction_file")]
    pub instruction_file: PathBuf,
    #[serde(default = "default_steps_file")]
    pub steps_file: PathBuf,
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: f64,
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    /// Unbounded when unset
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default = "default_true")]
    pub cache_generated_code: bool,
}

fn default_instruction_file() -> PathBuf {
    PathBuf::from("input_text/order.txt")
}

fn default_steps_file() -> PathBuf {
    PathBuf::from("parsed_steps/steps.json")
}

fn default_step_delay_ms() -> u64 {
    1000
}

fn default_retry_delay_ms() -> u64 {
    5000
}

fn default_retry_backoff() -> f64 {
    1.0
}

fn default_max_retry_delay_ms() -> u64 {
    60_000
}

fn default_true() -> bool {
    true
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            instruction_file: default_instruction_file(),
            steps_file: default_steps_file(),
            step_delay_ms: default_step_delay_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            retry_backoff: default_retry_backoff(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            max_retries: None,
            cache_generated_code: true,
        }
    }
}

/// On-screen template matching
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatchSettings {
    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("capture")
}

fn default_threshold() -> f32 {
    0.8
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            template_dir: default_template_dir(),
            threshold: default_threshold(),
        }
    }
}

/// Keyboard/pointer injection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputSettings {
    #[serde(default = "default_paste_chord")]
    pub paste_chord: String,
    #[serde(default = "default_focus_delay_ms")]
    pub focus_delay_ms: u64,
}

fn default_paste_chord() -> String {
    "ctrl+v".to_string()
}

fn default_focus_delay_ms() -> u64 {
    100
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            paste_chord: default_paste_chord(),
            focus_delay_ms: default_focus_delay_ms(),
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return PathBuf::from(path);
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".config/plcctl/config.toml")
    }

    /// Load config from the default location, returning defaults if missing
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from a file, returning defaults if it doesn't exist or can't be parsed
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(config) => return config,
                    Err(e) => warn!(path = %path.display(), "Failed to parse config: {}", e),
                },
                Err(e) => warn!(path = %path.display(), "Failed to read config: {}", e),
            }
        }
        Self::default()
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("cannot serialize config: {}", e)))?;
        fs::write(path, contents)?;
        Ok(())
    }
}

/// Everything a run needs, resolved once and never mutated afterwards
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub display: DisplayId,
    pub instruction_path: PathBuf,
    pub steps_path: PathBuf,
    pub template_dir: PathBuf,
    pub threshold: f32,
    pub step_delay: Duration,
    pub retry: RetryPolicy,
    pub cache_generated_code: bool,
    pub paste_chord: String,
    pub focus_delay: Duration,
}

impl RunConfig {
    /// Resolve relative paths in `config` against the project root
    pub fn resolve(config: &Config, root: &Path, display: DisplayId) -> Self {
        let run = &config.run;
        Self {
            display,
            instruction_path: root.join(&run.instruction_file),
            steps_path: root.join(&run.steps_file),
            template_dir: root.join(&config.matching.template_dir),
            threshold: config.matching.threshold,
            step_delay: Duration::from_millis(run.step_delay_ms),
            retry: RetryPolicy {
                delay: Duration::from_millis(run.retry_delay_ms),
                backoff: run.retry_backoff,
                max_delay: Duration::from_millis(run.max_retry_delay_ms),
                max_retries: run.max_retries,
            },
            cache_generated_code: run.cache_generated_code,
            paste_chord: config.input.paste_chord.clone(),
            focus_delay: Duration::from_millis(config.input.focus_delay_ms),
        }
    }
}

/// Read MONITOR_ID, defaulting to the first display
pub fn display_from_env() -> Result<DisplayId> {
    match std::env::var(MONITOR_ID_ENV) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Configuration(format!("{}: {}", MONITOR_ID_ENV, e))),
        Err(_) => Ok(DisplayId::default()),
    }
}
