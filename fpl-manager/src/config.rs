// Configuration loading and parsing (manager.toml, credentials.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::data::fixtures::DEFAULT_FIXTURE_WINDOW;
use crate::data::join::DEFAULT_PLAYERS_OF_INTEREST;
use crate::engine::decision::AutonomyMode;
use crate::llm::client::LlmProvider;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory that relative paths in the config resolve against.
    pub base_dir: PathBuf,
    pub manager: ManagerConfig,
    pub analysis: AnalysisConfig,
    pub llm: LlmConfig,
    pub paths: PathsConfig,
    pub credentials: CredentialsConfig,
}

impl Config {
    /// Resolve a configured path against `base_dir` unless it is absolute.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_dir.join(p)
        }
    }

    pub fn action_log_path(&self) -> PathBuf {
        self.resolve(&self.paths.action_log)
    }

    pub fn prompt_template_path(&self) -> PathBuf {
        self.resolve(&self.llm.prompt_template)
    }
}

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// The user's game entry (team) id.
    pub team_id: u64,
    pub mode: AutonomyMode,
}

// ---------------------------------------------------------------------------
// manager.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire manager.toml file.
#[derive(Debug, Clone, Deserialize)]
struct ManagerFile {
    manager: ManagerSection,
    #[serde(default)]
    analysis: AnalysisConfig,
    llm: LlmConfig,
    #[serde(default)]
    paths: PathsConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct ManagerSection {
    team_id: u64,
    mode: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_players_of_interest")]
    pub players_of_interest: usize,
    #[serde(default = "default_fixture_window")]
    pub fixture_window: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            players_of_interest: DEFAULT_PLAYERS_OF_INTEREST,
            fixture_window: DEFAULT_FIXTURE_WINDOW,
        }
    }
}

fn default_players_of_interest() -> usize {
    DEFAULT_PLAYERS_OF_INTEREST
}

fn default_fixture_window() -> u32 {
    DEFAULT_FIXTURE_WINDOW
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Backend that serves recommendations; `model` must name one of its models.
    #[serde(default)]
    pub provider: LlmProvider,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub prompt_template: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_action_log")]
    pub action_log: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            action_log: default_action_log(),
        }
    }
}

fn default_action_log() -> String {
    "fpl_bot_log.txt".to_string()
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub fpl_email: Option<String>,
    pub fpl_password: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/manager.toml` and
/// (optionally) `config/credentials.toml`, relative to `base_dir`.
///
/// Environment overrides are looked up through `env`, which lets tests
/// supply them without touching the process environment.
pub(crate) fn load_config_from(
    base_dir: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- manager.toml (required) ---
    let manager_path = config_dir.join("manager.toml");
    let manager_text = read_file(&manager_path)?;
    let manager_file: ManagerFile =
        toml::from_str(&manager_text).map_err(|e| ConfigError::ParseError {
            path: manager_path.clone(),
            source: e,
        })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let mut credentials: CredentialsConfig = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };
    apply_credential_overrides(&mut credentials, &env);

    let mode_str = env("FPL_MODE").unwrap_or(manager_file.manager.mode);
    let mode = mode_str
        .parse::<AutonomyMode>()
        .map_err(|e| ConfigError::ValidationError {
            field: "manager.mode".into(),
            message: e.to_string(),
        })?;

    let mut llm = manager_file.llm;
    if let Some(provider) = env("LLM_PROVIDER").filter(|v| !v.is_empty()) {
        llm.provider = provider
            .parse::<LlmProvider>()
            .map_err(|e| ConfigError::ValidationError {
                field: "llm.provider".into(),
                message: e.to_string(),
            })?;
    }
    if let Some(model) = env("LLM_MODEL").filter(|v| !v.is_empty()) {
        llm.model = model;
    }

    let config = Config {
        base_dir: base_dir.to_path_buf(),
        manager: ManagerConfig {
            team_id: manager_file.manager.team_id,
            mode,
        },
        analysis: manager_file.analysis,
        llm,
        paths: manager_file.paths,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// Environment variables take precedence over credentials.toml.
fn apply_credential_overrides(creds: &mut CredentialsConfig, env: &impl Fn(&str) -> Option<String>) {
    let slots: [(&str, &mut Option<String>); 6] = [
        ("FPL_EMAIL", &mut creds.fpl_email),
        ("FPL_PASSWORD", &mut creds.fpl_password),
        ("ANTHROPIC_API_KEY", &mut creds.anthropic_api_key),
        ("GEMINI_API_KEY", &mut creds.gemini_api_key),
        ("TELEGRAM_BOT_TOKEN", &mut creds.telegram_bot_token),
        ("TELEGRAM_CHAT_ID", &mut creds.telegram_chat_id),
    ];
    for (var, slot) in slots {
        if let Some(value) = env(var).filter(|v| !v.is_empty()) {
            *slot = Some(value);
        }
    }
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or pass --base-dir",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut copied = Vec::new();

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                // Never overwrite the user's copy.
            }
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Load config relative to `base_dir`, copying defaults first and reading
/// overrides from the process environment (and a `.env` file, if any).
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();
    ensure_config_files(base_dir)?;
    load_config_from(base_dir, |var| std::env::var(var).ok())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.manager.team_id == 0 {
        return Err(ConfigError::ValidationError {
            field: "manager.team_id".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.analysis.players_of_interest == 0 {
        return Err(ConfigError::ValidationError {
            field: "analysis.players_of_interest".into(),
            message: "must be > 0".into(),
        });
    }

    if config.analysis.fixture_window == 0 {
        return Err(ConfigError::ValidationError {
            field: "analysis.fixture_window".into(),
            message: "must be > 0".into(),
        });
    }

    if config.llm.model.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "llm.model".into(),
            message: "must not be empty".into(),
        });
    }

    if config.llm.max_tokens == 0 {
        return Err(ConfigError::ValidationError {
            field: "llm.max_tokens".into(),
            message: "must be > 0".into(),
        });
    }

    let t = config.llm.temperature;
    if !(0.0..=1.0).contains(&t) {
        return Err(ConfigError::ValidationError {
            field: "llm.temperature".into(),
            message: format!("must be between 0.0 and 1.0 inclusive, got {t}"),
        });
    }

    if config.llm.prompt_template.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "llm.prompt_template".into(),
            message: "must not be empty".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------

/// A valid in-memory config for unit tests.
#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        base_dir: std::env::temp_dir(),
        manager: ManagerConfig {
            team_id: 6638986,
            mode: AutonomyMode::Suggest,
        },
        analysis: AnalysisConfig::default(),
        llm: LlmConfig {
            provider: LlmProvider::Anthropic,
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 4000,
            temperature: 0.1,
            prompt_template: "config/strategy_prompt.txt".to_string(),
        },
        paths: PathsConfig::default(),
        credentials: CredentialsConfig::default(),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
