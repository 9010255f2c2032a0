//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// TOML configuration file contents for a ladle service
///
/// Lives at `~/.config/ladle/<service>.toml` (platform equivalent on
/// macOS/Windows). All fields are optional or defaulted so a missing or
/// partial file never blocks startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root data folder (database, per-job work directories)
    pub root_folder: Option<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Speech-to-text API key (lowest-priority source, see key resolution)
    pub asr_api_key: Option<String>,

    /// LLM API key (lowest-priority source, see key resolution)
    pub llm_api_key: Option<String>,

    /// External tool binary paths
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Speech-to-text service settings
    #[serde(default)]
    pub asr: AsrConfig,

    /// LLM service settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Pipeline tuning knobs
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            logging: LoggingConfig::default(),
            asr_api_key: None,
            llm_api_key: None,
            tools: ToolsConfig::default(),
            asr: AsrConfig::default(),
            llm: LlmConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// External tool binary paths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Video downloader binary
    #[serde(default = "default_yt_dlp")]
    pub yt_dlp_path: String,

    /// ffmpeg binary (audio extraction, frame sampling)
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: String,

    /// tesseract binary (on-screen text recognition)
    #[serde(default = "default_tesseract")]
    pub tesseract_path: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: default_yt_dlp(),
            ffmpeg_path: default_ffmpeg(),
            tesseract_path: default_tesseract(),
        }
    }
}

fn default_yt_dlp() -> String {
    "yt-dlp".to_string()
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_tesseract() -> String {
    "tesseract".to_string()
}

/// Speech-to-text service settings (Whisper-style HTTP API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsrConfig {
    /// Transcription endpoint URL
    #[serde(default = "default_asr_endpoint")]
    pub endpoint: String,

    /// Model identifier sent with each request
    #[serde(default = "default_asr_model")]
    pub model: String,
}

impl Default for AsrConfig {
    fn default() -> Self {
        Self {
            endpoint: default_asr_endpoint(),
            model: default_asr_model(),
        }
    }
}

fn default_asr_endpoint() -> String {
    "https://api.openai.com/v1/audio/transcriptions".to_string()
}

fn default_asr_model() -> String {
    "whisper-1".to_string()
}

/// LLM service settings (Messages-style HTTP API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model identifier sent with each request
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Maximum completion tokens per request
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            max_tokens: default_llm_max_tokens(),
        }
    }
}

fn default_llm_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

fn default_llm_max_tokens() -> u32 {
    4096
}

/// Pipeline tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Sufficiency confidence at or above which OCR is skipped
    #[serde(default = "default_sufficiency_threshold")]
    pub sufficiency_threshold: f64,

    /// Maximum frames sampled per video
    #[serde(default = "default_max_frames")]
    pub max_frames: usize,

    /// Scene-change detection threshold for frame sampling
    #[serde(default = "default_scene_threshold")]
    pub scene_threshold: f64,

    /// Normalized similarity above which OCR blocks are merged as duplicates
    #[serde(default = "default_ocr_similarity")]
    pub ocr_similarity_threshold: f64,

    /// Total run attempts (initial + retries) before a fatal fault is final
    #[serde(default = "default_max_run_attempts")]
    pub max_run_attempts: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sufficiency_threshold: default_sufficiency_threshold(),
            max_frames: default_max_frames(),
            scene_threshold: default_scene_threshold(),
            ocr_similarity_threshold: default_ocr_similarity(),
            max_run_attempts: default_max_run_attempts(),
        }
    }
}

fn default_sufficiency_threshold() -> f64 {
    0.7
}

fn default_max_frames() -> usize {
    8
}

fn default_scene_threshold() -> f64 {
    0.3
}

fn default_ocr_similarity() -> f64 {
    0.85
}

fn default_max_run_attempts() -> u32 {
    2
}

/// Default TOML config path for a service, e.g. `~/.config/ladle/ladle-vi.toml`
pub fn default_config_path(service_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ladle").join(format!("{}.toml", service_name)))
}

/// Load the TOML config for a service, falling back to defaults when the
/// file is absent. A present-but-unparseable file is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        return Ok(TomlConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Write the TOML config, creating parent directories as needed.
///
/// Writes to a sibling temp file and renames over the target so a crashed
/// write never leaves a truncated config behind.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Root folder resolution with env → TOML → platform-default priority
pub struct RootFolderResolver {
    service_name: String,
}

impl RootFolderResolver {
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
        }
    }

    /// Resolve the root data folder.
    ///
    /// Priority:
    /// 1. `LADLE_ROOT_FOLDER` environment variable
    /// 2. `root_folder` in the service TOML config
    /// 3. Platform data directory (`~/.local/share/ladle` on Linux)
    pub fn resolve(&self) -> PathBuf {
        if let Ok(path) = std::env::var("LADLE_ROOT_FOLDER") {
            if !path.trim().is_empty() {
                tracing::info!("Root folder from environment: {}", path);
                return PathBuf::from(path);
            }
        }

        if let Some(config_path) = default_config_path(&self.service_name) {
            if let Ok(config) = load_toml_config(&config_path) {
                if let Some(root) = config.root_folder {
                    if !root.trim().is_empty() {
                        tracing::info!("Root folder from TOML config: {}", root);
                        return PathBuf::from(root);
                    }
                }
            }
        }

        let default = dirs::data_local_dir()
            .map(|d| d.join("ladle"))
            .unwrap_or_else(|| PathBuf::from("./ladle_data"));
        tracing::info!("Root folder defaulted to {}", default.display());
        default
    }
}

/// Root folder initialization: directory creation and well-known paths
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the root folder (and work subfolder) if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.work_root())?;
        Ok(())
    }

    /// Path of the shared SQLite database inside the root folder
    pub fn database_path(&self) -> PathBuf {
        self.root.join("ladle.db")
    }

    /// Parent directory for per-job work directories
    pub fn work_root(&self) -> PathBuf {
        self.root.join("work")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
