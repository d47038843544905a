//! Configuration file model and root folder resolution
//!
//! Every setting follows the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable TOML file never aborts startup; the service logs a
//! warning and continues with defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "SONGMAP_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "songmap.db";

/// Contents of a service TOML file (e.g. `songmap-colors.toml`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_folder: Option<PathBuf>,

    /// HTTP listen port (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Enrichment pipeline tuning
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// External data sources
    #[serde(default)]
    pub sources: SourcesSection,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[pipeline]` table
///
/// All fields are optional so that unset values fall through to the
/// compiled defaults of the consuming service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permits: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub song_limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl_hours: Option<u64>,
}

/// `[sources]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcesSection {
    /// Base URL of the top-songs RSS feed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_base_url: Option<String>,

    /// GeoJSON dataset providing the country catalog
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countries_geojson: Option<PathBuf>,
}

/// Compiled defaults used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
}

impl CompiledDefaults {
    /// Defaults for the platform this binary was built for
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
        }
    }
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/songmap (or /var/lib/songmap for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("songmap"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/songmap"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/songmap
        dirs::data_dir()
            .map(|d| d.join("songmap"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/songmap"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\songmap
        dirs::data_local_dir()
            .map(|d| d.join("songmap"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\songmap"))
    } else {
        PathBuf::from("./songmap_data")
    }
}

/// Locate the TOML file for a module
///
/// Checks `<config_dir>/songmap/<module>.toml`, then on Linux
/// `/etc/songmap/<module>.toml`. Returns `None` if neither exists.
pub fn config_file_path(module_name: &str) -> Option<PathBuf> {
    let file_name = format!("{}.toml", module_name);

    if let Some(user_config) = dirs::config_dir().map(|d| d.join("songmap").join(&file_name)) {
        if user_config.exists() {
            return Some(user_config);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/songmap").join(&file_name);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
}

/// Load the module's TOML config, degrading to defaults
///
/// An explicit path that cannot be read is logged and ignored, same as a
/// missing default file.
pub fn load_module_config(module_name: &str, explicit_path: Option<&Path>) -> TomlConfig {
    let path = match explicit_path {
        Some(p) => Some(p.to_path_buf()),
        None => config_file_path(module_name),
    };

    let Some(path) = path else {
        debug!(module = module_name, "No config file found, using defaults");
        return TomlConfig::default();
    };

    match load_toml_config(&path) {
        Ok(config) => {
            debug!(path = %path.display(), "Loaded config file");
            config
        }
        Err(e) => {
            warn!("{}; continuing with defaults", e);
            TomlConfig::default()
        }
    }
}

/// Root folder resolution following the standard priority order
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_config: Option<TomlConfig>,
}

impl RootFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            cli_arg: None,
            toml_config: None,
        }
    }

    /// Command-line override
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Use an already loaded TOML config instead of searching for one
    pub fn with_toml_config(mut self, config: TomlConfig) -> Self {
        self.toml_config = Some(config);
        self
    }

    /// Resolve the root folder; never fails
    pub fn resolve(&self) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        // Priority 3: TOML config file
        let toml_root = match &self.toml_config {
            Some(config) => config.root_folder.clone(),
            None => load_module_config(&self.module_name, None).root_folder,
        };
        if let Some(path) = toml_root {
            return path;
        }

        // Priority 4: OS-dependent compiled default
        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder on first start
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder (and parents) if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            tracing::info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    /// Path of the shared SQLite database
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_default_level_is_info() {
        assert_eq!(LoggingConfig::default().level, "info");
    }

    #[test]
    fn test_empty_toml_parses_to_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
    }

    #[test]
    fn test_pipeline_section_parses() {
        let config: TomlConfig = toml::from_str(
            r#"
            port = 6000

            [pipeline]
            permits = 4
            fetch_timeout_ms = 1500

            [sources]
            feed_base_url = "http://localhost:9999"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, Some(6000));
        assert_eq!(config.pipeline.permits, Some(4));
        assert_eq!(config.pipeline.batch_size, None);
        assert_eq!(config.pipeline.fetch_timeout_ms, Some(1500));
        assert_eq!(
            config.sources.feed_base_url.as_deref(),
            Some("http://localhost:9999")
        );
    }

    #[test]
    fn test_database_path_in_root_folder() {
        let init = RootFolderInitializer::new(PathBuf::from("/tmp/songmap-root"));
        assert_eq!(
            init.database_path(),
            PathBuf::from("/tmp/songmap-root/songmap.db")
        );
    }
}
