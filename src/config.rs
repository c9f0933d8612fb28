//! Session configuration and the optional `config.toml` defaults file.
//!
//! Precedence is CLI flags, then the config file, then [`SessionConfig::default`].

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::resolver::{DEFAULT_RESOLVE_TIMEOUT, ResolveContext};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10);
const DEFAULT_DOWNLOAD_ROOT: &str = "./downloads";
const APP_DIR_NAME: &str = "grabber";

/// Whether the platform needs an explicit storage grant before writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageMode {
    /// Managed storage; writes never need a grant.
    #[default]
    Scoped,
    /// Legacy storage; the permission gate must report access.
    Legacy,
}

impl StorageMode {
    /// Returns the stable string label for display output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scoped => "scoped",
            Self::Legacy => "legacy",
        }
    }

    /// Whether downloads must be preceded by an explicit grant.
    #[must_use]
    pub fn requires_explicit_grant(self) -> bool {
        matches!(self, Self::Legacy)
    }
}

impl std::str::FromStr for StorageMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "scoped" => Ok(Self::Scoped),
            "legacy" => Ok(Self::Legacy),
            _ => bail!("Expected one of: scoped, legacy"),
        }
    }
}

/// Effective settings for a provider session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Upper bound on one resolution.
    pub resolve_timeout: Duration,
    /// TCP connect timeout for resolver requests.
    pub connect_timeout: Duration,
    /// Root under which per-provider directories are created.
    pub download_root: PathBuf,
    /// How long successful resolutions are reused; zero disables caching.
    pub cache_ttl: Duration,
    /// Storage permission model.
    pub storage_mode: StorageMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            download_root: PathBuf::from(DEFAULT_DOWNLOAD_ROOT),
            cache_ttl: DEFAULT_CACHE_TTL,
            storage_mode: StorageMode::Scoped,
        }
    }
}

impl SessionConfig {
    /// Overlays every value present in `file`.
    #[must_use]
    pub fn with_file(mut self, file: &FileConfig) -> Self {
        if let Some(root) = &file.download_root {
            self.download_root.clone_from(root);
        }
        if let Some(secs) = file.resolve_timeout_secs {
            self.resolve_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.connect_timeout_secs {
            self.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.cache_ttl_secs {
            self.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(mode) = file.storage_mode {
            self.storage_mode = mode;
        }
        self
    }

    /// Resolution context carrying the configured timeout.
    #[must_use]
    pub fn resolve_context(&self) -> ResolveContext {
        ResolveContext::with_timeout(Some(self.resolve_timeout))
    }
}

/// Values read from `config.toml`; `None` means "not set in the file".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Default download root.
    pub download_root: Option<PathBuf>,
    /// Resolution timeout in seconds.
    pub resolve_timeout_secs: Option<u64>,
    /// Resolver connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Resolution cache TTL in seconds.
    pub cache_ttl_secs: Option<u64>,
    /// Storage permission model.
    pub storage_mode: Option<StorageMode>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first out-of-range field.
    pub fn validate(&self) -> Result<()> {
        validate_timeout_secs("resolve_timeout_secs", self.resolve_timeout_secs)?;
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        if let Some(ttl) = self.cache_ttl_secs
            && ttl > 3600
        {
            bail!("Invalid config value for `cache_ttl_secs`: {ttl}. Expected range: 0..=3600");
        }
        Ok(())
    }
}

/// Range check shared by the config file and CLI flags.
///
/// # Errors
///
/// Returns an error when `value` is outside `1..=600`.
pub fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=600");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

impl LoadedConfig {
    /// Whether configuration was loaded from disk.
    #[must_use]
    pub fn loaded_from_file(&self) -> bool {
        self.config.is_some()
    }
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/grabber/config.toml`
/// 2. `$HOME/.config/grabber/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(APP_DIR_NAME)
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR_NAME)
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path if present.
///
/// # Errors
///
/// Returns an error when the file exists but cannot be read or parsed.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(path_ref) if path_ref.exists() => {
            let config = load_file_config(path_ref)?;
            Ok(LoadedConfig {
                path,
                config: Some(config),
            })
        }
        _ => Ok(LoadedConfig { path, config: None }),
    }
}

/// Loads and validates a specific config file.
///
/// # Errors
///
/// Returns an error when the file cannot be read, has invalid syntax, an
/// unknown key, or an out-of-range value.
pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();

        match key {
            "download_root" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `download_root` value on line {line_no}"))?;
                cfg.download_root = Some(PathBuf::from(parsed));
            }
            "resolve_timeout_secs" => {
                cfg.resolve_timeout_secs = Some(parse_integer_u64(value).with_context(|| {
                    format!("Invalid `resolve_timeout_secs` value on line {line_no}")
                })?);
            }
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(value).with_context(|| {
                    format!("Invalid `connect_timeout_secs` value on line {line_no}")
                })?);
            }
            "cache_ttl_secs" => {
                cfg.cache_ttl_secs = Some(
                    parse_integer_u64(value)
                        .with_context(|| format!("Invalid `cache_ttl_secs` value on line {line_no}"))?,
                );
            }
            "storage_mode" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `storage_mode` value on line {line_no}"))?;
                cfg.storage_mode = Some(parsed.parse().with_context(|| {
                    format!("Invalid `storage_mode` value '{parsed}' on line {line_no}")
                })?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}
