//! Optional config file supplying CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// Values read from `config.toml`. Every field is optional; CLI flags win.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileConfig {
    /// Default `models/` root for downloads and listing.
    pub models_dir: Option<PathBuf>,
    /// ComfyUI installation to use when no models dir is given.
    pub comfyui_path: Option<PathBuf>,
    /// Hub base URL.
    pub hub_endpoint: Option<String>,
    /// Branch, tag or commit to download from.
    pub revision: Option<String>,
    /// Attempts per download, including the first (1..=20).
    pub max_attempts: Option<u32>,
    /// Delay between attempts in milliseconds.
    pub retry_delay_ms: Option<u64>,
    /// Tolerated difference between declared and written size.
    pub size_tolerance_bytes: Option<u64>,
    /// Progress reporting step in percent.
    pub progress_step_percent: Option<f64>,
    /// Download connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Download idle read timeout in seconds.
    pub read_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Checks values against the ranges the CLI accepts.
    pub fn validate(&self) -> Result<()> {
        if let Some(attempts) = self.max_attempts
            && !(1..=20).contains(&attempts)
        {
            bail!("Invalid config value for `max_attempts`: {attempts}. Expected range: 1..=20");
        }

        if let Some(delay) = self.retry_delay_ms
            && delay > 60_000
        {
            bail!("Invalid config value for `retry_delay_ms`: {delay}. Expected range: 0..=60000");
        }

        if let Some(step) = self.progress_step_percent
            && !(step > 0.0 && step <= 100.0)
        {
            bail!(
                "Invalid config value for `progress_step_percent`: {step}. Expected range: (0, 100]"
            );
        }

        if let Some(endpoint) = &self.hub_endpoint
            && url::Url::parse(endpoint).is_err()
        {
            bail!("Invalid config value for `hub_endpoint`: '{endpoint}' is not a URL");
        }

        if let Some(revision) = &self.revision
            && revision.trim().is_empty()
        {
            bail!("Invalid config value for `revision`: must not be empty");
        }

        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Resolves the config file location.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/comfyfetch/config.toml`
/// 2. `$HOME/.config/comfyfetch/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("comfyfetch")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("comfyfetch")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file if one exists; a missing file yields defaults.
pub fn load_default_file_config() -> Result<FileConfig> {
    match resolve_default_config_path() {
        Some(path) if path.exists() => load_file_config(&path),
        _ => Ok(FileConfig::default()),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        let line_no = line_index + 1;

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let context = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "models_dir" => {
                cfg.models_dir = Some(PathBuf::from(
                    parse_string_literal(value).with_context(context)?,
                ));
            }
            "comfyui_path" => {
                cfg.comfyui_path = Some(PathBuf::from(
                    parse_string_literal(value).with_context(context)?,
                ));
            }
            "hub_endpoint" => {
                cfg.hub_endpoint = Some(parse_string_literal(value).with_context(context)?);
            }
            "revision" => {
                cfg.revision = Some(parse_string_literal(value).with_context(context)?);
            }
            "max_attempts" => {
                let parsed = parse_integer_u64(value).with_context(context)?;
                let n = u32::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("max_attempts out of range for u32"))?;
                cfg.max_attempts = Some(n);
            }
            "retry_delay_ms" => {
                cfg.retry_delay_ms = Some(parse_integer_u64(value).with_context(context)?);
            }
            "size_tolerance_bytes" => {
                cfg.size_tolerance_bytes = Some(parse_integer_u64(value).with_context(context)?);
            }
            "progress_step_percent" => {
                cfg.progress_step_percent = Some(parse_float(value).with_context(context)?);
            }
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "read_timeout_secs" => {
                cfg.read_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
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

fn parse_float(raw_value: &str) -> Result<f64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected number");
    }
    let value = token.parse::<f64>()?;
    if !value.is_finite() {
        bail!("Expected finite number");
    }
    Ok(value)
}
