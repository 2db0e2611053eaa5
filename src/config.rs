//! Config file loading for CLI defaults.
//!
//! The file is a flat `key = value` TOML subset; strings are double-quoted
//! and `#` starts a comment outside of strings.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::debug;

/// Defaults read from `config.toml`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Default output directory.
    pub directory: Option<PathBuf>,
    /// Parallel downloads (1..=100).
    pub concurrency: Option<u8>,
    /// Retries per file (0..=20).
    pub max_retries: Option<u32>,
    /// Snapshot index page ceiling (1..=10000).
    pub max_pages: Option<u32>,
    /// HTTP connect timeout in seconds (1..=3600).
    pub connect_timeout_secs: Option<u64>,
    /// HTTP total request timeout in seconds (1..=3600).
    pub read_timeout_secs: Option<u64>,
    /// Rewrite links after every download.
    pub rewrite_links: Option<bool>,
}

impl FileConfig {
    /// Validates values against the ranges the CLI accepts.
    pub fn validate(&self) -> Result<()> {
        validate_range("concurrency", self.concurrency.map(u64::from), 1, 100)?;
        validate_range("max_retries", self.max_retries.map(u64::from), 0, 20)?;
        validate_range("max_pages", self.max_pages.map(u64::from), 1, 10_000)?;
        validate_range("connect_timeout_secs", self.connect_timeout_secs, 1, 3600)?;
        validate_range("read_timeout_secs", self.read_timeout_secs, 1, 3600)?;
        Ok(())
    }
}

fn validate_range(field: &str, value: Option<u64>, min: u64, max: u64) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(min..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

/// Resolves the config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/wayback-dl/config.toml`
/// 2. `$HOME/.config/wayback-dl/config.toml`
pub fn resolve_default_config_path() -> Option<PathBuf> {
    config_path_from(non_empty_var("XDG_CONFIG_HOME"), non_empty_var("HOME"))
}

fn config_path_from(xdg_config_home: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    let base = match xdg_config_home {
        Some(xdg) => PathBuf::from(xdg),
        None => PathBuf::from(home?).join(".config"),
    };
    Some(base.join("wayback-dl").join("config.toml"))
}

fn non_empty_var(name: &str) -> Option<OsString> {
    env::var_os(name).filter(|value| !value.is_empty())
}

/// Loads the config file if one exists at the default path.
pub fn load_default_file_config() -> Result<Option<FileConfig>> {
    let Some(path) = resolve_default_config_path() else {
        return Ok(None);
    };
    if !path.exists() {
        debug!(path = %path.display(), "no config file");
        return Ok(None);
    }
    load_file_config(&path).map(Some)
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

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };
        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {}", line_index + 1);

        match key {
            "directory" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.directory = Some(PathBuf::from(parsed));
            }
            "concurrency" => {
                let parsed = parse_integer(value).with_context(invalid)?;
                let n = u8::try_from(parsed).map_err(|_| {
                    anyhow::anyhow!("Invalid config value for `concurrency`: {parsed}")
                })?;
                cfg.concurrency = Some(n);
            }
            "max_retries" => {
                let parsed = parse_integer(value).with_context(invalid)?;
                cfg.max_retries = Some(u32::try_from(parsed).map_err(|_| {
                    anyhow::anyhow!("Invalid config value for `max_retries`: {parsed}")
                })?);
            }
            "max_pages" => {
                let parsed = parse_integer(value).with_context(invalid)?;
                cfg.max_pages = Some(u32::try_from(parsed).map_err(|_| {
                    anyhow::anyhow!("Invalid config value for `max_pages`: {parsed}")
                })?);
            }
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer(value).with_context(invalid)?);
            }
            "read_timeout_secs" => {
                cfg.read_timeout_secs = Some(parse_integer(value).with_context(invalid)?);
            }
            "rewrite_links" => {
                cfg.rewrite_links = Some(parse_boolean(value).with_context(invalid)?);
            }
            unknown => {
                bail!(
                    "Unknown configuration key: '{}' on line {}",
                    unknown,
                    line_index + 1
                );
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

fn parse_integer(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    if token.starts_with('-') {
        bail!("Expected non-negative integer");
    }
    Ok(token.parse::<u64>()?)
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn test_parse_config_all_fields() {
        let cfg = parse_config_str(
            r#"
directory = "/srv/mirrors"
concurrency = 8
max_retries = 3
max_pages = 250
connect_timeout_secs = 10
read_timeout_secs = 120
rewrite_links = true
"#,
        )
        .unwrap();

        assert_eq!(
            cfg,
            FileConfig {
                directory: Some(PathBuf::from("/srv/mirrors")),
                concurrency: Some(8),
                max_retries: Some(3),
                max_pages: Some(250),
                connect_timeout_secs: Some(10),
                read_timeout_secs: Some(120),
                rewrite_links: Some(true),
            }
        );
    }

    #[test]
    fn test_parse_config_empty_is_default() {
        assert_eq!(parse_config_str("\n# nothing\n").unwrap(), FileConfig::default());
    }

    #[test]
    fn test_parse_config_supports_inline_comments() {
        let cfg = parse_config_str(
            r#"
concurrency = 4 # workers
directory = "out#1" # hash inside string
"#,
        )
        .unwrap();
        assert_eq!(cfg.concurrency, Some(4));
        assert_eq!(cfg.directory, Some(PathBuf::from("out#1")));
    }

    #[test]
    fn test_parse_config_rejects_out_of_range_values() {
        for (raw, key) in [
            ("concurrency = 0", "concurrency"),
            ("concurrency = 101", "concurrency"),
            ("concurrency = 300", "concurrency"),
            ("max_retries = 21", "max_retries"),
            ("max_pages = 0", "max_pages"),
            ("connect_timeout_secs = 0", "connect_timeout_secs"),
            ("read_timeout_secs = 3601", "read_timeout_secs"),
        ] {
            let err = parse_config_str(raw).unwrap_err();
            assert!(
                err.to_string().contains(key),
                "{raw}: unexpected error {err}"
            );
        }
    }

    #[test]
    fn test_parse_config_rejects_trailing_tokens() {
        let err = parse_config_str("concurrency = 4 trailing").unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_parse_config_rejects_negative_integer() {
        let err = parse_config_str("max_retries = -1").unwrap_err();
        assert!(err.to_string().contains("max_retries"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_key() {
        let err = parse_config_str("rate_limit = 5").unwrap_err();
        assert!(err.to_string().contains("rate_limit"));
    }

    #[test]
    fn test_parse_config_rejects_unquoted_directory() {
        let err = parse_config_str("directory = out").unwrap_err();
        assert!(err.to_string().contains("directory"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_boolean() {
        let err = parse_config_str("rewrite_links = yes").unwrap_err();
        assert!(err.to_string().contains("rewrite_links"));
    }

    #[test]
    fn test_parse_config_rejects_missing_equals() {
        let err = parse_config_str("concurrency 4").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_config_path_prefers_xdg() {
        let path = config_path_from(Some("/xdg".into()), Some("/home/me".into())).unwrap();
        assert_eq!(path, PathBuf::from("/xdg/wayback-dl/config.toml"));
    }

    #[test]
    fn test_config_path_falls_back_to_home() {
        let path = config_path_from(None, Some("/home/me".into())).unwrap();
        assert_eq!(path, PathBuf::from("/home/me/.config/wayback-dl/config.toml"));
        assert!(config_path_from(None, None).is_none());
    }

    #[test]
    fn test_load_file_config_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "concurrency = 0").unwrap();

        let err = load_file_config(&path).unwrap_err();
        assert!(err.to_string().contains("config.toml"));
        assert!(format!("{err:#}").contains("concurrency"));
    }
}
