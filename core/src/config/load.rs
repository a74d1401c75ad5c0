use std::path::{Path, PathBuf};

use anyhow::Context;

use super::types::AppConfig;

/// Get the default wpm data directory: ~/.wpm
pub fn get_wpm_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".wpm"))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.wpm/config.toml (highest)
    let wpm_dir = get_wpm_data_dir()?;
    let wpm_config = wpm_dir.join("config.toml");

    // Priority 2: ./config.toml (current directory)
    let local_config = Path::new("config.toml");

    let mut cfg = if wpm_config.exists() {
        load_from_path(&wpm_config)?
    } else if local_config.exists() {
        load_from_path(local_config)?
    } else {
        AppConfig::default()
    };

    // Log files go to the data directory unless configured otherwise
    if cfg.logging.file
        && cfg
            .logging
            .directory
            .as_deref()
            .map(|s| s.trim().is_empty())
            .unwrap_or(true)
    {
        let logs_dir = wpm_dir.join("logs");
        std::fs::create_dir_all(&logs_dir)?;
        cfg.logging.directory = Some(logs_dir.to_string_lossy().to_string());
    }

    apply_env_overrides(&mut cfg);

    Ok(cfg)
}

pub fn load_from_path(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    toml::from_str::<AppConfig>(&s).with_context(|| format!("parse config {}", path.display()))
}

// Environment variable overrides (Priority 0: highest)
fn apply_env_overrides(cfg: &mut AppConfig) {
    if let Ok(v) = std::env::var("WPM_LOG_LEVEL") {
        if !v.trim().is_empty() {
            cfg.logging.level = v;
        }
    }

    if let Ok(v) = std::env::var("WPM_MONITOR_REFRESH_MS") {
        match v.trim().parse::<u64>() {
            Ok(ms) => cfg.monitor.refresh_interval_ms = ms,
            Err(_) => tracing::warn!("ignoring WPM_MONITOR_REFRESH_MS={:?}: not a number", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_empty_file_yields_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f).unwrap();

        let cfg = load_from_path(f.path()).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.runner.thread_name_prefix, "wpm-job");
        assert_eq!(cfg.monitor.refresh_interval_ms, 1_000);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"
[logging]
level = "wpm_core=debug"
file = true

[runner]
stack_size_kb = 512
"#
        )
        .unwrap();

        let cfg = load_from_path(f.path()).unwrap();
        assert_eq!(cfg.logging.level, "wpm_core=debug");
        assert!(cfg.logging.file);
        assert!(cfg.logging.console);
        assert_eq!(cfg.runner.stack_size_kb, Some(512));
        assert_eq!(cfg.runner.thread_name_prefix, "wpm-job");
        assert_eq!(cfg.monitor, Default::default());
    }

    #[test]
    fn test_invalid_toml_names_the_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "[runner\nthread_name_prefix = 1").unwrap();

        let err = load_from_path(f.path()).unwrap_err();
        assert!(err.to_string().contains("parse config"));
    }
}
