use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Deserialize;
use tracing::{debug, info};

pub const CONFIG_FILE: &str = "kursplan.toml";
pub const DEFAULT_WINDOW_DAYS: u32 = 90;
pub const DEFAULT_OUTPUT_DIR: &str = "public";

/// Effective configuration after merging file contents with defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub window_days: u32,
    pub timezone: Option<String>,
    pub output_dir: PathBuf,
    pub color: bool,
    pub loaded_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    window: WindowSection,
    time: TimeSection,
    output: OutputSection,
    color: ColorSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WindowSection {
    days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TimeSection {
    timezone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OutputSection {
    dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ColorSection {
    enabled: Option<bool>,
}

impl Config {
    /// Loads `<site>/kursplan.toml`, or the explicitly named file. A missing
    /// default file means defaults; a missing explicit file is an error.
    #[tracing::instrument(skip(site_dir, override_path))]
    pub fn load(site_dir: &Path, override_path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match override_path {
            Some(path) => expand_tilde(path),
            None => site_dir.join(CONFIG_FILE),
        };

        if !path.exists() {
            if override_path.is_some() {
                return Err(anyhow!("config file not found: {}", path.display()));
            }
            debug!(file = %path.display(), "no config file; using defaults");
            return Ok(Self::from_file(ConfigFile::default(), None));
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let parsed: ConfigFile = toml::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        info!(file = %path.display(), "loaded config");
        Ok(Self::from_file(parsed, Some(path)))
    }

    fn from_file(file: ConfigFile, loaded_file: Option<PathBuf>) -> Self {
        Self {
            window_days: file.window.days.unwrap_or(DEFAULT_WINDOW_DAYS),
            timezone: file.time.timezone,
            output_dir: file
                .output
                .dir
                .map(|dir| expand_tilde(&dir))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            color: file.color.enabled.unwrap_or(true),
            loaded_file,
        }
    }
}

/// Resolves where the generated site goes: CLI override, else the configured
/// directory; relative paths are anchored at the site directory.
#[must_use]
pub fn resolve_output_dir(site_dir: &Path, cfg: &Config, override_dir: Option<&Path>) -> PathBuf {
    let dir = match override_dir {
        Some(dir) => expand_tilde(dir),
        None => cfg.output_dir.clone(),
    };

    if dir.is_absolute() {
        dir
    } else {
        site_dir.join(dir)
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    if let Some(rest) = text.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use tempfile::tempdir;

    use super::{Config, DEFAULT_WINDOW_DAYS, resolve_output_dir};

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let temp = tempdir().expect("tempdir");
        let cfg = Config::load(temp.path(), None).expect("load defaults");

        assert_eq!(cfg.window_days, DEFAULT_WINDOW_DAYS);
        assert_eq!(cfg.timezone, None);
        assert_eq!(cfg.output_dir, PathBuf::from("public"));
        assert!(cfg.color);
        assert!(cfg.loaded_file.is_none());
    }

    #[test]
    fn file_values_override_defaults() {
        let temp = tempdir().expect("tempdir");
        fs::write(
            temp.path().join("kursplan.toml"),
            "[window]\ndays = 30\n\n[time]\ntimezone = \"Europe/Zurich\"\n\n[output]\ndir = \"site\"\n\n[color]\nenabled = false\n",
        )
        .expect("write config");

        let cfg = Config::load(temp.path(), None).expect("load config");
        assert_eq!(cfg.window_days, 30);
        assert_eq!(cfg.timezone.as_deref(), Some("Europe/Zurich"));
        assert_eq!(cfg.output_dir, PathBuf::from("site"));
        assert!(!cfg.color);
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let missing = temp.path().join("nope.toml");
        assert!(Config::load(temp.path(), Some(&missing)).is_err());
    }

    #[test]
    fn malformed_config_is_an_error() {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join("kursplan.toml"), "[window\ndays = x").expect("write config");
        assert!(Config::load(temp.path(), None).is_err());
    }

    #[test]
    fn relative_output_dir_is_anchored_at_the_site() {
        let temp = tempdir().expect("tempdir");
        let cfg = Config::load(temp.path(), None).expect("load defaults");

        let resolved = resolve_output_dir(temp.path(), &cfg, None);
        assert_eq!(resolved, temp.path().join("public"));

        let overridden = resolve_output_dir(temp.path(), &cfg, Some(Path::new("/tmp/out")));
        assert_eq!(overridden, PathBuf::from("/tmp/out"));
    }
}
