use crate::error::PlannerError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";
const ENV_PREFIX: &str = "MIRAGE_";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub atmos_cmd: String,
    pub gen_tts_cmd: String,
    pub lumina_cmd: String,
    pub vidius_cmd: String,
    pub music_cmd: String,
    pub ffmpeg_cmd: String,
    pub ffprobe_cmd: String,
    pub convert_cmd: String,

    pub default_location: String,
    pub output_base_dir: PathBuf,
    pub log_file: PathBuf,
    pub library_dir: PathBuf,

    pub planner_model: String,
    pub planner_endpoint: String,
    pub fade_duration: f64,
    pub news_voice_volume: f64,
    pub news_music_volume: f64,
}

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// `~/.config/mirage`
pub fn config_dir() -> PathBuf {
    home().join(".config").join("mirage")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            atmos_cmd: "atmos".to_string(),
            gen_tts_cmd: "gen-tts".to_string(),
            lumina_cmd: "lumina".to_string(),
            vidius_cmd: "vidius".to_string(),
            music_cmd: "music".to_string(),
            ffmpeg_cmd: "ffmpeg".to_string(),
            ffprobe_cmd: "ffprobe".to_string(),
            convert_cmd: "convert".to_string(),
            default_location: "home".to_string(),
            output_base_dir: home().join("Documents").join("Mirage"),
            log_file: config_dir().join("mirage.log"),
            library_dir: config_dir().join("characters"),
            planner_model: "gemini-2.0-flash-exp".to_string(),
            planner_endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            fade_duration: 0.5,
            news_voice_volume: 1.0,
            news_music_volume: 0.15,
        }
    }
}

impl Config {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;

        if config.fade_duration < 0.0 {
            anyhow::bail!("config: fade_duration must not be negative");
        }

        Ok(config)
    }

    /// Build the process configuration: defaults, then the JSON file (an
    /// explicit path must exist, the default one may not), then `MIRAGE_*`
    /// keys from the user `.env` file, then `MIRAGE_*` environment variables.
    pub async fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut cfg = match explicit {
            Some(path) => Self::load(path).await?,
            None => {
                let path = config_dir().join("config.json");
                if fs::metadata(&path).await.is_ok() {
                    Self::load(&path).await?
                } else {
                    Self::default()
                }
            }
        };

        let env_file = config_dir().join(".env");
        if let Ok(iter) = dotenvy::from_path_iter(&env_file) {
            cfg.apply_overrides(iter.filter_map(|item| item.ok()))?;
        }
        cfg.apply_overrides(std::env::vars())?;
        Ok(cfg)
    }

    /// Apply `MIRAGE_<FIELD>=value` pairs; unrelated keys are ignored.
    pub fn apply_overrides<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(field) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match field.to_ascii_lowercase().as_str() {
                "atmos_cmd" => self.atmos_cmd = value,
                "gen_tts_cmd" => self.gen_tts_cmd = value,
                "lumina_cmd" => self.lumina_cmd = value,
                "vidius_cmd" => self.vidius_cmd = value,
                "music_cmd" => self.music_cmd = value,
                "ffmpeg_cmd" => self.ffmpeg_cmd = value,
                "ffprobe_cmd" => self.ffprobe_cmd = value,
                "convert_cmd" => self.convert_cmd = value,
                "default_location" => self.default_location = value,
                "output_base_dir" => self.output_base_dir = PathBuf::from(value),
                "log_file" => self.log_file = PathBuf::from(value),
                "library_dir" => self.library_dir = PathBuf::from(value),
                "planner_model" => self.planner_model = value,
                "planner_endpoint" => self.planner_endpoint = value,
                "fade_duration" => {
                    self.fade_duration = value
                        .parse()
                        .with_context(|| format!("{}: not a number: {}", key, value))?
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Credential for the planning API: process environment first, then a
/// `GOOGLE_API_KEY=` line in `env_file`.
pub fn resolve_api_key(env_file: &Path) -> Result<String, PlannerError> {
    resolve_api_key_with(std::env::var(API_KEY_VAR).ok(), env_file)
}

pub fn resolve_api_key_with(from_env: Option<String>, env_file: &Path) -> Result<String, PlannerError> {
    if let Some(key) = from_env.filter(|k| !k.trim().is_empty()) {
        return Ok(key);
    }

    if let Ok(iter) = dotenvy::from_path_iter(env_file) {
        for (key, value) in iter.flatten() {
            if key == API_KEY_VAR && !value.trim().is_empty() {
                return Ok(value.trim().to_string());
            }
        }
    }

    Err(PlannerError::MissingCredential(env_file.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_expected_tools() {
        let cfg = Config::default();
        assert_eq!(cfg.default_location, "home");
        assert_eq!(cfg.atmos_cmd, "atmos");
        assert_eq!(cfg.fade_duration, 0.5);
        assert!(cfg.log_file.ends_with(".config/mirage/mirage.log"));
        assert!(cfg.output_base_dir.ends_with("Documents/Mirage"));
    }

    #[test]
    fn overrides_only_touch_prefixed_keys() {
        let mut cfg = Config::default();
        cfg.apply_overrides(vec![
            ("MIRAGE_ATMOS_CMD".to_string(), "/opt/atmos".to_string()),
            ("MIRAGE_FADE_DURATION".to_string(), "1.25".to_string()),
            ("ATMOS_CMD".to_string(), "ignored".to_string()),
        ])
        .unwrap();
        assert_eq!(cfg.atmos_cmd, "/opt/atmos");
        assert_eq!(cfg.fade_duration, 1.25);
    }

    #[test]
    fn bad_numeric_override_is_an_error() {
        let mut cfg = Config::default();
        let res = cfg.apply_overrides(vec![(
            "MIRAGE_FADE_DURATION".to_string(),
            "slow".to_string(),
        )]);
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"lumina_cmd": "lumina-dev"}"#).unwrap();
        let cfg = Config::load(&path).await.unwrap();
        assert_eq!(cfg.lumina_cmd, "lumina-dev");
        assert_eq!(cfg.vidius_cmd, "vidius");
    }

    #[test]
    fn api_key_prefers_environment() {
        let dir = tempfile::tempdir().unwrap();
        let env_file = dir.path().join(".env");
        std::fs::write(&env_file, "GOOGLE_API_KEY=from-file\n").unwrap();
        let key = resolve_api_key_with(Some("from-env".to_string()), &env_file).unwrap();
        assert_eq!(key, "from-env");
    }

    #[test]
    fn api_key_falls_back_to_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let env_file = dir.path().join(".env");
        std::fs::write(&env_file, "OTHER=1\nGOOGLE_API_KEY=\"quoted-key\"\n").unwrap();
        let key = resolve_api_key_with(None, &env_file).unwrap();
        assert_eq!(key, "quoted-key");
    }

    #[test]
    fn missing_api_key_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_api_key_with(None, &dir.path().join("absent.env")).unwrap_err();
        assert!(matches!(err, PlannerError::MissingCredential(_)));
    }
}
