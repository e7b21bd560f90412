use crate::config::Config;
use crate::gateway::{ToolCommand, ToolRunner};
use crate::logi;
use anyhow::{Context, Result};
use tokio::fs;

pub async fn ensure_directories(cfg: &Config) -> Result<()> {
    let mut dirs = vec![cfg.output_base_dir.clone(), cfg.library_dir.clone()];
    if let Some(parent) = cfg.log_file.parent() {
        dirs.push(parent.to_path_buf());
    }

    for dir in dirs {
        if fs::metadata(&dir).await.is_err() {
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
            logi(format!("Created directory: {}", dir.display()));
        }
    }
    Ok(())
}

/// `true` when `ffmpeg -version` runs successfully.
pub async fn check_ffmpeg(cfg: &Config, runner: &dyn ToolRunner) -> bool {
    runner
        .invoke(&ToolCommand::new(&cfg.ffmpeg_cmd).arg("-version"), true)
        .await
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config {
            output_base_dir: dir.path().join("out"),
            library_dir: dir.path().join("lib/characters"),
            log_file: dir.path().join("logs/mirage.log"),
            ..Config::default()
        };
        ensure_directories(&cfg).await.unwrap();
        assert!(cfg.output_base_dir.is_dir());
        assert!(cfg.library_dir.is_dir());
        assert!(dir.path().join("logs").is_dir());
    }
}
