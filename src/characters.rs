//! Named portrait library: one `<name>.png` per character.

use crate::config::Config;
use crate::gateway::{ToolCommand, ToolRunner};
use crate::stages::{Production, Stage};
use crate::{logi, logok};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

pub const PORTRAIT_EXT: &str = "png";

pub fn portrait_prompt(description: &str) -> String {
    format!(
        "Portrait of {}, facing the camera, cinematic lighting, highly detailed",
        description.trim()
    )
}

/// Image generation call that reads its prompt from `prompt_file` and writes
/// `<dir>/<filename>`.
pub fn image_command(cfg: &Config, prompt_file: &Path, dir: &Path, filename: &str) -> ToolCommand {
    ToolCommand::new(&cfg.lumina_cmd)
        .arg("--opt")
        .arg("--output-dir")
        .path_arg(dir)
        .args(["-f", filename])
        .stdin_from(prompt_file)
}

pub struct CharacterLibrary {
    dir: PathBuf,
}

impl CharacterLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{}.{}", name, PORTRAIT_EXT)))
    }

    pub async fn portrait(&self, name: &str) -> Result<PathBuf> {
        let path = self.path_for(name)?;
        if fs::metadata(&path).await.is_err() {
            anyhow::bail!("Character '{}' not found in {}", name, self.dir.display());
        }
        Ok(path)
    }

    /// Copy `image` into the library as `name`, replacing any existing one.
    pub async fn add(&self, name: &str, image: &Path) -> Result<PathBuf> {
        let dest = self.path_for(name)?;
        fs::create_dir_all(&self.dir).await?;
        fs::copy(image, &dest)
            .await
            .with_context(|| format!("Failed to copy {} to {}", image.display(), dest.display()))?;
        logok(format!("Added character '{}': {}", name, dest.display()));
        Ok(dest)
    }

    /// Generate a portrait for `name` from `description`.
    pub async fn create(
        &self,
        cfg: &Config,
        runner: &dyn ToolRunner,
        name: &str,
        description: &str,
        quiet: bool,
    ) -> Result<PathBuf> {
        let dest = self.path_for(name)?;
        fs::create_dir_all(&self.dir).await?;

        let prompt_file = std::env::temp_dir().join(format!(
            "mirage-character-{}-{}.txt",
            name,
            std::process::id()
        ));
        fs::write(&prompt_file, portrait_prompt(description)).await?;

        let filename = format!("{}.{}", name, PORTRAIT_EXT);
        let stage = Stage::new(format!("Generating portrait for '{}'", name))
            .call(image_command(cfg, &prompt_file, &self.dir, &filename))
            .produces(&dest);
        let result = Production::new(runner, quiet).run_stage(&stage).await;
        let _ = fs::remove_file(&prompt_file).await;
        result?;

        logok(format!("Created character '{}': {}", name, dest.display()));
        Ok(dest)
    }

    /// `true` if a portrait was deleted.
    pub async fn remove(&self, name: &str) -> Result<bool> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                logi(format!("Removed character '{}'", name));
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }

    /// Sorted character names.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            let path = entry.path();
            let is_portrait = entry.file_type().is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(PORTRAIT_EXT));
            if !is_portrait {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

fn validate_name(name: &str) -> Result<()> {
    let bad = name.trim().is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.contains("..");
    if bad {
        anyhow::bail!("Invalid character name: {:?}", name);
    }
    Ok(())
}
