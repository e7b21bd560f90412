use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tokio::fs;

/// One workflow run and the directory it owns.
#[derive(Debug, Clone)]
pub struct Job {
    pub subject: String,
    pub output_dir: PathBuf,
    pub silent: bool,
    pub video: bool,
}

pub fn sanitize_subject(subject: &str) -> String {
    subject.replace(' ', "_").replace('/', "-")
}

pub fn job_dir_name(subject: &str, at: DateTime<Local>) -> String {
    format!("{}_{}", sanitize_subject(subject), at.format("%Y-%m-%d_%H-%M-%S"))
}

impl Job {
    /// Create `<base>/<sanitized subject>_<timestamp>` and return the job.
    pub async fn create(base: &Path, subject: &str, silent: bool, video: bool) -> Result<Self> {
        let output_dir = base.join(job_dir_name(subject, Local::now()));
        fs::create_dir_all(&output_dir)
            .await
            .with_context(|| format!("Failed to create output dir {}", output_dir.display()))?;
        Ok(Self {
            subject: subject.to_string(),
            output_dir,
            silent,
            video,
        })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn dir_name_is_sanitized_and_timestamped() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            job_dir_name("New York/NY", at),
            "New_York-NY_2024-03-09_07-05-01"
        );
    }

    #[tokio::test]
    async fn create_makes_directory() {
        let base = tempfile::tempdir().unwrap();
        let job = Job::create(base.path(), "Paris", true, false).await.unwrap();
        assert!(job.output_dir.is_dir());
        assert!(job.path("context.txt").starts_with(base.path()));
    }
}
