//! Best-effort extraction of the script gen-tts prints after synthesis.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechMode {
    Podcast,
    News,
    Storyteller,
}

impl SpeechMode {
    pub fn flag(self) -> &'static str {
        match self {
            SpeechMode::Podcast => "--podcast",
            SpeechMode::News => "--news",
            SpeechMode::Storyteller => "--storyteller",
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            SpeechMode::Podcast => "--- Podcast Script ---",
            SpeechMode::News => "--- News Script ---",
            SpeechMode::Storyteller => "--- Story Script ---",
        }
    }
}

fn ansi_regex() -> Result<&'static Regex> {
    static ANSI_RE: OnceCell<Regex> = OnceCell::new();
    ANSI_RE.get_or_try_init(|| {
        Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").context("failed to compile ansi regex")
    })
}

/// Terminal color and cursor sequences removed.
pub fn strip_ansi(text: &str) -> String {
    match ansi_regex() {
        Ok(re) => re.replace_all(text, "").into_owned(),
        Err(_) => text.to_string(),
    }
}

/// Text following the mode's marker line, or `None` when the marker is
/// absent or nothing follows it.
pub fn extract_script(output: &str, mode: SpeechMode) -> Option<String> {
    let marker = mode.marker();
    let plain = strip_ansi(output);
    let mut lines = plain.lines();
    lines.by_ref().find(|line| line.trim() == marker)?;

    let body: Vec<&str> = lines.collect();
    let text = body.join("\n").trim().to_string();
    if text.is_empty() { None } else { Some(text) }
}

/// The parsed script, or `fallback` verbatim.
pub fn script_or(output: &str, mode: SpeechMode, fallback: &str) -> String {
    match extract_script(output, mode) {
        Some(script) => script,
        None => {
            crate::logw(format!(
                "No '{}' section in speech output; displaying source text",
                mode.marker()
            ));
            fallback.to_string()
        }
    }
}
