#![allow(dead_code)]

use async_trait::async_trait;
use mirage::config::Config;
use mirage::error::ToolFailure;
use mirage::gateway::{Redirect, ToolCommand, ToolOutput, ToolRunner};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const PROBED_SECONDS: &str = "5.0";

/// Records every invocation and fakes each tool's output files.
#[derive(Default)]
pub struct MockRunner {
    calls: Mutex<Vec<ToolCommand>>,
    failing: HashSet<String>,
    silent_tools: HashSet<String>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invocations of `program` exit non-zero.
    pub fn failing(mut self, program: &str) -> Self {
        self.failing.insert(program.to_string());
        self
    }

    /// Invocations of `program` succeed but write nothing.
    pub fn without_output(mut self, program: &str) -> Self {
        self.silent_tools.insert(program.to_string());
        self
    }

    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, program: &str) -> Vec<ToolCommand> {
        self.calls()
            .into_iter()
            .filter(|c| c.program == program)
            .collect()
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.program).collect()
    }
}

fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, b"fake media").unwrap();
}

fn outputs(cmd: &ToolCommand) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for flag in ["-o", "--output-file"] {
        if let Some(p) = cmd.arg_after(flag) {
            out.push(PathBuf::from(p));
        }
    }
    if let (Some(dir), Some(file)) = (cmd.arg_after("--output-dir"), cmd.arg_after("-f")) {
        out.push(Path::new(dir).join(file));
    }
    if matches!(cmd.program.as_str(), "ffmpeg" | "convert") {
        if let Some(last) = cmd.args.last() {
            out.push(PathBuf::from(last));
        }
    }
    out
}

fn stdout_text(cmd: &ToolCommand) -> String {
    if cmd.program == "gen-tts" {
        let marker = if cmd.has_arg("--news") {
            "--- News Script ---"
        } else {
            "--- Podcast Script ---"
        };
        return format!("Synthesizing...\n{}\nScripted words for the listener.\n", marker);
    }
    format!("{} {}\n", cmd.program, cmd.args.join(" "))
}

#[async_trait]
impl ToolRunner for MockRunner {
    async fn invoke(
        &self,
        command: &ToolCommand,
        _suppress_output: bool,
    ) -> Result<ToolOutput, ToolFailure> {
        self.calls.lock().unwrap().push(command.clone());

        if self.failing.contains(&command.program) {
            return Err(ToolFailure::NonZeroExit {
                command: command.render(),
                exit_code: Some(1),
                stdout: Some(String::new()),
                stderr: Some(format!("{} exploded", command.program)),
            });
        }

        if let Some(redirect) = &command.stdout {
            let mut file = match redirect {
                Redirect::Truncate(p) => std::fs::File::create(p).unwrap(),
                Redirect::Append(p) => std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(p)
                    .unwrap(),
            };
            file.write_all(stdout_text(command).as_bytes()).unwrap();
        }

        if command.program == "ffprobe" {
            return Ok(ToolOutput {
                stdout: format!("{}\n", PROBED_SECONDS),
                stderr: String::new(),
            });
        }

        if !self.silent_tools.contains(&command.program) {
            for path in outputs(command) {
                touch(&path);
            }
        }
        Ok(ToolOutput::default())
    }
}

pub fn test_config(root: &Path) -> Config {
    Config {
        output_base_dir: root.join("out"),
        library_dir: root.join("characters"),
        log_file: root.join("mirage.log"),
        ..Config::default()
    }
}
