//! Multi-part story: three narrated clips, each animated from the last frame
//! of the one before, cross-faded into a single video.

use crate::characters::{self, CharacterLibrary};
use crate::config::Config;
use crate::ffmpeg::{self, Stitched};
use crate::gateway::{ToolCommand, ToolRunner};
use crate::job::Job;
use crate::page::{self, Page};
use crate::planner::{StoryPlan, StoryPlanner};
use crate::segmenter::{self, SEGMENT_COUNT};
use crate::stages::{Production, Stage};
use crate::{logi, logok};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const PORTRAIT_FILE: &str = "character.png";
pub const STORY_FILE: &str = "story.mp4";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    AwaitingSourceImage,
    RenderingClip,
    ExtractingFrame,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub index: usize,
    pub narration: String,
    pub source_image: PathBuf,
    pub clip: Option<PathBuf>,
    pub last_frame: Option<PathBuf>,
    pub duration: Option<f64>,
    pub state: SegmentState,
}

impl Segment {
    fn new(index: usize, narration: String, source_image: PathBuf) -> Self {
        Self {
            index,
            narration,
            source_image,
            clip: None,
            last_frame: None,
            duration: None,
            state: SegmentState::AwaitingSourceImage,
        }
    }
}

pub fn strip_quotes(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '"' | '\u{201C}' | '\u{201D}'))
        .collect()
}

pub fn clip_prompt(narration: &str) -> String {
    format!(
        "Cinematic shot, the character speaks directly to camera: {}",
        strip_quotes(narration).trim()
    )
}

/// Animate `source` into `out` with native audio.
pub fn render_clip_command(cfg: &Config, prompt: &str, source: &Path, out: &Path) -> ToolCommand {
    ToolCommand::new(&cfg.vidius_cmd)
        .arg(prompt)
        .arg("-i")
        .path_arg(source)
        .arg("-o")
        .path_arg(out)
}

pub struct StoryPipeline<'a> {
    runner: &'a dyn ToolRunner,
    cfg: &'a Config,
    dir: &'a Path,
    quiet: bool,
}

impl<'a> StoryPipeline<'a> {
    pub fn new(runner: &'a dyn ToolRunner, cfg: &'a Config, dir: &'a Path, quiet: bool) -> Self {
        Self {
            runner,
            cfg,
            dir,
            quiet,
        }
    }

    /// Render one clip per chunk, feeding each clip's last frame forward.
    /// Any failure aborts the whole run.
    pub async fn run(&self, initial_image: PathBuf, chunks: Vec<String>) -> Result<Vec<Segment>> {
        let last = chunks.len().saturating_sub(1);
        let mut segments = Vec::with_capacity(chunks.len());
        let mut source = initial_image;

        for (i, narration) in chunks.into_iter().enumerate() {
            let mut seg = Segment::new(i, narration, std::mem::take(&mut source));

            seg.state = SegmentState::RenderingClip;
            let clip = self.dir.join(format!("part{}.mp4", i + 1));
            logi(format!("Rendering segment {}/{}: {}", i + 1, last + 1, seg.narration));
            self.runner
                .invoke(
                    &render_clip_command(self.cfg, &clip_prompt(&seg.narration), &seg.source_image, &clip),
                    self.quiet,
                )
                .await
                .with_context(|| format!("Rendering segment {} failed", i + 1))?;
            if !clip.exists() {
                anyhow::bail!("Segment {} produced no clip at {}", i + 1, clip.display());
            }
            seg.clip = Some(clip.clone());

            if i < last {
                seg.state = SegmentState::ExtractingFrame;
                let frame = self.dir.join(format!("frame{}.png", i + 1));
                self.runner
                    .invoke(&ffmpeg::last_frame_command(self.cfg, &clip, &frame), self.quiet)
                    .await
                    .with_context(|| format!("Extracting last frame of segment {} failed", i + 1))?;
                if !frame.exists() {
                    anyhow::bail!("No frame extracted from {}", clip.display());
                }
                seg.last_frame = Some(frame.clone());
                source = frame;
            }

            seg.state = SegmentState::Done;
            logok(format!("Segment {} done: {}", i + 1, clip.display()));
            segments.push(seg);
        }

        Ok(segments)
    }
}

#[derive(Debug, Clone)]
pub enum CharacterSource {
    Library(String),
    Describe(String),
}

impl CharacterSource {
    pub fn description(&self) -> &str {
        match self {
            CharacterSource::Library(name) | CharacterSource::Describe(name) => name,
        }
    }
}

pub enum ScriptSource {
    Text(String),
    File(PathBuf),
    Planner(StoryPlanner),
}

pub struct StoryOptions {
    pub topic: String,
    pub character: CharacterSource,
    pub script: ScriptSource,
    pub silent: bool,
}

#[derive(Debug)]
pub struct StoryOutcome {
    pub job: Job,
    pub segments: Vec<Segment>,
    pub stitched: Stitched,
    pub plan: Option<StoryPlan>,
}

/// Copy the library portrait, or generate one (placeholder on no output).
pub async fn prepare_portrait(
    cfg: &Config,
    runner: &dyn ToolRunner,
    character: &CharacterSource,
    job: &Job,
) -> Result<PathBuf> {
    let dest = job.path(PORTRAIT_FILE);
    match character {
        CharacterSource::Library(name) => {
            let src = CharacterLibrary::new(&cfg.library_dir).portrait(name).await?;
            fs::copy(&src, &dest)
                .await
                .with_context(|| format!("Failed to copy portrait {}", src.display()))?;
        }
        CharacterSource::Describe(description) => {
            let prompt_file = job.path("character_prompt.txt");
            fs::write(&prompt_file, characters::portrait_prompt(description)).await?;
            let stage = Stage::new("Generating character portrait")
                .call(characters::image_command(cfg, &prompt_file, &job.output_dir, PORTRAIT_FILE))
                .produces(&dest)
                .or_substitute(vec![ffmpeg::placeholder_image_command(cfg, &dest)]);
            Production::new(runner, job.silent).run_stage(&stage).await?;
        }
    }
    Ok(dest)
}

pub async fn run_story(cfg: &Config, runner: &dyn ToolRunner, opts: StoryOptions) -> Result<StoryOutcome> {
    let job = Job::create(&cfg.output_base_dir, &opts.topic, opts.silent, true).await?;
    logi(format!("Story '{}' -> {}", opts.topic, job.output_dir.display()));

    let portrait = prepare_portrait(cfg, runner, &opts.character, &job).await?;

    let (script, plan) = match opts.script {
        ScriptSource::Text(text) => (text, None),
        ScriptSource::File(path) => {
            let text = fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read script {}", path.display()))?;
            (text, None)
        }
        ScriptSource::Planner(planner) => {
            let plan = planner
                .plan(&opts.topic, opts.character.description(), Some(&portrait))
                .await;
            let json = serde_json::to_string_pretty(&plan.items)?;
            fs::write(job.path("plan.json"), json).await?;
            (plan.script(), Some(plan))
        }
    };
    fs::write(job.path("script.txt"), &script).await?;

    let chunks = segmenter::segment(&script, SEGMENT_COUNT);
    let mut segments = StoryPipeline::new(runner, cfg, &job.output_dir, job.silent)
        .run(portrait, chunks)
        .await?;

    let clips: Vec<PathBuf> = segments.iter().filter_map(|s| s.clip.clone()).collect();
    let stitched = ffmpeg::stitch_clips(
        runner,
        cfg,
        &clips,
        cfg.fade_duration,
        &job.path(STORY_FILE),
        job.silent,
    )
    .await?;
    for (seg, d) in segments.iter_mut().zip(&stitched.durations) {
        seg.duration = Some(*d);
    }

    page::write_page(
        &job.path("index.html"),
        &Page {
            title: &format!("Story: {}", opts.topic),
            text: &script,
            image: PORTRAIT_FILE,
            feature_video: Some(STORY_FILE),
            ..Page::default()
        },
    )
    .await?;

    logok(format!("Story ready: {}", job.path("index.html").display()));
    Ok(StoryOutcome {
        job,
        segments,
        stitched,
        plan,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_drops_quote_characters() {
        let p = clip_prompt("She said \"run\" and \u{201C}hide\u{201D}.");
        assert!(!p.contains('"'));
        assert!(!p.contains('\u{201C}'));
        assert!(p.ends_with("She said run and hide."));
    }

    #[test]
    fn render_command_passes_source_image() {
        let cfg = Config::default();
        let cmd = render_clip_command(&cfg, "p", Path::new("frame1.png"), Path::new("part2.mp4"));
        assert_eq!(cmd.program, "vidius");
        assert_eq!(cmd.arg_after("-i"), Some("frame1.png"));
        assert_eq!(cmd.arg_after("-o"), Some("part2.mp4"));
        assert!(!cmd.has_arg("-na"));
    }
}
