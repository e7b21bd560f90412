//! Weather, research and news-short productions, each an ordered stage list.

use crate::characters;
use crate::config::Config;
use crate::ffmpeg;
use crate::gateway::{ToolCommand, ToolRunner};
use crate::job::Job;
use crate::page::{self, Page};
use crate::stages::{Production, Stage};
use crate::transcript::{self, SpeechMode};
use crate::{logi, logok};
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

const IMAGE_FILE: &str = "background_art.png";
const VIDEO_FILE: &str = "background_video.mp4";
const MUSIC_FILE: &str = "music.mp3";
const SPEECH_LOG: &str = "speech_output.txt";

/// The five data-gathering calls, truncating then appending to `context`.
pub fn gather_commands(cfg: &Config, location: &str, context: &Path) -> Vec<ToolCommand> {
    let atmos = || ToolCommand::new(&cfg.atmos_cmd);
    vec![
        atmos().arg("alert").arg(location).stdout_to(context),
        atmos().arg(location).stdout_append(context),
        atmos().arg("stars").arg(location).stdout_append(context),
        atmos().arg("forecast").arg(location).stdout_append(context),
        atmos()
            .arg("forecast")
            .arg(location)
            .arg("--hourly")
            .stdout_append(context),
    ]
}

/// Speech synthesis from piped `input`; the tool's own output (which carries
/// the transcript) lands in `log`.
pub fn speech_command(
    cfg: &Config,
    mode: SpeechMode,
    extra: &[&str],
    input: &Path,
    audio_out: &Path,
    log: &Path,
) -> ToolCommand {
    ToolCommand::new(&cfg.gen_tts_cmd)
        .arg(mode.flag())
        .args(extra.iter().copied())
        .args(["--no-play", "--audio-format", "MP3", "--output-file"])
        .path_arg(audio_out)
        .stdin_from(input)
        .stdout_to(log)
}

pub fn video_command(
    cfg: &Config,
    prompt: &str,
    image: &Path,
    out: &Path,
    aspect_ratio: Option<&str>,
) -> ToolCommand {
    let mut cmd = ToolCommand::new(&cfg.vidius_cmd)
        .arg(prompt)
        .arg("-i")
        .path_arg(image)
        .arg("-o")
        .path_arg(out);
    if let Some(ratio) = aspect_ratio {
        cmd = cmd.args(["--aspect-ratio", ratio]);
    }
    cmd.arg("-na")
}

pub fn music_command(cfg: &Config, prompt: &str, duration: f64, out: &Path) -> ToolCommand {
    ToolCommand::new(&cfg.music_cmd)
        .arg(prompt)
        .arg("--duration")
        .arg(format!("{}", duration.ceil().max(1.0) as u64))
        .args(["--format", "mp3", "-o"])
        .path_arg(out)
}

fn image_stage(cfg: &Config, job: &Job, prompt_file: &Path) -> Stage {
    let image = job.path(IMAGE_FILE);
    Stage::new("Generating background art")
        .call(characters::image_command(cfg, prompt_file, &job.output_dir, IMAGE_FILE))
        .produces(&image)
        .or_substitute(vec![ffmpeg::placeholder_image_command(cfg, &image)])
}

fn video_stage(cfg: &Config, job: &Job, prompt: &str, aspect_ratio: Option<&str>) -> Stage {
    let image = job.path(IMAGE_FILE);
    Stage::new("Animating background video")
        .call(video_command(cfg, prompt, &image, &job.path(VIDEO_FILE), aspect_ratio))
        .requires(&image)
}

fn music_stage(cfg: &Config, job: &Job, prompt: &str, duration: f64) -> Stage {
    let music = job.path(MUSIC_FILE);
    Stage::new("Composing background music")
        .call(music_command(cfg, prompt, duration, &music))
        .produces(&music)
        .or_degrade()
}

async fn read_lossy(path: &Path) -> Result<String> {
    let bytes = fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn existing<'a>(job: &Job, name: &'a str) -> Option<&'a str> {
    job.path(name).exists().then_some(name)
}

pub struct WeatherOptions {
    pub location: String,
    pub silent: bool,
    pub video: bool,
}

pub async fn run_weather(cfg: &Config, runner: &dyn ToolRunner, opts: &WeatherOptions) -> Result<Job> {
    let job = Job::create(&cfg.output_base_dir, &opts.location, opts.silent, opts.video).await?;
    logi(format!(
        "Weather experience for {} -> {}",
        opts.location,
        job.output_dir.display()
    ));

    let context = job.path("context.txt");
    let podcast = job.path("podcast.mp3");
    let speech_log = job.path(SPEECH_LOG);

    let mut gather = Stage::new(format!("Gathering atmospheric data for {}", opts.location))
        .always_quiet()
        .produces(&context);
    for cmd in gather_commands(cfg, &opts.location, &context) {
        gather = gather.call(cmd);
    }

    let mut stages = vec![
        gather,
        Stage::new("Synthesizing podcast audio")
            .call(speech_command(cfg, SpeechMode::Podcast, &[], &context, &podcast, &speech_log))
            .produces(&podcast),
        image_stage(cfg, &job, &context),
    ];
    if opts.video {
        let prompt = format!(
            "Cinematic slow motion animation of {}, realistic weather, highly detailed",
            opts.location
        );
        stages.push(video_stage(cfg, &job, &prompt, None));
    }
    Production::new(runner, job.silent).run(&stages).await?;

    let context_text = read_lossy(&context).await?;
    let speech_out = read_lossy(&speech_log).await.unwrap_or_default();
    let text = transcript::script_or(&speech_out, SpeechMode::Podcast, &context_text);

    page::write_page(
        &job.path("index.html"),
        &Page {
            title: &format!("Atmospheric Forecast: {}", opts.location),
            text: &text,
            image: IMAGE_FILE,
            audio: Some("podcast.mp3"),
            background_video: existing(&job, VIDEO_FILE),
            ..Page::default()
        },
    )
    .await?;

    logok(format!("Experience ready: {}", job.path("index.html").display()));
    Ok(job)
}

pub struct TopicOptions {
    pub topic: String,
    pub silent: bool,
    pub video: bool,
}

pub async fn run_research(cfg: &Config, runner: &dyn ToolRunner, opts: &TopicOptions) -> Result<Job> {
    let job = Job::create(&cfg.output_base_dir, &opts.topic, opts.silent, opts.video).await?;
    logi(format!("Research documentary on {} -> {}", opts.topic, job.output_dir.display()));

    let topic_file = job.path("topic.txt");
    let narration = job.path("narration.mp3");
    let speech_log = job.path(SPEECH_LOG);
    let research = job.path("research.txt");
    fs::write(&topic_file, &opts.topic).await?;

    let production = Production::new(runner, job.silent);
    production
        .run_stage(
            &Stage::new("Researching and narrating")
                .call(speech_command(
                    cfg,
                    SpeechMode::Podcast,
                    &["--research"],
                    &topic_file,
                    &narration,
                    &speech_log,
                ))
                .produces(&narration),
        )
        .await?;

    let speech_out = read_lossy(&speech_log).await.unwrap_or_default();
    let text = transcript::script_or(&speech_out, SpeechMode::Podcast, &opts.topic);
    fs::write(&research, &text).await?;

    let mut stages = vec![image_stage(cfg, &job, &research)];
    if opts.video {
        let prompt = format!(
            "Documentary style slow camera move exploring {}, highly detailed",
            opts.topic
        );
        stages.push(video_stage(cfg, &job, &prompt, None));
    }
    let duration = ffmpeg::duration_seconds(runner, cfg, &narration).await;
    stages.push(music_stage(
        cfg,
        &job,
        &format!("Ambient documentary underscore about {}", opts.topic),
        duration,
    ));
    production.run(&stages).await?;

    page::write_page(
        &job.path("index.html"),
        &Page {
            title: &format!("Research: {}", opts.topic),
            text: &text,
            image: IMAGE_FILE,
            audio: Some("narration.mp3"),
            music: existing(&job, MUSIC_FILE),
            background_video: existing(&job, VIDEO_FILE),
            ..Page::default()
        },
    )
    .await?;

    logok(format!("Documentary ready: {}", job.path("index.html").display()));
    Ok(job)
}

pub async fn run_news(cfg: &Config, runner: &dyn ToolRunner, opts: &TopicOptions) -> Result<Job> {
    let job = Job::create(&cfg.output_base_dir, &opts.topic, opts.silent, true).await?;
    logi(format!("News short on {} -> {}", opts.topic, job.output_dir.display()));

    let topic_file = job.path("topic.txt");
    let voice = job.path("voice.mp3");
    let speech_log = job.path(SPEECH_LOG);
    let script_file = job.path("news_script.txt");
    let video = job.path(VIDEO_FILE);
    let short = job.path("news_short.mp4");
    fs::write(&topic_file, &opts.topic).await?;

    let production = Production::new(runner, job.silent);
    production
        .run_stage(
            &Stage::new("Writing and voicing the bulletin")
                .call(speech_command(cfg, SpeechMode::News, &[], &topic_file, &voice, &speech_log))
                .produces(&voice),
        )
        .await?;

    let speech_out = read_lossy(&speech_log).await.unwrap_or_default();
    let text = transcript::script_or(&speech_out, SpeechMode::News, &opts.topic);
    fs::write(&script_file, &text).await?;

    let prompt = format!(
        "Vertical news b-roll about {}, cinematic, highly detailed",
        opts.topic
    );
    production
        .run(&[
            image_stage(cfg, &job, &script_file),
            video_stage(cfg, &job, &prompt, Some("9:16")),
        ])
        .await?;
    if !video.exists() {
        anyhow::bail!("News short needs a background video; none at {}", video.display());
    }

    let voice_duration = ffmpeg::duration_seconds(runner, cfg, &voice).await;
    let music_prompt = format!("Urgent, modern news bed music about {}", opts.topic);
    production
        .run_stage(&music_stage(cfg, &job, &music_prompt, voice_duration))
        .await?;

    let music = job.path(MUSIC_FILE);
    let music = music.exists().then_some(music.as_path());
    production
        .run_stage(
            &Stage::new("Mixing news short")
                .call(ffmpeg::news_short_command(cfg, &video, &voice, music, voice_duration, &short))
                .produces(&short),
        )
        .await?;

    page::write_page(
        &job.path("index.html"),
        &Page {
            title: &format!("News: {}", opts.topic),
            text: &text,
            image: IMAGE_FILE,
            feature_video: Some("news_short.mp4"),
            ..Page::default()
        },
    )
    .await?;

    logok(format!("News short ready: {}", short.display()));
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_runs_five_calls_in_fixed_order() {
        let cfg = Config::default();
        let ctx = Path::new("/out/context.txt");
        let cmds = gather_commands(&cfg, "New York", ctx);
        let rendered: Vec<String> = cmds.iter().map(|c| c.render()).collect();
        assert_eq!(
            rendered,
            vec![
                "atmos alert 'New York' > /out/context.txt",
                "atmos 'New York' >> /out/context.txt",
                "atmos stars 'New York' >> /out/context.txt",
                "atmos forecast 'New York' >> /out/context.txt",
                "atmos forecast 'New York' --hourly >> /out/context.txt",
            ]
        );
    }

    #[test]
    fn speech_command_pipes_input() {
        let cfg = Config::default();
        let cmd = speech_command(
            &cfg,
            SpeechMode::Podcast,
            &["--research"],
            Path::new("topic.txt"),
            Path::new("narration.mp3"),
            Path::new("log.txt"),
        );
        assert_eq!(
            cmd.render(),
            "gen-tts --podcast --research --no-play --audio-format MP3 --output-file narration.mp3 < topic.txt > log.txt"
        );
    }

    #[test]
    fn video_command_optionally_sets_aspect_ratio() {
        let cfg = Config::default();
        let plain = video_command(&cfg, "p", Path::new("a.png"), Path::new("v.mp4"), None);
        assert!(!plain.has_arg("--aspect-ratio"));
        assert!(plain.has_arg("-na"));
        let tall = video_command(&cfg, "p", Path::new("a.png"), Path::new("v.mp4"), Some("9:16"));
        assert_eq!(tall.arg_after("--aspect-ratio"), Some("9:16"));
    }

    #[test]
    fn music_duration_rounds_up() {
        let cfg = Config::default();
        let cmd = music_command(&cfg, "calm", 41.2, Path::new("m.mp3"));
        assert_eq!(cmd.arg_after("--duration"), Some("42"));
        assert_eq!(cmd.arg_after("--format"), Some("mp3"));
    }
}
