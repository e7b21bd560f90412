use crate::config::Config;
use crate::gateway::{ToolCommand, ToolRunner};
use crate::{logi, logw};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Duration assumed for any file ffprobe cannot measure.
pub const PROBE_FALLBACK_SECONDS: f64 = 60.0;

/// How far before end-of-stream the last frame is grabbed.
const LAST_FRAME_EPSILON: &str = "-0.1";
const SHARPEN_FILTER: &str = "unsharp=5:5:1.0:5:5:0.0";

fn ffmpeg(cfg: &Config) -> ToolCommand {
    ToolCommand::new(&cfg.ffmpeg_cmd).args(["-y", "-hide_banner", "-loglevel", "error"])
}

fn h264_aac(cmd: ToolCommand) -> ToolCommand {
    cmd.args([
        "-c:v",
        "libx264",
        "-pix_fmt",
        "yuv420p",
        "-preset",
        "veryfast",
        "-crf",
        "22",
        "-c:a",
        "aac",
        "-b:a",
        "192k",
        "-movflags",
        "+faststart",
    ])
}

pub fn probe_command(cfg: &Config, path: &Path) -> ToolCommand {
    ToolCommand::new(&cfg.ffprobe_cmd)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .path_arg(path)
}

pub async fn ffprobe_duration_seconds(
    runner: &dyn ToolRunner,
    cfg: &Config,
    path: &Path,
) -> Result<f64> {
    let output = runner
        .invoke(&probe_command(cfg, path), true)
        .await
        .context("ffprobe duration failed")?;

    let text = output.stdout.trim();
    let duration = text
        .parse::<f64>()
        .with_context(|| format!("ffprobe returned a non-numeric duration: {:?}", text))?;
    if !duration.is_finite() || duration <= 0.0 {
        return Err(anyhow::anyhow!("Invalid duration {}", duration));
    }
    Ok(duration)
}

/// Probe `path`, falling back to [`PROBE_FALLBACK_SECONDS`]. Never fails.
pub async fn duration_seconds(runner: &dyn ToolRunner, cfg: &Config, path: &Path) -> f64 {
    match ffprobe_duration_seconds(runner, cfg, path).await {
        Ok(d) => d,
        Err(err) => {
            logw(format!(
                "Could not probe duration of {} ({:#}); assuming {:.1}s",
                path.display(),
                err,
                PROBE_FALLBACK_SECONDS
            ));
            PROBE_FALLBACK_SECONDS
        }
    }
}

/// Grab the sharpened final frame of `clip` as a single image.
pub fn last_frame_command(cfg: &Config, clip: &Path, frame_png: &Path) -> ToolCommand {
    ffmpeg(cfg)
        .args(["-sseof", LAST_FRAME_EPSILON, "-i"])
        .path_arg(clip)
        .args(["-vf", SHARPEN_FILTER, "-frames:v", "1", "-update", "1"])
        .path_arg(frame_png)
}

pub fn placeholder_image_command(cfg: &Config, image: &Path) -> ToolCommand {
    ToolCommand::new(&cfg.convert_cmd)
        .args(["-size", "1024x1024", "xc:black"])
        .path_arg(image)
}

/// `offset_0 = 0`, `offset_i = offset_{i-1} + duration_{i-1} - fade`.
pub fn crossfade_offsets(durations: &[f64], fade: f64) -> Vec<f64> {
    let Some((_, leading)) = durations.split_last() else {
        return Vec::new();
    };
    let mut offsets = Vec::with_capacity(durations.len());
    let mut acc = 0.0;
    offsets.push(acc);
    for d in leading {
        acc = acc + d - fade;
        offsets.push(acc);
    }
    offsets
}

/// Chained `xfade`/`acrossfade` graph over inputs `0..n`, ending in
/// `[vout]` and `[aout]`. Empty for fewer than two clips.
pub fn build_crossfade_filter(durations: &[f64], fade: f64) -> String {
    let n = durations.len();
    if n < 2 {
        return String::new();
    }

    let offsets = crossfade_offsets(durations, fade);
    let mut parts = Vec::with_capacity(2 * (n - 1));

    let mut prev_v = "0:v".to_string();
    for (i, offset) in offsets.iter().enumerate().skip(1) {
        let out = if i == n - 1 { "vout".to_string() } else { format!("v{}", i) };
        parts.push(format!(
            "[{}][{}:v]xfade=transition=fade:duration={:.3}:offset={:.3}[{}]",
            prev_v, i, fade, offset, out
        ));
        prev_v = out;
    }

    let mut prev_a = "0:a".to_string();
    for i in 1..n {
        let out = if i == n - 1 { "aout".to_string() } else { format!("a{}", i) };
        parts.push(format!("[{}][{}:a]acrossfade=d={:.3}[{}]", prev_a, i, fade, out));
        prev_a = out;
    }

    parts.join(";")
}

/// The muxer call that joins `clips` into `out`. One clip is a straight
/// stream copy; more are cross-faded and re-encoded.
pub fn stitch_command(
    cfg: &Config,
    clips: &[PathBuf],
    durations: &[f64],
    fade: f64,
    out: &Path,
) -> ToolCommand {
    if clips.len() == 1 {
        return ffmpeg(cfg)
            .arg("-i")
            .path_arg(&clips[0])
            .args(["-c", "copy"])
            .path_arg(out);
    }

    let mut cmd = ffmpeg(cfg);
    for clip in clips {
        cmd = cmd.arg("-i").path_arg(clip);
    }
    cmd = cmd
        .arg("-filter_complex")
        .arg(build_crossfade_filter(durations, fade))
        .args(["-map", "[vout]", "-map", "[aout]"]);
    h264_aac(cmd).path_arg(out)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stitched {
    pub output: PathBuf,
    pub durations: Vec<f64>,
    pub offsets: Vec<f64>,
}

pub async fn stitch_clips(
    runner: &dyn ToolRunner,
    cfg: &Config,
    clips: &[PathBuf],
    fade: f64,
    out: &Path,
    quiet: bool,
) -> Result<Stitched> {
    if clips.is_empty() {
        anyhow::bail!("Nothing to stitch");
    }

    let mut durations = Vec::with_capacity(clips.len());
    if clips.len() > 1 {
        for clip in clips {
            durations.push(duration_seconds(runner, cfg, clip).await);
        }
    }
    let offsets = crossfade_offsets(&durations, fade);
    logi(format!(
        "Stitching {} clips -> {} (offsets: {:?})",
        clips.len(),
        out.display(),
        offsets
    ));

    runner
        .invoke(&stitch_command(cfg, clips, &durations, fade, out), quiet)
        .await
        .context("Stitching failed")?;

    Ok(Stitched {
        output: out.to_path_buf(),
        durations,
        offsets,
    })
}

/// Loop `video` under the voice track for exactly `voice_duration` seconds,
/// mixing in `music` at a lower volume when present.
pub fn news_short_command(
    cfg: &Config,
    video: &Path,
    voice: &Path,
    music: Option<&Path>,
    voice_duration: f64,
    out: &Path,
) -> ToolCommand {
    let mut cmd = ffmpeg(cfg)
        .args(["-stream_loop", "-1", "-i"])
        .path_arg(video)
        .arg("-i")
        .path_arg(voice);
    if let Some(music) = music {
        cmd = cmd.arg("-i").path_arg(music);
    }

    let video_chain = format!(
        "[0:v]trim=duration={:.3},setpts=PTS-STARTPTS[vout]",
        voice_duration
    );
    let audio_chain = match music {
        Some(_) => format!(
            "[1:a]volume={:.2}[voice];[2:a]volume={:.2}[music];[voice][music]amix=inputs=2:duration=first:dropout_transition=2[aout]",
            cfg.news_voice_volume, cfg.news_music_volume
        ),
        None => format!("[1:a]volume={:.2}[aout]", cfg.news_voice_volume),
    };

    cmd = cmd
        .arg("-filter_complex")
        .arg(format!("{};{}", video_chain, audio_chain))
        .args(["-map", "[vout]", "-map", "[aout]", "-t"])
        .arg(format!("{:.3}", voice_duration));
    h264_aac(cmd).path_arg(out)
}
