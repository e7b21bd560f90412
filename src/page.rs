//! The self-contained `index.html` written into each job directory.

use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// Assets are relative filenames inside the job directory.
#[derive(Debug, Clone, Default)]
pub struct Page<'a> {
    pub title: &'a str,
    pub text: &'a str,
    pub image: &'a str,
    pub audio: Option<&'a str>,
    pub music: Option<&'a str>,
    pub background_video: Option<&'a str>,
    pub feature_video: Option<&'a str>,
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

const STYLE: &str = r#"
        body { background-color: #000; overflow: hidden; font-family: 'Courier New', Courier, monospace; margin: 0; }
        .image-container { position: absolute; inset: 0; background-size: cover; background-position: center; opacity: 0.8; z-index: 0; }
        .video-container { position: absolute; inset: 0; opacity: 0; transition: opacity 3s ease-in-out; z-index: 1; overflow: hidden; }
        .video-container video { width: 100%; height: 100%; object-fit: cover;
            mask-image: radial-gradient(circle at center, black 40%, transparent 100%);
            -webkit-mask-image: radial-gradient(circle at center, black 40%, transparent 100%); }
        .vignette { position: absolute; inset: 0; background: radial-gradient(circle at center, transparent 40%, black 100%); z-index: 2; pointer-events: none; }
        .feature { position: absolute; left: 5%; top: 10%; width: 45%; z-index: 5; }
        .feature video { width: 100%; border-radius: 8px; }
        .text-scroll-container { position: absolute; right: 5%; top: 10%; bottom: 10%; width: 45%; overflow: hidden; z-index: 10;
            background: linear-gradient(to bottom, transparent, rgba(0,0,0,0.5) 10%, rgba(0,0,0,0.5) 90%, transparent); }
        .scrolling-content { color: #d1d5db; font-size: 0.9rem; line-height: 1.2; white-space: pre-wrap; animation: scroll-up 60s linear infinite; }
        @keyframes scroll-up { from { transform: translateY(0); } to { transform: translateY(-100%); } }
        audio { position: fixed; bottom: 20px; left: 20px; z-index: 50; opacity: 0.5; transition: opacity 0.3s; }
        audio:hover { opacity: 1; }
"#;

const SYNC_SCRIPT: &str = r#"
        const music = document.getElementById('music');
        if (music) { music.volume = 0.2; }
        const player = document.getElementById('player');
        const textContent = document.getElementById('textContent');
        const scrollContainer = document.querySelector('.text-scroll-container');
        if (player) {
            player.addEventListener('timeupdate', () => {
                if (player.duration) {
                    const percentage = player.currentTime / player.duration;
                    const maxScroll = textContent.scrollHeight - scrollContainer.clientHeight + 200;
                    textContent.style.animation = 'none';
                    textContent.style.transform = `translateY(-${maxScroll * percentage}px)`;
                }
            });
            window.addEventListener('load', () => {
                player.play().catch(() => console.log('Autoplay blocked, waiting for user interaction'));
            });
        }
"#;

const VIDEO_FADE_SCRIPT: &str = r#"
        const bgVideo = document.getElementById('bgVideo');
        const videoContainer = document.getElementById('videoContainer');
        if (bgVideo) {
            bgVideo.addEventListener('loadeddata', () => {
                bgVideo.play().then(() => {
                    setTimeout(() => { videoContainer.style.opacity = '1'; }, 500);
                }).catch(e => console.error('Video playback failed:', e));
            });
        }
"#;

pub fn render(page: &Page<'_>) -> String {
    let mut body = String::new();

    body.push_str(&format!(
        "    <div class=\"image-container\" style=\"background-image: url('{}');\"></div>\n",
        escape_html(page.image)
    ));

    if let Some(video) = page.background_video {
        body.push_str(&format!(
            "    <div class=\"video-container\" id=\"videoContainer\">\n        <video id=\"bgVideo\" muted loop playsinline>\n            <source src=\"{}\" type=\"video/mp4\">\n        </video>\n    </div>\n",
            escape_html(video)
        ));
    }

    body.push_str("    <div class=\"vignette\"></div>\n");

    // The feature video carries its own sound and drives the text scroll.
    if let Some(video) = page.feature_video {
        body.push_str(&format!(
            "    <div class=\"feature\">\n        <video id=\"player\" controls playsinline>\n            <source src=\"{}\" type=\"video/mp4\">\n        </video>\n    </div>\n",
            escape_html(video)
        ));
    }

    body.push_str(&format!(
        "    <div class=\"text-scroll-container\">\n        <div class=\"scrolling-content\" id=\"textContent\">\n{}\n        </div>\n    </div>\n",
        escape_html(page.text)
    ));

    if let Some(audio) = page.audio {
        let id = if page.feature_video.is_some() { "narration" } else { "player" };
        body.push_str(&format!(
            "    <audio id=\"{}\" controls autoplay>\n        <source src=\"{}\" type=\"audio/mpeg\">\n        Your browser does not support the audio element.\n    </audio>\n",
            id,
            escape_html(audio)
        ));
    }

    if let Some(music) = page.music {
        body.push_str(&format!(
            "    <audio id=\"music\" loop autoplay src=\"{}\"></audio>\n",
            escape_html(music)
        ));
    }

    let video_script = if page.background_video.is_some() { VIDEO_FADE_SCRIPT } else { "" };

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n    <meta charset=\"UTF-8\">\n    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n    <title>{}</title>\n    <style>{}</style>\n</head>\n<body>\n{}\n    <script>{}{}</script>\n</body>\n</html>\n",
        escape_html(page.title),
        STYLE,
        body,
        video_script,
        SYNC_SCRIPT
    )
}

pub async fn write_page(path: &Path, page: &Page<'_>) -> Result<()> {
    fs::write(path, render(page))
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
