pub mod api;
pub mod characters;
pub mod cli;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod gateway;
pub mod init;
pub mod job;
pub mod page;
pub mod planner;
pub mod segmenter;
pub mod stages;
pub mod story;
pub mod transcript;
pub mod workflows;

pub(crate) fn logv(tag: &str, message: &str) {
    match tag {
        "WARN" => tracing::warn!("{}", message),
        "OK" => tracing::info!(status = "ok", "{}", message),
        _ => tracing::info!("{}", message),
    }
}

pub(crate) fn logi(message: impl AsRef<str>) {
    logv("INFO", message.as_ref());
}

pub(crate) fn logok(message: impl AsRef<str>) {
    logv("OK", message.as_ref());
}

pub(crate) fn logw(message: impl AsRef<str>) {
    logv("WARN", message.as_ref());
}
