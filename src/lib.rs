pub mod api;
pub mod app;
pub mod codegen;
pub mod config;
pub mod credential;
pub mod locator;
pub mod render;
pub mod session;

/// Fixed class name the renderer is told to render from the generated script.
pub const SCENE_NAME: &str = "MathScene";

pub(crate) fn logv(tag: &str, message: &str) {
    eprintln!("[{}] {}", tag, message);
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

pub(crate) fn loge(message: impl AsRef<str>) {
    logv("ERROR", message.as_ref());
}
