use crate::config::Settings;
use crate::locator::find_video_files;
use crate::{SCENE_NAME, logi, logok, logw};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::debug;

/// Preview, low quality.
pub const PREVIEW_LOW_QUALITY: &str = "-pql";

/// How long to keep draining output pipes after the renderer has exited.
/// Helpers it spawned (e.g. the preview player) may hold them open.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Lifecycle of one `create_video` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Idle,
    CodeGenerated,
    ScriptWritten,
    Rendering,
    Succeeded,
    Failed,
    TimedOut,
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to start Manim: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("Failed while waiting for Manim: {0}")]
    Wait(#[source] std::io::Error),
    #[error("Manim process failed with code {}: {stderr}", describe_code(.code))]
    Exit { code: Option<i32>, stderr: String },
    #[error("Manim process timed out after {} seconds", .0.as_secs())]
    TimedOut(Duration),
    #[error("No video file was generated. Check the output above for errors.")]
    NoVideo,
}

impl RenderError {
    pub fn terminal_state(&self) -> RenderState {
        match self {
            RenderError::TimedOut(_) => RenderState::TimedOut,
            _ => RenderState::Failed,
        }
    }
}

pub fn script_file_name(now: DateTime<Utc>) -> String {
    let stamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("manim_script_{}.py", stamp)
}

pub async fn write_script(output_dir: &Path, code: &str) -> Result<PathBuf> {
    let path = output_dir.join(script_file_name(Utc::now()));
    fs::write(&path, code)
        .await
        .with_context(|| format!("Failed to write script {}", path.display()))?;
    Ok(path)
}

fn renderer_command(settings: &Settings) -> Command {
    let mut cmd = Command::new(&settings.renderer);
    cmd.args(&settings.renderer_prefix_args);
    cmd
}

/// The render invocation as it would be typed in a shell, for logs.
pub fn render_command_line(settings: &Settings, script_path: &Path) -> String {
    let mut parts = vec![settings.renderer.clone()];
    parts.extend(settings.renderer_prefix_args.iter().cloned());
    parts.push(PREVIEW_LOW_QUALITY.to_string());
    parts.push(script_path.display().to_string());
    parts.push(SCENE_NAME.to_string());
    parts.join(" ")
}

/// `true` when `<renderer> --version` runs and exits 0.
pub async fn check_renderer(settings: &Settings) -> bool {
    let output = renderer_command(settings)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => {
            logok("Manim is installed and ready");
            true
        }
        Ok(output) => {
            debug!(status = ?output.status, "renderer version check failed");
            logw("Manim is not installed or not in PATH");
            logi("Install Manim with: pip install manim");
            false
        }
        Err(err) => {
            debug!(error = %err, "renderer could not be started");
            logw("Manim is not installed or not in PATH");
            logi("Install Manim with: pip install manim");
            false
        }
    }
}

/// Forwards a child stream to one of ours while keeping a copy.
struct StreamCapture {
    text: Arc<Mutex<String>>,
    task: JoinHandle<()>,
}

impl StreamCapture {
    fn start<R, W>(mut source: R, mut sink: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let text = Arc::new(Mutex::new(String::new()));
        let captured = Arc::clone(&text);
        let task = tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            loop {
                let n = match source.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => n,
                };
                let _ = sink.write_all(&buf[..n]).await;
                let _ = sink.flush().await;
                captured
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push_str(&String::from_utf8_lossy(&buf[..n]));
            }
        });
        Self { text, task }
    }

    fn take_text(&self) -> String {
        std::mem::take(&mut *self.text.lock().unwrap_or_else(|e| e.into_inner()))
    }

    async fn finish(mut self, grace: Duration) -> String {
        if tokio::time::timeout(grace, &mut self.task).await.is_err() {
            self.task.abort();
        }
        self.take_text()
    }

    fn abandon(self) {
        self.task.abort();
    }
}

/// Renders `script_path` and returns the produced video.
///
/// The wait on the child is the only terminal transition: it either yields an
/// exit status or hits the deadline, in which case the child is killed and
/// `TimedOut` is returned. Exit code 0 alone is not trusted; after the settle
/// delay a video must also be found on disk.
pub async fn run_renderer(
    settings: &Settings,
    output_dir: &Path,
    script_path: &Path,
) -> Result<PathBuf, RenderError> {
    let mut cmd = renderer_command(settings);
    cmd.arg(PREVIEW_LOW_QUALITY)
        .arg(script_path)
        .arg(SCENE_NAME)
        .current_dir(output_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    logi(format!("Running: {}", render_command_line(settings, script_path)));

    let mut child = cmd.spawn().map_err(RenderError::Spawn)?;
    let stdout = child
        .stdout
        .take()
        .map(|s| StreamCapture::start(s, tokio::io::stdout()));
    let stderr = child
        .stderr
        .take()
        .map(|s| StreamCapture::start(s, tokio::io::stderr()));

    let limit = settings.render_timeout();
    let status = match tokio::time::timeout(limit, child.wait()).await {
        Ok(waited) => waited.map_err(RenderError::Wait)?,
        Err(_) => {
            if let Err(err) = child.kill().await {
                logw(format!("Failed to kill timed-out Manim process: {}", err));
            }
            for capture in [stdout, stderr].into_iter().flatten() {
                capture.abandon();
            }
            return Err(RenderError::TimedOut(limit));
        }
    };

    if let Some(capture) = stdout {
        let text = capture.finish(DRAIN_GRACE).await;
        debug!(stdout_bytes = text.len(), "renderer stdout drained");
    }
    let stderr_text = match stderr {
        Some(capture) => capture.finish(DRAIN_GRACE).await,
        None => String::new(),
    };

    logi(format!(
        "Manim process completed with code: {}",
        describe_code(&status.code())
    ));

    if !status.success() {
        return Err(RenderError::Exit {
            code: status.code(),
            stderr: stderr_text,
        });
    }

    tokio::time::sleep(settings.settle_delay()).await;

    match find_video_files(output_dir).await.into_iter().next() {
        Some(video) => {
            logok(format!("Video file created: {}", video.display()));
            Ok(video)
        }
        None => {
            logw("No video file found, checking for errors...");
            Err(RenderError::NoVideo)
        }
    }
}
