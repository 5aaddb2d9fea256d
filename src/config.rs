use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Runtime knobs. Every field has a default, so a settings file only needs to
/// name what it overrides. The API credential is deliberately not a field.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_url: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    /// Instruction template sent as the system message.
    pub prompt_path: PathBuf,
    /// Relative paths are resolved against the working directory.
    pub output_dir: PathBuf,
    pub renderer: String,
    /// Arguments placed before the render flags, e.g. `["-m", "manim"]` with
    /// `renderer = "python"`.
    pub renderer_prefix_args: Vec<String>,
    pub render_timeout_secs: u64,
    pub settle_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            request_timeout_secs: 120,
            prompt_path: PathBuf::from("systemprompt.txt"),
            output_dir: PathBuf::from("output"),
            renderer: "manim".to_string(),
            renderer_prefix_args: Vec::new(),
            render_timeout_secs: 5 * 60,
            settle_delay_ms: 1000,
        }
    }
}

impl Settings {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read settings: {}", path.as_ref().display()))?;
        let settings: Settings = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings: {}", path.as_ref().display()))?;

        if settings.renderer.is_empty() {
            anyhow::bail!("settings: renderer must not be empty");
        }
        if settings.api_url.is_empty() {
            anyhow::bail!("settings: api_url must not be empty");
        }

        Ok(settings)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Output directory anchored at `cwd` unless already absolute.
    pub fn resolve_output_dir(&self, cwd: &Path) -> PathBuf {
        if self.output_dir.is_absolute() {
            self.output_dir.clone()
        } else {
            cwd.join(&self.output_dir)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_hosted_api_contract() {
        let s = Settings::default();
        assert_eq!(s.model, "llama-3.1-8b-instant");
        assert_eq!(s.temperature, 0.7);
        assert_eq!(s.max_tokens, 2000);
        assert_eq!(s.render_timeout(), Duration::from_secs(300));
        assert_eq!(s.settle_delay(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn partial_file_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"renderer":"python","renderer_prefix_args":["-m","manim"]}"#)
            .unwrap();

        let s = Settings::load(&path).await.unwrap();
        assert_eq!(s.renderer, "python");
        assert_eq!(s.renderer_prefix_args, vec!["-m", "manim"]);
        assert_eq!(s.max_tokens, 2000);
        assert_eq!(s.prompt_path, PathBuf::from("systemprompt.txt"));
    }

    #[tokio::test]
    async fn empty_renderer_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"renderer":""}"#).unwrap();

        assert!(Settings::load(&path).await.is_err());
    }

    #[test]
    fn relative_output_dir_is_anchored_at_cwd() {
        let s = Settings::default();
        assert_eq!(
            s.resolve_output_dir(Path::new("/work")),
            PathBuf::from("/work/output")
        );
    }
}
