use crate::api::ChatBackend;
use crate::api::groq::GroqClient;
use crate::codegen::{generate_manim_code, validate_script};
use crate::config::Settings;
use crate::credential::{Prompter, acquire_credential};
use crate::render::{RenderState, check_renderer, run_renderer, write_script};
use crate::session::Session;
use crate::{loge, logi, logok, logw};
use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

fn advance(state: &mut RenderState, next: RenderState) {
    debug!(from = ?*state, to = ?next, "video request transition");
    *state = next;
}

/// Final on-disk check of the rendered file. Only this moves a request to
/// `Succeeded`.
async fn confirm_video(state: &mut RenderState, video: PathBuf) -> Result<PathBuf> {
    if fs::metadata(&video).await.map(|m| m.is_file()).unwrap_or(false) {
        advance(state, RenderState::Succeeded);
        Ok(video)
    } else {
        advance(state, RenderState::Failed);
        anyhow::bail!("Video file was not created successfully")
    }
}

/// Drives one video request from concept text to rendered file.
pub struct MathVideo<B> {
    settings: Settings,
    session: Session,
    backend: B,
}

impl MathVideo<GroqClient> {
    pub fn with_groq(settings: Settings, cwd: &Path) -> Result<Self> {
        let backend = GroqClient::new(&settings)?;
        let session = Session::new(settings.resolve_output_dir(cwd));
        Ok(Self::new(settings, session, backend))
    }
}

impl<B: ChatBackend> MathVideo<B> {
    pub fn new(settings: Settings, session: Session, backend: B) -> Self {
        Self {
            settings,
            session,
            backend,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// One-time setup. A missing renderer aborts before any API call is made.
    pub async fn initialize<P: Prompter + ?Sized>(&self, prompter: &mut P) -> Result<()> {
        logi("Welcome to MathVideo!");
        logi("Convert your mathematical concepts into beautiful videos.");

        if !check_renderer(&self.settings).await {
            anyhow::bail!("Manim is not installed. Please install it with: pip install manim");
        }

        acquire_credential(prompter, &self.session)?;
        self.ensure_output_dir().await;
        Ok(())
    }

    async fn ensure_output_dir(&self) {
        let dir = self.session.output_dir();
        if let Err(err) = fs::create_dir_all(dir).await {
            loge(format!(
                "Error creating output directory {}: {}",
                dir.display(),
                err
            ));
        }
    }

    pub async fn try_create_video(&self, concept: &str) -> Result<PathBuf> {
        let output_dir = self.session.output_dir();
        let mut state = RenderState::Idle;

        logi("Generating Manim code...");
        let code =
            generate_manim_code(&self.backend, &self.settings, &self.session, concept).await?;
        validate_script(&code)?;
        advance(&mut state, RenderState::CodeGenerated);

        logi("Writing Python script...");
        let script = write_script(output_dir, &code).await?;
        advance(&mut state, RenderState::ScriptWritten);
        logok(format!(
            "Python script saved: {}",
            script
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        ));

        logi("Rendering video with Manim...");
        advance(&mut state, RenderState::Rendering);
        let rendered = match run_renderer(&self.settings, output_dir, &script).await {
            Ok(video) => video,
            Err(err) => {
                advance(&mut state, err.terminal_state());
                return Err(err.into());
            }
        };
        let video = confirm_video(&mut state, rendered).await?;

        let shown = pathdiff::diff_paths(&video, output_dir).unwrap_or_else(|| video.clone());
        logok("Video created successfully!");
        logok(format!("Video file: {}", shown.display()));
        logok(format!("Location: {}", output_dir.display()));
        Ok(video)
    }

    /// Like [`Self::try_create_video`], but failures end as console guidance
    /// instead of an error.
    pub async fn create_video(&self, concept: &str) -> Option<PathBuf> {
        match self.try_create_video(concept).await {
            Ok(video) => Some(video),
            Err(err) => {
                loge(format!("Error creating video: {:#}", err));
                logi("Try using a simpler mathematical concept or check your API key.");
                logi("Make sure Manim is properly installed: pip install manim");
                None
            }
        }
    }

    pub async fn run_interactive<P: Prompter + ?Sized>(
        &self,
        prompter: &mut P,
    ) -> Result<Option<PathBuf>> {
        self.initialize(prompter).await?;

        let concept = loop {
            let input = prompter.line("Enter the mathematical concept you want to animate:")?;
            if input.trim().is_empty() {
                logw("Please enter a mathematical concept");
                continue;
            }
            break input;
        };

        Ok(self.create_video(&concept).await)
    }

    pub async fn run_direct<P: Prompter + ?Sized>(
        &self,
        prompter: &mut P,
        concept: &str,
    ) -> Result<Option<PathBuf>> {
        logi("MathVideo - Convert strings to videos using Groq API and Manim");
        logi(format!("Input: {}", concept));

        self.initialize(prompter).await?;
        Ok(self.create_video(concept).await)
    }
}
