use anyhow::{Context, Result};
use clap::Parser;
use mathvideo::app::MathVideo;
use mathvideo::config::Settings;
use mathvideo::credential::TerminalPrompter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mathvideo")]
#[command(about = "Convert a mathematical concept into a Manim video", long_about = None)]
struct Cli {
    /// Concept to animate, e.g. "2x+3=7 solve for x". Prompts when omitted.
    concept: Option<String>,

    /// JSON settings file overriding the defaults
    #[arg(long)]
    config: Option<PathBuf>,
}

async fn run(cli: Cli) -> Result<()> {
    let settings = match &cli.config {
        Some(path) => Settings::load(path).await?,
        None => Settings::default(),
    };
    let cwd = std::env::current_dir().context("Failed to resolve working directory")?;
    let app = MathVideo::with_groq(settings, &cwd)?;
    let mut prompter = TerminalPrompter;

    match cli.concept.filter(|c| !c.is_empty()) {
        Some(concept) => app.run_direct(&mut prompter, &concept).await?,
        None => app.run_interactive(&mut prompter).await?,
    };
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(err) = run(Cli::parse()).await {
        eprintln!("[ERROR] {:#}", err);
        std::process::exit(1);
    }
}
