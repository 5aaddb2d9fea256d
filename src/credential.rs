use crate::logw;
use crate::session::{Credential, Session};
use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};

const ONBOARDING_STEPS: &[&str] = &[
    "1. Go to https://console.groq.com/",
    "2. Sign up or log in to your account",
    "3. Navigate to API Keys section",
    "4. Create a new API key",
    "5. Copy the key and paste it below",
];

/// Terminal interaction used by the interactive flows.
pub trait Prompter {
    /// Yes/no question; an empty answer picks `default`.
    fn confirm(&mut self, message: &str, default: bool) -> Result<bool>;
    /// Masked single-line input.
    fn secret(&mut self, message: &str) -> Result<String>;
    /// Plain single-line input.
    fn line(&mut self, message: &str) -> Result<String>;
}

#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    fn read_line(&self) -> Result<String> {
        let mut buf = String::new();
        let n = io::stdin()
            .lock()
            .read_line(&mut buf)
            .context("Failed to read from stdin")?;
        if n == 0 {
            anyhow::bail!("stdin closed while waiting for input");
        }
        Ok(buf.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl Prompter for TerminalPrompter {
    fn confirm(&mut self, message: &str, default: bool) -> Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            print!("? {} {} ", message, hint);
            io::stdout().flush().ok();
            let answer = self.read_line()?;
            match answer.trim().to_ascii_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => logw("Please answer yes or no"),
            }
        }
    }

    fn secret(&mut self, message: &str) -> Result<String> {
        rpassword::prompt_password(format!("? {} ", message)).context("Failed to read masked input")
    }

    fn line(&mut self, message: &str) -> Result<String> {
        print!("? {} ", message);
        io::stdout().flush().ok();
        self.read_line()
    }
}

/// Asks for the Groq key and stores it in the session. Users without a key
/// get the sign-up steps first; both answers then share the same prompt.
pub fn acquire_credential<P: Prompter + ?Sized>(
    prompter: &mut P,
    session: &Session,
) -> Result<()> {
    let has_key = prompter.confirm("Do you have a Groq API key?", true)?;
    if !has_key {
        println!("\nTo get your Groq API key:");
        for step in ONBOARDING_STEPS {
            println!("{}", step);
        }
        println!();
    }

    let credential = loop {
        let input = prompter.secret("Please enter your Groq API key:")?;
        match Credential::new(input) {
            Ok(c) => break c,
            Err(_) => logw("API key is required"),
        }
    };

    session.set_credential(credential)?;
    Ok(())
}
