use crate::api::{ChatBackend, ChatMessage, ChatRequest, GenerationError};
use crate::config::Settings;
use crate::session::Session;
use crate::{loge, logi};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::fs;
use tracing::debug;

pub const IMPORT_MARKER: &str = "from manim import";
pub const CLASS_MARKER: &str = "class";

const PREVIEW_CHARS: usize = 200;

static PYTHON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```python\s*").expect("valid python fence regex"));
static LEADING_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*```(?:[\w+-]*[ \t]*\r?\n)?").expect("valid leading fence regex")
});
static TRAILING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*```\s*$").expect("valid trailing fence regex"));

pub fn build_user_prompt(template: &str, input: &str) -> String {
    format!(
        "{}\n\nCONVERT THIS MATHEMATICAL CONCEPT INTO A MANIM ANIMATION:\n\"{}\"\n\nFOLLOW THE ALGORITHMIC FRAMEWORK EXACTLY. RETURN ONLY PYTHON CODE.",
        template, input
    )
}

pub fn build_request(settings: &Settings, template: &str, input: &str) -> ChatRequest {
    ChatRequest {
        model: settings.model.clone(),
        messages: vec![
            ChatMessage::system(template),
            ChatMessage::user(build_user_prompt(template, input)),
        ],
        temperature: settings.temperature,
        max_tokens: settings.max_tokens,
    }
}

fn strip_fences_once(code: &str) -> String {
    let code = PYTHON_FENCE.replace_all(code, "");
    let code = TRAILING_FENCE.replace(&code, "");
    let code = LEADING_FENCE.replace(&code, "");
    code.trim().to_string()
}

/// Removes the markdown fencing models like to wrap code in. Applied until
/// nothing changes, so cleaning cleaned text is a no-op.
pub fn clean_generated_code(code: &str) -> String {
    let mut current = code.trim().to_string();
    loop {
        let next = strip_fences_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Coarse check that the reply looks like a Manim scene module.
pub fn validate_script(code: &str) -> Result<(), GenerationError> {
    if code.contains(IMPORT_MARKER) && code.contains(CLASS_MARKER) {
        return Ok(());
    }
    let mut preview: String = code.chars().take(PREVIEW_CHARS).collect();
    preview.push_str("...");
    loge(format!("Generated code preview: {}", preview));
    Err(GenerationError::MissingMarkers { preview })
}

/// Reads the instruction template, asks the backend for a script and returns
/// it without markdown fencing. The result is not validated here.
pub async fn generate_manim_code<B: ChatBackend + ?Sized>(
    backend: &B,
    settings: &Settings,
    session: &Session,
    input: &str,
) -> Result<String, GenerationError> {
    let template = fs::read_to_string(&settings.prompt_path)
        .await
        .map_err(|source| {
            loge(format!(
                "Error reading system prompt file {}: {}",
                settings.prompt_path.display(),
                source
            ));
            GenerationError::Template {
                path: settings.prompt_path.clone(),
                source,
            }
        })?;

    let credential = session.require_credential()?;
    let request = build_request(settings, &template, input);
    debug!(template_bytes = template.len(), "built generation request");

    logi(format!("Requesting script from {}...", settings.model));
    let raw = backend.complete(credential, &request).await?;
    Ok(clean_generated_code(&raw))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::session::Credential;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Returns a canned reply and remembers what it was asked.
    pub(crate) struct StubBackend {
        pub reply: Result<String, ()>,
        pub seen: Mutex<Vec<(String, ChatRequest)>>,
    }

    impl StubBackend {
        pub(crate) fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                reply: Err(()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatBackend for StubBackend {
        async fn complete(
            &self,
            credential: &Credential,
            request: &ChatRequest,
        ) -> Result<String, GenerationError> {
            self.seen
                .lock()
                .unwrap()
                .push((credential.authorization_value(), request.clone()));
            self.reply.clone().map_err(|_| GenerationError::Request)
        }
    }

    fn session_with_key() -> Session {
        let session = Session::new("out");
        session.set_credential(Credential::new("gsk_test").unwrap()).unwrap();
        session
    }

    #[test]
    fn python_fence_is_removed() {
        assert_eq!(clean_generated_code("```python\nX\n```"), "X");
    }

    #[test]
    fn other_fences_are_removed() {
        assert_eq!(clean_generated_code("```\nfrom manim import *\n```\n"), "from manim import *");
        assert_eq!(clean_generated_code("```py\nA\nB\n```"), "A\nB");
        assert_eq!(clean_generated_code("  plain code  "), "plain code");
    }

    #[test]
    fn cleaning_is_idempotent() {
        let inputs = [
            "```python\nX\n```",
            "```\n```\nX",
            "```python\n```python\nY\n```\n```",
            "no fences at all",
            "```js\nlet a = 1;\n```",
            "",
        ];
        for input in inputs {
            let once = clean_generated_code(input);
            assert_eq!(clean_generated_code(&once), once, "input: {:?}", input);
        }
    }

    #[test]
    fn inner_backticks_survive() {
        let code = "from manim import *\ns = \"```\"\nclass MathScene(Scene): pass";
        assert_eq!(clean_generated_code(code), code);
    }

    #[test]
    fn validation_requires_both_markers() {
        assert!(validate_script("from manim import *\nclass MathScene(Scene): pass").is_ok());

        match validate_script("import numpy") {
            Err(GenerationError::MissingMarkers { preview }) => {
                assert_eq!(preview, "import numpy...")
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(validate_script("class Foo: pass").is_err());
    }

    #[test]
    fn preview_is_capped() {
        let long = "x".repeat(500);
        match validate_script(&long) {
            Err(GenerationError::MissingMarkers { preview }) => {
                assert_eq!(preview.len(), PREVIEW_CHARS + 3)
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn user_prompt_embeds_quoted_input() {
        let prompt = build_user_prompt("TEMPLATE", "2x+3=7 solve for x");
        assert!(prompt.starts_with("TEMPLATE\n\n"));
        assert!(prompt.contains("\"2x+3=7 solve for x\""));
        assert!(prompt.ends_with("RETURN ONLY PYTHON CODE."));
    }

    #[tokio::test]
    async fn generation_sends_template_and_cleans_reply() {
        let dir = tempfile::tempdir().unwrap();
        let prompt_path = dir.path().join("systemprompt.txt");
        std::fs::write(&prompt_path, "You write Manim.").unwrap();
        let settings = Settings {
            prompt_path,
            ..Settings::default()
        };
        let backend = StubBackend::replying("```python\nfrom manim import *\n```");

        let code = generate_manim_code(&backend, &settings, &session_with_key(), "pi")
            .await
            .unwrap();
        assert_eq!(code, "from manim import *");

        let seen = backend.seen.lock().unwrap();
        let (auth, request) = &seen[0];
        assert_eq!(auth, "Bearer gsk_test");
        assert_eq!(request.messages[0], ChatMessage::system("You write Manim."));
        assert_eq!(request.messages[1].role, "user");
        assert_eq!(request.temperature, 0.7);
        assert_eq!(request.max_tokens, 2000);
    }

    #[tokio::test]
    async fn missing_template_fails_before_any_request() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            prompt_path: dir.path().join("absent.txt"),
            ..Settings::default()
        };
        let backend = StubBackend::replying("unused");

        let err = generate_manim_code(&backend, &settings, &session_with_key(), "pi")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Template { .. }));
        assert!(backend.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn backend_failure_is_generic() {
        let dir = tempfile::tempdir().unwrap();
        let prompt_path = dir.path().join("systemprompt.txt");
        std::fs::write(&prompt_path, "t").unwrap();
        let settings = Settings {
            prompt_path,
            ..Settings::default()
        };

        let err = generate_manim_code(&StubBackend::failing(), &settings, &session_with_key(), "pi")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Request));
        assert_eq!(err.to_string(), "Failed to generate Manim code");
    }
}
