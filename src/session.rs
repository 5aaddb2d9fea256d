use once_cell::sync::OnceCell;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("API credential is already set for this session")]
    CredentialAlreadySet,
    #[error("no API credential has been entered")]
    CredentialMissing,
    #[error("API credential must not be empty")]
    EmptyCredential,
}

/// Bearer secret for the generation API.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Result<Self, SessionError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(SessionError::EmptyCredential);
        }
        Ok(Self(secret))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn authorization_value(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Per-process state handed to each component. The output directory is fixed
/// at construction and the credential can be set once.
#[derive(Debug)]
pub struct Session {
    credential: OnceCell<Credential>,
    output_dir: PathBuf,
}

impl Session {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            credential: OnceCell::new(),
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.get()
    }

    pub fn require_credential(&self) -> Result<&Credential, SessionError> {
        self.credential.get().ok_or(SessionError::CredentialMissing)
    }

    pub fn set_credential(&self, credential: Credential) -> Result<(), SessionError> {
        self.credential
            .set(credential)
            .map_err(|_| SessionError::CredentialAlreadySet)
    }
}
