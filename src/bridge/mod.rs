//! Collaborator contracts for the remote side of the system.
//!
//! The core treats transcription and the vault as opaque request/response
//! services behind these traits. HTTP implementations live in this module;
//! tests inject their own.

pub mod http;
pub mod transcribe;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::ConfidenceSpan;

pub use http::HttpVaultBridge;
pub use transcribe::HttpTranscriber;

/// How a collaborator call failed. The sync worker's retry policy is driven
/// entirely by this distinction.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Network or timeout failure; retryable.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend returned a well-formed error or an unusable response;
    /// never retried.
    #[error("remote rejected request: {0}")]
    Rejected(String),

    /// No remote endpoint configured; the caller leaves work queued.
    #[error("remote endpoint not configured")]
    Unconfigured,
}

/// Result of a transcription call
#[derive(Debug, Clone)]
pub struct Transcription {
    pub text: String,
    pub detected_language: String,
    /// All spans the backend reported; the worker filters for low confidence
    pub spans: Vec<ConfidenceSpan>,
}

/// Confirmation of a vault append
#[derive(Debug, Clone)]
pub struct AppendReceipt {
    /// Path of the note file inside the vault
    pub file_path: String,
}

/// Speech-to-text collaborator
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe an opaque audio payload. Must enforce its own timeout; a
    /// timeout surfaces as [`BridgeError::Transport`].
    async fn transcribe(&self, audio: &[u8], mime_type: &str)
        -> Result<Transcription, BridgeError>;
}

/// Vault-append collaborator (the bridge in front of the note vault)
#[async_trait]
pub trait VaultBridge: Send + Sync {
    /// Append markdown to a note file, creating it when asked to.
    async fn append_note(
        &self,
        file_path: &str,
        content: &str,
        create_if_missing: bool,
    ) -> Result<AppendReceipt, BridgeError>;

    /// Reachability probe used to decide whether draining is worth trying.
    /// Failures report as unreachable, never as errors.
    async fn health(&self) -> bool;
}
