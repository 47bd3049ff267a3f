//! Error types shared by the digest engine, the dispatcher and the jobs.
use thiserror::Error;

/// Fatal errors of the digest computation. No partial digest is returned.
#[derive(Debug, Error)]
pub enum DigestError {
    #[error("record store unavailable: {0:#}")]
    StoreUnavailable(anyhow::Error),
    #[error("detection for image {image_id} has confidence {confidence} outside [0, 1]")]
    InvalidConfidence { image_id: String, confidence: f64 },
}

/// A single recipient's delivery failure. Counted by the dispatcher, never escalated.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("failed to build request: {0}")]
    Request(String),
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),
    #[error("send task aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("failed to load recipients: {0:#}")]
    Recipients(anyhow::Error),
    #[error(transparent)]
    Digest(#[from] DigestError),
    #[error("invalid sighting: {0}")]
    InvalidSighting(&'static str),
}

#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("invalid email address: {0}")]
    InvalidEmail(String),
    #[error("failed to store subscription: {0:#}")]
    Store(anyhow::Error),
    #[error("failed to send welcome email: {0}")]
    Welcome(#[from] SendError),
}
