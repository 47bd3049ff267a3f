//! Database module: row models and SQL repositories.
//!
//! - `model`: row shapes and their conversion into domain values.
//! - `repo`: SQL-only functions over a SQLite pool.
//!
//! The pool also implements the engine's [`RecordStore`] and the jobs'
//! [`RecipientSource`], so binaries can hand it straight to the core.

use anyhow::Result;
use async_trait::async_trait;

use crate::digest::RecordStore;
use crate::jobs::RecipientSource;
use crate::model::{Audience, DetectionRecord, Recipient, Window, WindowCapture};

pub mod model;
pub mod repo;

pub use repo::*;

#[async_trait]
impl RecordStore for Pool {
    async fn fetch_detections(&self, window: &Window) -> Result<Vec<DetectionRecord>> {
        repo::fetch_detections(self, window).await
    }

    async fn fetch_capture(&self, window: &Window) -> Result<WindowCapture> {
        repo::fetch_capture(self, window).await
    }
}

#[async_trait]
impl RecipientSource for Pool {
    async fn recipients(&self, audience: Audience) -> Result<Vec<Recipient>> {
        repo::list_recipients(self, audience).await
    }
}
