//! Image picker collaborator.
//!
//! Camera and gallery access live outside this crate. The controllers only
//! need something that eventually yields a local file or nothing.

use std::path::PathBuf;

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickResult {
    Picked(PathBuf),
    Cancelled,
}

#[async_trait]
pub trait ImagePicker: Send + Sync {
    async fn pick(&self) -> PickResult;
}

/// Picker that always yields the same answer, for callers that already
/// know the image path.
pub struct FixedPicker(pub PickResult);

#[async_trait]
impl ImagePicker for FixedPicker {
    async fn pick(&self) -> PickResult {
        self.0.clone()
    }
}
