//! Shared test utilities for controller tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use br_core::config::AppConfig;
use br_services::AppContext;
use br_state::{FixedPicker, ImagePicker, PickResult, StateHolder};
use tempfile::TempDir;

pub const ADMIN_ID: i64 = 1;
pub const SUPPORT_ID: i64 = 2;
pub const FIREFIGHTER_ID: i64 = 3;
pub const CITIZEN_ID: i64 = 4;

/// Seeded context with cheap hashing and a short support delay.
pub fn seeded_context() -> (AppContext, TempDir) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let mut config = AppConfig::rooted_at(dir.path());
    config.auth.memory_kib = 1024;
    config.auth.iterations = 1;
    config.auth.parallelism = 1;
    config.chat.reply_delay_ms = 100;
    let ctx = AppContext::bootstrap(config).expect("failed to bootstrap context");
    (ctx, dir)
}

/// Seeded context with `email` already logged in.
pub fn logged_in(email: &str, password: &str) -> (AppContext, TempDir) {
    let (ctx, dir) = seeded_context();
    ctx.auth.login(email, password).expect("demo login failed");
    (ctx, dir)
}

/// Wait for `pred` on a controller's state, failing the test after two seconds.
pub async fn settle<S, P>(holder: &StateHolder<S>, pred: P) -> S
where
    S: Clone + PartialEq + Send + Sync + 'static,
    P: FnMut(&S) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), holder.wait_for(pred))
        .await
        .expect("state never reached the expected condition")
}

/// Picker yielding a freshly written image file.
pub fn picker_with_image(dir: &TempDir, name: &str, bytes: &[u8]) -> (Arc<dyn ImagePicker>, PathBuf) {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).expect("failed to write image");
    (Arc::new(FixedPicker(PickResult::Picked(path.clone()))), path)
}

pub fn cancelling_picker() -> Arc<dyn ImagePicker> {
    Arc::new(FixedPicker(PickResult::Cancelled))
}
