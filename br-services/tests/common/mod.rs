//! Shared test utilities for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use br_core::config::AppConfig;
use br_services::AppContext;
use tempfile::TempDir;

/// Configuration rooted in `dir` with cheap password hashing and a short
/// support reply delay.
pub fn test_config(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::rooted_at(dir.path());
    config.auth.memory_kib = 1024;
    config.auth.iterations = 1;
    config.auth.parallelism = 1;
    config.chat.reply_delay_ms = 50;
    config
}

/// Bootstrapped context over a fresh store with the demo data seeded.
/// The TempDir must be held alive for the duration of the test.
pub fn seeded_context() -> (AppContext, TempDir) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let ctx = AppContext::bootstrap(test_config(&dir)).expect("failed to bootstrap context");
    (ctx, dir)
}

/// Bootstrapped context over a fresh store with no users at all.
pub fn empty_context() -> (AppContext, TempDir) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let mut config = test_config(&dir);
    config.seed.demo_data = false;
    let ctx = AppContext::bootstrap(config).expect("failed to bootstrap context");
    (ctx, dir)
}

/// Write a small image file outside the photo store and return its path.
pub fn picked_image(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let picked = dir.path().join("picked");
    std::fs::create_dir_all(&picked).expect("failed to create picker dir");
    let path = picked.join(name);
    std::fs::write(&path, bytes).expect("failed to write picked image");
    path
}

// Ids fixed by the demo seed's insertion order.
pub const ADMIN_ID: i64 = 1;
pub const SUPPORT_ID: i64 = 2;
pub const FIREFIGHTER_ID: i64 = 3;
pub const CITIZEN_ID: i64 = 4;
