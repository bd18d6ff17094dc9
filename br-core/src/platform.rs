//! Per-user directories for the store, photos, logs and config.

use std::path::PathBuf;

use crate::constants::APP_NAME;
use crate::error::{BrError, BrResult};

pub struct Platform;

impl Platform {
    /// `<data dir>/Brigada`, e.g. `~/.local/share/Brigada` on Linux.
    pub fn data_dir() -> BrResult<PathBuf> {
        let base = dirs::data_dir()
            .ok_or_else(|| BrError::Config("could not determine data directory".into()))?;
        Ok(base.join(APP_NAME))
    }

    /// `<config dir>/Brigada`.
    pub fn config_dir() -> BrResult<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| BrError::Config("could not determine config directory".into()))?;
        Ok(base.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_end_in_app_name() {
        if let Ok(dir) = Platform::data_dir() {
            assert!(dir.ends_with(APP_NAME));
        }
        if let Ok(dir) = Platform::config_dir() {
            assert!(dir.ends_with(APP_NAME));
        }
    }
}
