use std::{
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{Result, SceneError};

/// Location of an audio resource handed to an analysis provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioLocator {
    path: PathBuf,
}

impl AudioLocator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for AudioLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Resolves static asset names against a public directory.
#[derive(Debug, Default)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the locator of `name` below the root. Fails when the file does
    /// not exist.
    pub fn static_file(&self, name: &str) -> Result<AudioLocator> {
        let path = self.root.join(name);
        if path.is_file() {
            Ok(AudioLocator::new(path))
        } else {
            Err(SceneError::audio(format!(
                "unknown static asset `{name}` (looked for {})",
                path.display()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("particle-tree-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn resolves_existing_files() {
        let dir = scratch_dir("assets");
        std::fs::write(dir.join("jingle.mp3"), b"id3").unwrap();

        let store = AssetStore::new(&dir);
        assert_eq!(
            store.static_file("jingle.mp3").unwrap(),
            AudioLocator::new(dir.join("jingle.mp3"))
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn errors_on_missing_assets() {
        let store = AssetStore::new(scratch_dir("assets-missing"));
        let err = store.static_file("missing.mp3").unwrap_err();
        assert!(format!("{err}").contains("missing.mp3"));
    }
}
