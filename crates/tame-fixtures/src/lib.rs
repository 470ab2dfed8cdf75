//! Shared helpers for integration tests driving the fixture binaries.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Create a unique temporary directory for a test run, named with a
/// millisecond timestamp so parallel test runs never collide.
///
/// # Panics
/// Panics if the directory cannot be created.
#[must_use]
pub fn temp_dir(prefix: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    let stamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    dir.push(format!("tame-{prefix}-{stamp}"));
    #[allow(clippy::expect_used)]
    std::fs::create_dir_all(&dir).expect("failed to create temp directory");
    dir
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn temp_dir_creates_unique_directories() {
        let dir1 = temp_dir("a");
        let dir2 = temp_dir("b");
        assert!(dir1.exists());
        assert!(dir2.exists());
        assert_ne!(dir1, dir2);
        let _ = std::fs::remove_dir_all(&dir1);
        let _ = std::fs::remove_dir_all(&dir2);
    }
}
