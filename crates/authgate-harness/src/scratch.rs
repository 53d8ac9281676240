//! Scratch files and build contexts on the local file system.
//!
//! Each call allocates a fresh, uniquely named directory under the system
//! temp dir. Nothing is removed implicitly: callers schedule
//! [`remove_scratch_dir`] on their teardown stack.

use std::path::{Path, PathBuf};

use authgate_common::constants::{BUILD_RECIPE_FILE_NAME, SCRATCH_PREFIX};
use authgate_common::error::{HarnessError, Result};

/// Writes `content` to a file called `name` inside a new scratch directory.
///
/// # Errors
///
/// Returns an error if `name` or `content` is empty, `name` is not a plain
/// file name, or the file system rejects the write.
pub fn create_temp_file(name: &str, content: &str) -> Result<PathBuf> {
    if name.is_empty() || content.is_empty() {
        return Err(HarnessError::InvalidInput {
            message: "scratch file name and content must be non-empty".into(),
        });
    }
    if Path::new(name).file_name().and_then(|n| n.to_str()) != Some(name) {
        return Err(HarnessError::InvalidInput {
            message: format!("`{name}` is not a plain file name"),
        });
    }

    let dir = create_scratch_dir()?;
    let path = dir.join(name);
    write_file(&path, content)?;
    tracing::debug!(path = %path.display(), "created scratch file");
    Ok(path)
}

/// Writes a build recipe into a new scratch directory and returns the directory.
///
/// # Errors
///
/// Returns an error if `recipe` is empty or the file system rejects the write.
pub fn create_build_context(recipe: &str) -> Result<PathBuf> {
    if recipe.trim().is_empty() {
        return Err(HarnessError::InvalidInput {
            message: "build recipe must be non-empty".into(),
        });
    }

    let dir = create_scratch_dir()?;
    write_file(&dir.join(BUILD_RECIPE_FILE_NAME), recipe)?;
    tracing::debug!(dir = %dir.display(), "created build context");
    Ok(dir)
}

/// Removes a scratch directory and everything under it.
///
/// A directory that is already gone is not an error.
///
/// # Errors
///
/// Returns an error if removal fails for any other reason.
pub fn remove_scratch_dir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {
            tracing::debug!(dir = %dir.display(), "removed scratch dir");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(HarnessError::Provision {
            path: dir.to_path_buf(),
            source: e,
        }),
    }
}

fn create_scratch_dir() -> Result<PathBuf> {
    let dir = tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .tempdir()
        .map_err(|e| HarnessError::Provision {
            path: std::env::temp_dir(),
            source: e,
        })?;
    Ok(dir.keep())
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|e| HarnessError::Provision {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_file_lands_in_its_own_dir() {
        let a = create_temp_file("htpasswd", "user:hash").unwrap();
        let b = create_temp_file("htpasswd", "user:hash").unwrap();
        assert_ne!(a.parent(), b.parent());
        assert_eq!(std::fs::read_to_string(&a).unwrap(), "user:hash");

        for path in [a, b] {
            let dir = path.parent().unwrap().to_path_buf();
            remove_scratch_dir(&dir).unwrap();
            assert!(!dir.exists());
        }
    }

    #[test]
    fn build_context_contains_recipe() {
        let recipe = "FROM alpine\nCMD [\"echo\", \"bar\"]\n";
        let dir = create_build_context(recipe).unwrap();
        let written = std::fs::read_to_string(dir.join(BUILD_RECIPE_FILE_NAME)).unwrap();
        assert_eq!(written, recipe);
        remove_scratch_dir(&dir).unwrap();
    }

    #[test]
    fn empty_inputs_are_rejected() {
        assert!(matches!(
            create_temp_file("", "x"),
            Err(HarnessError::InvalidInput { .. })
        ));
        assert!(matches!(
            create_temp_file("htpasswd", ""),
            Err(HarnessError::InvalidInput { .. })
        ));
        assert!(matches!(
            create_build_context("   "),
            Err(HarnessError::InvalidInput { .. })
        ));
    }

    #[test]
    fn nested_names_are_rejected() {
        assert!(matches!(
            create_temp_file("../escape", "x"),
            Err(HarnessError::InvalidInput { .. })
        ));
    }

    #[test]
    fn removing_missing_dir_is_ok() {
        let dir = create_build_context("FROM alpine").unwrap();
        remove_scratch_dir(&dir).unwrap();
        remove_scratch_dir(&dir).unwrap();
    }
}
