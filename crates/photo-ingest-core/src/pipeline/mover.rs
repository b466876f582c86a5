use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::logging::{log_file_error, log_fs_modification};
use crate::types::{ItemError, MediaFile, Stage};

/// Moves items into place, probing `-001`, `-002`, ... on name collisions
#[derive(Debug, Clone, Copy)]
pub struct Mover {
    max_probes: u32,
}

impl Mover {
    pub fn new(max_probes: u32) -> Self {
        Self { max_probes }
    }

    /// Move `item` to `directory/file_name` or the first free suffixed name.
    ///
    /// On success the item points at its new location and carries the size
    /// and timestamps of the moved file.
    pub fn move_item(
        &self,
        item: &mut MediaFile,
        directory: &Path,
        file_name: &str,
    ) -> Result<PathBuf, ItemError> {
        match self.try_move(item, directory, file_name) {
            Ok(target) => Ok(target),
            Err(e) => {
                item.fail(Stage::Mover, e.clone());
                Err(e)
            }
        }
    }

    fn try_move(
        &self,
        item: &mut MediaFile,
        directory: &Path,
        file_name: &str,
    ) -> Result<PathBuf, ItemError> {
        // Nothing may hold the file open during the rename
        item.release_image();

        fs::create_dir_all(directory).map_err(|e| {
            log_file_error(directory, "create_dir", &e);
            ItemError::MoveFailed(e.to_string())
        })?;

        let target = free_target(directory, file_name, self.max_probes)?;

        relocate(&item.source, &target).map_err(|e| {
            log_file_error(&item.source, "move", &e);
            ItemError::MoveFailed(e.to_string())
        })?;

        log_fs_modification(
            "move",
            &item.source,
            Some(&format!("to {}", target.display())),
        );

        if let Ok(metadata) = fs::metadata(&target) {
            item.refresh_times(&metadata);
        }
        item.moved_to = Some(target.clone());
        Ok(target)
    }
}

/// First path in `directory` not yet taken: the plain name, then `stem-NNN.ext`
pub fn free_target(
    directory: &Path,
    file_name: &str,
    max_probes: u32,
) -> Result<PathBuf, ItemError> {
    let candidate = directory.join(file_name);
    if !candidate.exists() {
        return Ok(candidate);
    }

    for counter in 1..=max_probes {
        let candidate = directory.join(suffixed_name(file_name, counter));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(ItemError::MoveCollisionExhausted {
        attempts: max_probes,
    })
}

fn suffixed_name(file_name: &str, counter: u32) -> String {
    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    match name.extension() {
        Some(ext) => format!("{}-{:03}.{}", stem, counter, ext.to_string_lossy()),
        None => format!("{}-{:03}", stem, counter),
    }
}

/// Rename, falling back to copy and delete across filesystems
fn relocate(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            log::debug!(
                "rename {} failed ({}), copying instead",
                from.display(),
                rename_err
            );
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::write_file;
    use tempfile::tempdir;

    const NAME: &str = "2021-05-04 102030-Nikon.jpg";

    #[test]
    fn test_suffixed_name() {
        assert_eq!(suffixed_name(NAME, 1), "2021-05-04 102030-Nikon-001.jpg");
        assert_eq!(suffixed_name("plain", 12), "plain-012");
        assert_eq!(suffixed_name("a.b.JPG", 999), "a.b-999.JPG");
    }

    #[test]
    fn test_second_file_gets_suffix() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("out/2021/05");
        let first = write_file(dir.path(), "in/one.jpg", b"first");
        let second = write_file(dir.path(), "in/two.jpg", b"second");
        let mover = Mover::new(999);

        let mut a = MediaFile::from_path(&first).unwrap();
        let mut b = MediaFile::from_path(&second).unwrap();
        let a_path = mover.move_item(&mut a, &target, NAME).unwrap();
        let b_path = mover.move_item(&mut b, &target, NAME).unwrap();

        assert_eq!(a_path, target.join(NAME));
        assert_eq!(b_path, target.join("2021-05-04 102030-Nikon-001.jpg"));
        assert_eq!(fs::read(&b_path).unwrap(), b"second");
        assert!(!first.exists());
        assert!(!second.exists());
        assert_eq!(b.current_path(), b_path.as_path());
        assert_eq!(b.size, 6);
    }

    #[test]
    fn test_probe_exhaustion_is_terminal() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), "out/a.jpg", b"x");
        write_file(dir.path(), "out/a-001.jpg", b"x");
        write_file(dir.path(), "out/a-002.jpg", b"x");
        let source = write_file(dir.path(), "in/a.jpg", b"new");
        let mut item = MediaFile::from_path(&source).unwrap();

        let result = Mover::new(2).move_item(&mut item, &dir.path().join("out"), "a.jpg");

        assert_eq!(
            result,
            Err(ItemError::MoveCollisionExhausted { attempts: 2 })
        );
        assert!(source.exists());
        assert!(item.moved_to.is_none());
        assert_eq!(item.error.as_ref().map(|e| e.stage), Some(Stage::Mover));
    }

    #[test]
    fn test_missing_source_is_move_failure() {
        let dir = tempdir().unwrap();
        let mut item = MediaFile::new(dir.path().join("gone.jpg"), 0);

        let result = Mover::new(5).move_item(&mut item, dir.path(), "x.jpg");

        assert!(matches!(result, Err(ItemError::MoveFailed(_))));
    }
}
