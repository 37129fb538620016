//! Zip extraction into the working directory.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use super::FetchError;

/// Extract every entry of `archive` under `dest`, creating directories as
/// needed. Returns the paths of the files written, in archive order.
///
/// Entries are not filtered by name: whatever the archive holds is
/// materialized. Entries that would resolve outside `dest` abort extraction.
pub fn extract_all(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>, FetchError> {
    let file = File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;

    fs::create_dir_all(dest)?;

    let mut written = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let relative = entry.enclosed_name().ok_or_else(|| {
            FetchError::Archive(format!("unsafe entry path '{}'", entry.name()))
        })?;
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
        written.push(out_path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn extracts_nested_entries() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("bundle.zip");
        write_zip(&archive, &[("top.csv", "a\n1\n"), ("nested/inner.txt", "hi")]);

        let dest = dir.path().join("out");
        let written = extract_all(&archive, &dest).unwrap();

        assert_eq!(written, vec![dest.join("top.csv"), dest.join("nested/inner.txt")]);
        assert_eq!(fs::read_to_string(dest.join("nested/inner.txt")).unwrap(), "hi");
    }

    #[test]
    fn rejects_entries_escaping_destination() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("evil.zip");
        write_zip(&archive, &[("../escape.txt", "nope")]);

        let dest = dir.path().join("out");
        let err = extract_all(&archive, &dest).unwrap_err();
        assert!(matches!(err, FetchError::Archive(_)));
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[test]
    fn corrupt_archive_is_an_archive_error() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("broken.zip");
        fs::write(&archive, vec![b'x'; 256]).unwrap();

        let err = extract_all(&archive, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, FetchError::Archive(_)));
    }
}
