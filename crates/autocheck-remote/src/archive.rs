//! Repository zipball decoding.
//!
//! GitHub zipballs wrap every file in a single `<owner>-<repo>-<sha>/`
//! directory. That prefix is stripped so snapshot paths are repository-relative.

use std::io::{Cursor, Read};

use autocheck_core::{FetchError, RepositoryContent};
use tracing::debug;

/// Decode an in-memory zip archive into a snapshot.
pub fn read_zipball(bytes: &[u8]) -> Result<RepositoryContent, FetchError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| FetchError::Decode(format!("invalid zip archive: {e}")))?;

    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| FetchError::Decode(format!("unreadable zip entry {i}: {e}")))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut data)
            .map_err(|e| FetchError::Decode(format!("failed to read {name}: {e}")))?;
        entries.push((name, data));
    }

    let root = common_root(entries.iter().map(|(name, _)| name.as_str()));
    let mut content = RepositoryContent::empty();
    for (name, data) in entries {
        let path = match &root {
            Some(root) => name.strip_prefix(root.as_str()).unwrap_or(&name),
            None => &name,
        };
        content.insert(path, data);
    }
    debug!(files = content.len(), "Decoded repository archive");
    Ok(content)
}

/// The `dir/` prefix shared by every entry, if there is exactly one.
fn common_root<'a>(mut names: impl Iterator<Item = &'a str>) -> Option<String> {
    let first = names.next()?;
    let (dir, _) = first.split_once('/')?;
    let root = format!("{dir}/");
    names.all(|name| name.starts_with(&root)).then_some(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn zip_of(files: &[(&str, &[u8])], dirs: &[&str]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for dir in dirs {
            writer.add_directory(*dir, options).unwrap();
        }
        for (name, data) in files {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn strips_single_root_directory() {
        let bytes = zip_of(
            &[
                ("alice-lab-abc123/README.md", b"# Lab"),
                ("alice-lab-abc123/src/main.py", b"print(1)"),
            ],
            &["alice-lab-abc123/", "alice-lab-abc123/src/"],
        );
        let content = read_zipball(&bytes).unwrap();
        assert_eq!(content.list_all_files(), vec!["README.md", "src/main.py"]);
        assert_eq!(content.read_file("README.md").as_deref(), Some("# Lab"));
    }

    #[test]
    fn flat_archive_is_kept_as_is() {
        let bytes = zip_of(&[("README.md", b"a"), ("src/lib.rs", b"b")], &[]);
        let content = read_zipball(&bytes).unwrap();
        assert!(content.file_exists("README.md"));
        assert!(content.file_exists("src/lib.rs"));
    }

    #[test]
    fn mixed_roots_are_not_stripped() {
        let bytes = zip_of(&[("a/x.txt", b"1"), ("b/y.txt", b"2")], &[]);
        let content = read_zipball(&bytes).unwrap();
        assert!(content.file_exists("a/x.txt"));
        assert!(content.file_exists("b/y.txt"));
    }

    #[test]
    fn garbage_is_decode_error() {
        let err = read_zipball(b"<html>rate limited</html>").unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn empty_archive_is_empty_snapshot() {
        let bytes = zip_of(&[], &[]);
        assert!(read_zipball(&bytes).unwrap().is_empty());
    }
}
