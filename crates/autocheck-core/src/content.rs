//! In-memory snapshot of a repository's files.

use std::collections::BTreeMap;

/// Repository-relative file map. Paths use `/` separators and no leading slash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryContent {
    files: BTreeMap<String, Vec<u8>>,
}

impl RepositoryContent {
    /// Snapshot with no files, used when the download failed.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_files<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<Vec<u8>>,
    {
        let mut content = Self::default();
        for (path, bytes) in files {
            content.insert(path.as_ref(), bytes);
        }
        content
    }

    pub fn insert(&mut self, path: &str, bytes: impl Into<Vec<u8>>) {
        let path = normalize_path(path);
        if !path.is_empty() {
            self.files.insert(path, bytes.into());
        }
    }

    pub fn file_exists(&self, path: &str) -> bool {
        self.files.contains_key(&normalize_path(path))
    }

    /// File content as UTF-8 text; `None` when absent or not valid UTF-8.
    pub fn read_file(&self, path: &str) -> Option<String> {
        self.read_bytes(path)
            .and_then(|bytes| String::from_utf8(bytes.to_vec()).ok())
    }

    pub fn read_bytes(&self, path: &str) -> Option<&[u8]> {
        self.files.get(&normalize_path(path)).map(Vec::as_slice)
    }

    /// All file paths in lexical order.
    pub fn list_all_files(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Strip `./` and leading slashes, and unify separators.
pub fn normalize_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let mut rest = unified.as_str();
    loop {
        if let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
        } else {
            break;
        }
    }
    rest.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_normalizes_paths() {
        let content = RepositoryContent::from_files([("src/main.py", "print(1)")]);
        assert!(content.file_exists("src/main.py"));
        assert!(content.file_exists("./src/main.py"));
        assert!(content.file_exists("/src/main.py"));
        assert!(!content.file_exists("src"));
    }

    #[test]
    fn read_file_rejects_binary() {
        let content = RepositoryContent::from_files([("logo.bin", vec![0xff, 0xfe, 0x00])]);
        assert!(content.read_file("logo.bin").is_none());
        assert_eq!(content.read_bytes("logo.bin"), Some(&[0xff, 0xfe, 0x00][..]));
    }

    #[test]
    fn empty_snapshot_has_nothing() {
        let content = RepositoryContent::empty();
        assert!(content.is_empty());
        assert!(!content.file_exists("README.md"));
        assert!(content.read_file("README.md").is_none());
    }

    #[test]
    fn files_listed_in_order() {
        let content = RepositoryContent::from_files([("b.txt", "b"), ("a.txt", "a")]);
        assert_eq!(content.list_all_files(), vec!["a.txt", "b.txt"]);
    }
}
