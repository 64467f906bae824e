use std::path::{Path, PathBuf};

pub trait StorageManager: Send + Sync {
    fn write(&self, ident: &str, data: &[u8]) -> std::io::Result<()>;
    fn read(&self, ident: &str) -> std::io::Result<Vec<u8>>;
    fn exists(&self, ident: &str) -> bool;
    fn delete(&self, ident: &str) -> std::io::Result<()>;
    fn list(&self) -> Vec<String>;
}

/// Flat key/value store over one directory. Every key is a file name.
#[derive(Clone, Debug)]
pub struct BackendLocal {
    pub base_dir: PathBuf,
}

impl BackendLocal {
    pub fn new(storage_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;
        Ok(BackendLocal { base_dir: path })
    }

    fn path_of(&self, ident: &str) -> PathBuf {
        self.base_dir.join(ident)
    }
}

impl StorageManager for BackendLocal {
    fn exists(&self, ident: &str) -> bool {
        std::fs::metadata(self.path_of(ident)).is_ok()
    }

    fn read(&self, ident: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.path_of(ident))
    }

    fn write(&self, ident: &str, data: &[u8]) -> std::io::Result<()> {
        let path = self.path_of(ident);
        let temp_path = self
            .base_dir
            .join(format!(".{}-{ident}", rusty_ulid::generate_ulid_string()));

        std::fs::write(&temp_path, data)?;

        std::fs::rename(&temp_path, &path).inspect_err(|_| {
            let _ = std::fs::remove_file(&temp_path);
        })
    }

    fn delete(&self, ident: &str) -> std::io::Result<()> {
        std::fs::remove_file(self.path_of(ident))
    }

    fn list(&self) -> Vec<String> {
        std::fs::read_dir(&self.base_dir)
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .filter_map(|entry| {
                        let path = entry.path();
                        if path.is_file() {
                            path.file_name()
                                .and_then(|name| name.to_str())
                                .filter(|name| !name.starts_with('.'))
                                .map(|s| s.to_string())
                        } else {
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = BackendLocal::new(tmp.path().join("nested")).unwrap();

        store.write("a.json", b"[1,2]").unwrap();
        assert!(store.exists("a.json"));
        assert_eq!(store.read("a.json").unwrap(), b"[1,2]");
    }

    #[test]
    fn test_list_skips_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = BackendLocal::new(tmp.path()).unwrap();

        store.write("one", b"1").unwrap();
        store.write("two", b"2").unwrap();
        std::fs::write(tmp.path().join(".partial-three"), b"3").unwrap();

        let mut keys = store.list();
        keys.sort();
        assert_eq!(keys, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_delete() {
        let tmp = tempfile::tempdir().unwrap();
        let store = BackendLocal::new(tmp.path()).unwrap();

        store.write("gone", b"x").unwrap();
        store.delete("gone").unwrap();
        assert!(!store.exists("gone"));
        assert!(store.delete("gone").is_err());
    }
}
