//! Access to the note collection on disk.
//!
//! The store only hands out raw text. Parsing into [`Note`]s happens in
//! [`notes_from_store`] so that every snapshot resolves links the same way.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::{DirEntry, WalkDir};

use crate::notes::Note;

#[derive(Debug, Clone, PartialEq)]
pub struct RawNote {
    pub id: String,
    pub title: String,
    pub file_path: String,
    pub raw_text: String,
}

/// Change notification from whatever owns the notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "file_path", rename_all = "lowercase")]
pub enum NoteEvent {
    Created(String),
    Modified(String),
    Opened(String),
}

impl NoteEvent {
    pub fn file_path(&self) -> &str {
        match self {
            NoteEvent::Created(path) | NoteEvent::Modified(path) | NoteEvent::Opened(path) => path,
        }
    }
}

pub trait NoteStore: Send + Sync {
    fn list_notes(&self) -> std::io::Result<Vec<RawNote>>;
    fn read_note(&self, file_path: &str) -> std::io::Result<String>;
    fn write_file(&self, file_path: &str, text: &str) -> std::io::Result<()>;
    fn exists(&self, file_path: &str) -> bool;
}

/// Markdown files under a directory. Dot-entries are skipped, which keeps the
/// data directory out of the snapshot.
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Markdown files in path order. Symlinks are not followed, so a link back
    /// into the vault cannot loop and a link out of it cannot leak notes in.
    fn collect_md_files(&self) -> std::io::Result<Vec<PathBuf>> {
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension().and_then(|s| s.to_str()) == Some("md") {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

impl NoteStore for FsVault {
    fn list_notes(&self) -> std::io::Result<Vec<RawNote>> {
        let files = self.collect_md_files()?;

        let mut notes = Vec::with_capacity(files.len());
        for path in files {
            let bytes = fs::read(&path)?;
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();

            notes.push(RawNote {
                id: stem.clone(),
                title: stem,
                file_path: self.relative(&path),
                raw_text: String::from_utf8_lossy(&bytes).to_string(),
            });
        }
        Ok(notes)
    }

    fn read_note(&self, file_path: &str) -> std::io::Result<String> {
        fs::read_to_string(self.root.join(file_path))
    }

    fn write_file(&self, file_path: &str, text: &str) -> std::io::Result<()> {
        let path = self.root.join(file_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, text)
    }

    fn exists(&self, file_path: &str) -> bool {
        self.root.join(file_path).exists()
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

/// Parse every note in the store. Ids that repeat keep their first occurrence.
pub fn notes_from_store(store: &dyn NoteStore) -> std::io::Result<Vec<Note>> {
    let mut seen = std::collections::HashSet::new();
    let mut notes = Vec::new();
    for raw in store.list_notes()? {
        if !seen.insert(raw.id.clone()) {
            log::warn!("duplicate note id '{}' at {}, skipped", raw.id, raw.file_path);
            continue;
        }
        notes.push(Note::from_text(&raw.id, &raw.title, &raw.file_path, &raw.raw_text));
    }
    Ok(notes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_notes_walks_subdirs_and_skips_dot_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("topics")).unwrap();
        fs::create_dir_all(tmp.path().join(".gapfill")).unwrap();
        fs::write(tmp.path().join("Alpha.md"), "[[Beta]]").unwrap();
        fs::write(tmp.path().join("topics/Beta.md"), "beta").unwrap();
        fs::write(tmp.path().join("topics/image.png"), "png").unwrap();
        fs::write(tmp.path().join(".gapfill/Hidden.md"), "hidden").unwrap();

        let vault = FsVault::new(tmp.path());
        let notes = vault.list_notes().unwrap();

        let paths: Vec<&str> = notes.iter().map(|n| n.file_path.as_str()).collect();
        assert_eq!(paths, vec!["Alpha.md", "topics/Beta.md"]);
        assert_eq!(notes[1].id, "Beta");
        assert_eq!(notes[1].title, "Beta");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_followed() {
        let tmp = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("Alpha.md"), "alpha").unwrap();
        fs::write(outside.path().join("Stray.md"), "stray").unwrap();
        std::os::unix::fs::symlink(tmp.path(), tmp.path().join("sub/loop")).unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("external")).unwrap();
        std::os::unix::fs::symlink(
            tmp.path().join("Alpha.md"),
            tmp.path().join("sub/Linked.md"),
        )
        .unwrap();

        let notes = FsVault::new(tmp.path()).list_notes().unwrap();

        let paths: Vec<&str> = notes.iter().map(|n| n.file_path.as_str()).collect();
        assert_eq!(paths, vec!["Alpha.md"]);
    }

    #[test]
    fn test_notes_from_store_extracts_links() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("Alpha.md"), "[[Beta]] [[Gamma|g]]").unwrap();

        let notes = notes_from_store(&FsVault::new(tmp.path())).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].links, vec!["Beta", "Gamma"]);
        assert_eq!(notes[0].content.as_deref(), Some("[[Beta]] [[Gamma|g]]"));
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("b")).unwrap();
        fs::write(tmp.path().join("Same.md"), "first").unwrap();
        fs::write(tmp.path().join("b/Same.md"), "second").unwrap();

        let notes = notes_from_store(&FsVault::new(tmp.path())).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].content.as_deref(), Some("first"));
    }

    #[test]
    fn test_write_file_creates_parents() {
        let tmp = tempfile::tempdir().unwrap();
        let vault = FsVault::new(tmp.path());

        vault.write_file("bridges/New.md", "body").unwrap();
        assert!(vault.exists("bridges/New.md"));
        assert_eq!(vault.read_note("bridges/New.md").unwrap(), "body");
    }

    #[test]
    fn test_note_event_json_shape() {
        let event: NoteEvent =
            serde_json::from_str(r#"{"event":"opened","file_path":"A.md"}"#).unwrap();
        assert_eq!(event, NoteEvent::Opened("A.md".to_string()));
        assert_eq!(event.file_path(), "A.md");
    }
}
