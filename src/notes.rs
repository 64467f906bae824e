use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// `[[Target]]` or `[[Target|Alias]]`. Group 1 is the target.
static WIKI_LINK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\[([^\[\]|]+)(\|[^\[\]]*)?\]\]").expect("wiki link regex is valid")
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub file_path: String,

    /// Referenced titles in authoring order, duplicates kept
    #[serde(default)]
    pub links: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_bridge: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wiki_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl Note {
    /// A regular note parsed from raw text.
    pub fn from_text(id: &str, title: &str, file_path: &str, text: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            file_path: file_path.to_string(),
            links: extract_links(text),
            content: Some(text.to_string()),
            ..Default::default()
        }
    }
}

/// Referenced titles in the order they appear. Aliases are dropped.
pub fn extract_links(text: &str) -> Vec<String> {
    WIKI_LINK_REGEX
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|target| target.as_str().to_string())
        .collect()
}

/// Resolves link titles to note ids within one snapshot.
pub struct TitleIndex<'a> {
    by_title: HashMap<&'a str, &'a str>,
}

impl<'a> TitleIndex<'a> {
    pub fn new(notes: &'a [Note]) -> Self {
        let mut by_title = HashMap::with_capacity(notes.len());
        for note in notes {
            // first note wins on duplicate titles
            by_title.entry(note.title.as_str()).or_insert(note.id.as_str());
        }
        Self { by_title }
    }

    /// Id of the note titled `title`, if it is part of the snapshot.
    pub fn resolve(&self, title: &str) -> Option<&'a str> {
        self.by_title.get(title).copied()
    }
}

/// Directed `[source, target]` pairs for authored links whose target is in the snapshot.
pub fn resolved_links(notes: &[Note]) -> Vec<(String, String)> {
    let index = TitleIndex::new(notes);
    let mut links = Vec::new();
    for note in notes {
        for link in &note.links {
            if let Some(target) = index.resolve(link) {
                links.push((note.id.clone(), target.to_string()));
            }
        }
    }
    links
}
