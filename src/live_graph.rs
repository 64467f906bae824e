//! The node/edge set currently shown to the renderer.
//!
//! Merges are accretive: nodes are never replaced, only added, and a link is
//! kept only while both of its endpoints are present.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::ViewConfig;
use crate::notes::Note;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
}

impl GraphLink {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
        }
    }
}

impl From<(String, String)> for GraphLink {
    fn from((source, target): (String, String)) -> Self {
        Self { source, target }
    }
}

/// What a merge actually changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    pub added_nodes: Vec<String>,
    pub added_links: usize,
}

/// Everything the renderer needs to draw the current state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<Note>,
    pub links: Vec<GraphLink>,
    pub filter: Option<String>,
    pub view: ViewConfig,
}

#[derive(Debug, Default)]
pub struct LiveGraph {
    nodes: Vec<Note>,
    ids: HashSet<String>,
    links: Vec<GraphLink>,
    link_set: HashSet<GraphLink>,
    filter: Option<String>,
}

impl LiveGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole graph.
    pub fn draw_graph(&mut self, nodes: Vec<Note>, links: Vec<GraphLink>) {
        self.nodes.clear();
        self.ids.clear();
        self.links.clear();
        self.link_set.clear();
        self.add_nodes_and_links(nodes, links);
    }

    /// Append unseen nodes, then every new link whose endpoints both exist.
    ///
    /// Calling it again with the same arguments changes nothing.
    pub fn add_nodes_and_links(&mut self, nodes: Vec<Note>, links: Vec<GraphLink>) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        for mut node in nodes {
            if self.ids.contains(&node.id) {
                continue;
            }
            // the renderer never needs note bodies
            node.content = None;
            self.ids.insert(node.id.clone());
            outcome.added_nodes.push(node.id.clone());
            self.nodes.push(node);
        }

        for link in links {
            if !self.ids.contains(&link.source) || !self.ids.contains(&link.target) {
                log::debug!("dropping link {} -> {}: unknown endpoint", link.source, link.target);
                continue;
            }
            if self.link_set.insert(link.clone()) {
                self.links.push(link);
                outcome.added_links += 1;
            }
        }

        outcome
    }

    /// Case-insensitive title substring. Empty clears the filter.
    pub fn set_node_filter(&mut self, filter: &str) {
        let filter = filter.trim();
        self.filter = (!filter.is_empty()).then(|| filter.to_lowercase());
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn snapshot(&self, view: &ViewConfig) -> GraphSnapshot {
        let visible: Vec<Note> = self
            .nodes
            .iter()
            .filter(|n| match &self.filter {
                Some(filter) => n.title.to_lowercase().contains(filter),
                None => true,
            })
            .cloned()
            .collect();
        let visible_ids: HashSet<&str> = visible.iter().map(|n| n.id.as_str()).collect();
        let links = self
            .links
            .iter()
            .filter(|l| visible_ids.contains(l.source.as_str()) && visible_ids.contains(l.target.as_str()))
            .cloned()
            .collect();

        GraphSnapshot {
            nodes: visible,
            links,
            filter: self.filter.clone(),
            view: view.clone(),
        }
    }
}
