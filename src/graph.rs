//! Structural note graph.
//!
//! Authored links are treated as undirected edges. Nodes live in an
//! insertion-ordered arena so traversal order only depends on the order the
//! notes were handed in.

use std::collections::HashMap;

use crate::notes::{Note, TitleIndex};

/// A cluster is an ordered list of unique note ids.
pub type Cluster = Vec<String>;

#[derive(Debug, Default, Clone)]
pub struct NoteGraph {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    /// Neighbor slots per node, in first-seen order, no duplicates
    adjacency: Vec<Vec<usize>>,
}

impl NoteGraph {
    /// Build the symmetric graph over `notes`.
    ///
    /// Link targets that are not part of `notes` still become nodes, so
    /// dangling references show up as content-less members of a cluster.
    pub fn build(notes: &[Note]) -> Self {
        let titles = TitleIndex::new(notes);
        let mut graph = Self::default();

        for note in notes {
            let source = graph.ensure_node(&note.id);
            for link in &note.links {
                let target_id = titles.resolve(link).unwrap_or(link.as_str());
                let target = graph.ensure_node(target_id);
                graph.connect(source, target);
            }
        }

        graph
    }

    /// Build the graph over a subset only. Links leaving the subset are dropped.
    pub fn build_subgraph(notes: &[Note]) -> Self {
        let titles = TitleIndex::new(notes);
        let mut graph = Self::default();

        for note in notes {
            graph.ensure_node(&note.id);
        }
        for note in notes {
            let source = graph.index[&note.id];
            for link in &note.links {
                if let Some(target_id) = titles.resolve(link) {
                    let target = graph.index[target_id];
                    graph.connect(source, target);
                }
            }
        }

        graph
    }

    fn ensure_node(&mut self, id: &str) -> usize {
        if let Some(&slot) = self.index.get(id) {
            return slot;
        }
        let slot = self.ids.len();
        self.ids.push(id.to_string());
        self.index.insert(id.to_string(), slot);
        self.adjacency.push(Vec::new());
        slot
    }

    fn connect(&mut self, a: usize, b: usize) {
        // a note linking to itself is not a connection
        if a == b {
            return;
        }
        if !self.adjacency[a].contains(&b) {
            self.adjacency[a].push(b);
        }
        if !self.adjacency[b].contains(&a) {
            self.adjacency[b].push(a);
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[cfg(test)]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Neighbor ids of `id`, empty for unknown ids.
    #[cfg(test)]
    pub fn neighbors(&self, id: &str) -> Vec<&str> {
        self.index
            .get(id)
            .map(|&slot| {
                self.adjacency[slot]
                    .iter()
                    .map(|&n| self.ids[n].as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Connected components, one depth-first traversal per unvisited node.
    ///
    /// Members are listed in discovery order. Every node appears in exactly
    /// one cluster.
    pub fn find_clusters(&self) -> Vec<Cluster> {
        let mut visited = vec![false; self.ids.len()];
        let mut clusters = Vec::new();

        for start in 0..self.ids.len() {
            if visited[start] {
                continue;
            }

            let mut cluster = Vec::new();
            let mut stack = vec![start];
            while let Some(slot) = stack.pop() {
                if visited[slot] {
                    continue;
                }
                visited[slot] = true;
                cluster.push(self.ids[slot].clone());

                // reversed so the first neighbor is explored first
                for &next in self.adjacency[slot].iter().rev() {
                    if !visited[next] {
                        stack.push(next);
                    }
                }
            }
            clusters.push(cluster);
        }

        clusters
    }

    /// Nodes with no neighbors.
    pub fn find_unconnected_nodes(&self) -> Vec<String> {
        self.adjacency
            .iter()
            .enumerate()
            .filter(|(_, neighbors)| neighbors.is_empty())
            .map(|(slot, _)| self.ids[slot].clone())
            .collect()
    }
}

/// Components of `notes` alone, ignoring links that leave the subset.
pub fn find_clusters_from_subgraph(notes: &[Note]) -> Vec<Cluster> {
    NoteGraph::build_subgraph(notes).find_clusters()
}

/// Ids of notes with no links in or out.
///
/// Dangling targets always have the note that references them as a
/// neighbor, so only real notes can show up here.
pub fn gaps(notes: &[Note]) -> Vec<String> {
    NoteGraph::build(notes).find_unconnected_nodes()
}
