//! Similarity expansion and greedy clustering over embeddings.

use std::collections::HashSet;

use crate::graph::Cluster;
use crate::notes::Note;
use crate::semantic::index::SimilarityLookup;

/// The bounded neighborhood of a seed note.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShallowGraph {
    /// Included notes, in collection order
    pub notes: Vec<Note>,
    /// Ordered `(a, b)` pairs at or above threshold, both directions listed
    pub links: Vec<(String, String)>,
}

/// Collect notes within `depth` similarity hops of `seed_id`.
///
/// Runs exactly `depth` rounds. An empty frontier makes the remaining rounds
/// no-ops. Notes without an embedding are neither sources nor targets.
pub fn expand_by_similarity<S: SimilarityLookup>(
    seed_id: &str,
    notes: &[Note],
    lookup: &S,
    threshold: f32,
    depth: usize,
) -> ShallowGraph {
    let mut included: HashSet<&str> = HashSet::from([seed_id]);
    let mut frontier: Vec<&str> = vec![seed_id];

    for round in 0..depth {
        let mut next: Vec<&str> = Vec::new();
        for &source in &frontier {
            for candidate in notes {
                let target = candidate.id.as_str();
                if included.contains(target) || next.contains(&target) {
                    continue;
                }
                match lookup.similarity(source, target) {
                    Some(sim) if sim >= threshold => next.push(target),
                    _ => {}
                }
            }
        }
        log::debug!("similarity round {}: {} new notes", round + 1, next.len());

        included.extend(next.iter().copied());
        frontier = next;
    }

    let shallow: Vec<Note> = notes
        .iter()
        .filter(|n| included.contains(n.id.as_str()))
        .cloned()
        .collect();
    let links = similarity_links(&shallow, lookup, threshold);

    ShallowGraph {
        notes: shallow,
        links,
    }
}

/// Every ordered pair of distinct notes at or above threshold.
pub fn similarity_links<S: SimilarityLookup>(
    notes: &[Note],
    lookup: &S,
    threshold: f32,
) -> Vec<(String, String)> {
    let mut links = Vec::new();
    for a in notes {
        for b in notes {
            if a.id == b.id {
                continue;
            }
            if let Some(sim) = lookup.similarity(&a.id, &b.id) {
                if sim >= threshold {
                    links.push((a.id.clone(), b.id.clone()));
                }
            }
        }
    }
    links
}

/// Single pass, seed-anchored clustering.
///
/// Each unassigned note in collection order opens a cluster and pulls in every
/// later unassigned note whose similarity to that seed (not to the other
/// members) reaches the threshold. The result depends on input order.
pub fn cluster_by_similarity<S: SimilarityLookup>(
    notes: &[Note],
    lookup: &S,
    threshold: f32,
) -> Vec<Cluster> {
    let mut assigned = vec![false; notes.len()];
    let mut clusters = Vec::new();

    for (i, seed) in notes.iter().enumerate() {
        if assigned[i] {
            continue;
        }
        assigned[i] = true;
        let mut cluster = vec![seed.id.clone()];

        for (j, other) in notes.iter().enumerate().skip(i + 1) {
            if assigned[j] {
                continue;
            }
            if let Some(sim) = lookup.similarity(&seed.id, &other.id) {
                if sim >= threshold {
                    assigned[j] = true;
                    cluster.push(other.id.clone());
                }
            }
        }

        clusters.push(cluster);
    }

    clusters
}
