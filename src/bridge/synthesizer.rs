//! Turns a cluster partition into bridge notes.
//!
//! Pairs are visited in increasing `(i, j)` order and the topic pairs inside
//! a cluster pair in enumerator order, so cache keys and request order are
//! reproducible run to run.

use std::collections::{HashMap, HashSet};

use crate::bridge::cache::{pair_key, BridgeCache};
use crate::bridge::candidate::{bridge_prompt, parse_candidates, BridgeCandidate};
use crate::bridge::combinations::{pairs_of, Pairs};
use crate::graph::Cluster;
use crate::live_graph::GraphLink;
use crate::llm::{CompletionOptions, LanguageModel};
use crate::notes::Note;
use crate::notify::Notifier;
use crate::semantic::preprocess_content;

/// Bridge nodes and the links tying them to cluster representatives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BridgeBatch {
    pub nodes: Vec<Note>,
    pub links: Vec<GraphLink>,
    pub pairs_processed: usize,
    pub cache_hits: usize,
    pub requests: usize,
}

impl BridgeBatch {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

pub struct BridgeSynthesizer<'a> {
    llm: &'a dyn LanguageModel,
    cache: &'a BridgeCache,
    notifier: &'a dyn Notifier,
    options: CompletionOptions,
}

impl<'a> BridgeSynthesizer<'a> {
    pub fn new(
        llm: &'a dyn LanguageModel,
        cache: &'a BridgeCache,
        notifier: &'a dyn Notifier,
        options: CompletionOptions,
    ) -> Self {
        Self {
            llm,
            cache,
            notifier,
            options,
        }
    }

    pub fn synthesize(&self, clusters: &[Cluster], notes: &[Note]) -> BridgeBatch {
        let by_id: HashMap<&str, &Note> = notes.iter().map(|n| (n.id.as_str(), n)).collect();
        let mut seen: HashSet<String> = HashSet::new();
        let mut batch = BridgeBatch::default();
        let mut placed: HashSet<String> = HashSet::new();

        for (i, j) in Pairs::new(clusters.len()) {
            let (cluster_a, cluster_b) = (&clusters[i], &clusters[j]);
            let titles_a = cluster_titles(cluster_a, &by_id);
            let titles_b = cluster_titles(cluster_b, &by_id);
            let signature_a = signature(&titles_a);
            let signature_b = signature(&titles_b);

            if signature_a.is_empty() || signature_b.is_empty() {
                self.notifier.notice(&format!(
                    "Empty cluster found, skipping. {{clusterA: {signature_a}, clusterB: {signature_b}}}"
                ));
                continue;
            }

            if !seen.insert(seen_key(&signature_a, &signature_b)) {
                log::debug!("cluster pair ({i},{j}) already processed this run");
                continue;
            }
            batch.pairs_processed += 1;

            let key = pair_key(&signature_a, &signature_b);
            let candidates = match self.cache.get(&key) {
                Some(cached) => {
                    log::debug!("bridge cache hit for pair ({i},{j})");
                    batch.cache_hits += 1;
                    cached
                }
                None => {
                    let (fresh, requests) = self.request_bridges(&titles_a, &titles_b, notes);
                    batch.requests += requests;
                    if let Err(err) = self.cache.put(&key, &fresh) {
                        log::error!("failed to cache bridges for pair ({i},{j}): {err}");
                    }
                    fresh
                }
            };
            log::info!(
                "clusters [{signature_a}] and [{signature_b}]: {} bridge candidates",
                candidates.len()
            );

            // cluster member lists are never empty once a signature exists
            let rep_a = &cluster_a[0];
            let rep_b = &cluster_b[0];
            for candidate in candidates {
                let node = bridge_note(&candidate, rep_a, rep_b);
                for rep in [rep_a, rep_b] {
                    batch.links.push(GraphLink::new(&node.id, rep));
                }
                if placed.insert(node.id.clone()) {
                    batch.nodes.push(node);
                }
            }
        }

        batch
    }

    /// One request per topic pair across both clusters. Returns the accepted
    /// candidates and how many requests went out.
    fn request_bridges(
        &self,
        titles_a: &[&str],
        titles_b: &[&str],
        notes: &[Note],
    ) -> (Vec<BridgeCandidate>, usize) {
        let mut topics: Vec<&str> = Vec::with_capacity(titles_a.len() + titles_b.len());
        for &title in titles_a.iter().chain(titles_b.iter()) {
            if !topics.contains(&title) {
                topics.push(title);
            }
        }

        let by_title: HashMap<&str, &Note> =
            notes.iter().map(|n| (n.title.as_str(), n)).collect();

        let mut accepted = Vec::new();
        let mut requests = 0;
        for (&topic_a, &topic_b) in pairs_of(&topics) {
            let context = [topic_a, topic_b]
                .into_iter()
                .filter_map(|t| by_title.get(t))
                .filter_map(|n| n.content.as_deref().and_then(preprocess_content))
                .collect::<Vec<_>>()
                .join("\n---\n");

            let prompt = bridge_prompt(topic_a, topic_b, &context);
            let response = self.llm.complete(&prompt, &self.options);
            requests += 1;

            match parse_candidates(&response) {
                Ok(candidates) => accepted.extend(candidates),
                Err(err) => {
                    log::warn!("no bridges between '{topic_a}' and '{topic_b}': {err}");
                }
            }
        }

        (accepted, requests)
    }
}

/// Member titles in cluster order. Ids with no note (dangling references) are skipped.
/// Same key for (a, b) and (b, a).
fn seen_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}-{b}")
    } else {
        format!("{b}-{a}")
    }
}

fn cluster_titles<'n>(cluster: &Cluster, by_id: &HashMap<&str, &'n Note>) -> Vec<&'n str> {
    cluster
        .iter()
        .filter_map(|id| by_id.get(id.as_str()))
        .map(|n| n.title.as_str())
        .collect()
}

/// Sorted, comma-joined member titles.
pub fn signature(titles: &[&str]) -> String {
    let mut sorted = titles.to_vec();
    sorted.sort_unstable();
    sorted.join(", ")
}

fn bridge_note(candidate: &BridgeCandidate, rep_a: &str, rep_b: &str) -> Note {
    Note {
        id: candidate.title.clone(),
        title: candidate.title.clone(),
        file_path: String::new(),
        links: vec![rep_a.to_string(), rep_b.to_string()],
        content: None,
        is_bridge: true,
        wiki_url: Some(candidate.link.clone()),
        summary: candidate.summary.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedModel;
    use crate::notify::recording::RecordingNotifier;
    use crate::storage::BackendLocal;
    use std::sync::Arc;

    const GRAPH_THEORY: &str =
        r#"[{"title": "Graph Theory", "link": "https://en.wikipedia.org/wiki/Graph_theory"}]"#;

    fn options() -> CompletionOptions {
        CompletionOptions {
            model: "test".to_string(),
            temperature: 0.0,
        }
    }

    fn note(id: &str) -> Note {
        Note::from_text(id, id, &format!("{id}.md"), &format!("about {id}"))
    }

    fn clusters(raw: &[&[&str]]) -> Vec<Cluster> {
        raw.iter()
            .map(|c| c.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    fn cache() -> (BridgeCache, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(BackendLocal::new(tmp.path()).unwrap());
        (BridgeCache::new(store), tmp)
    }

    #[test]
    fn test_signature_sorted() {
        assert_eq!(signature(&["b", "a", "c"]), "a, b, c");
        assert_eq!(signature(&[]), "");
    }

    #[test]
    fn test_one_request_per_topic_pair() {
        let (cache, _tmp) = cache();
        let llm = ScriptedModel::new().with_default_response("[]");
        let notifier = RecordingNotifier::default();
        let synth = BridgeSynthesizer::new(&llm, &cache, &notifier, options());

        let notes = vec![note("A"), note("B"), note("C")];
        let batch = synth.synthesize(&clusters(&[&["A", "B"], &["C"]]), &notes);

        // topics {A,B,C} -> AB, AC, BC
        assert_eq!(batch.requests, 3);
        assert_eq!(llm.completion_calls(), 3);
        let prompts = llm.prompts();
        assert!(prompts[0].contains("Topic A: A") && prompts[0].contains("Topic B: B"));
        assert!(prompts[1].contains("Topic A: A") && prompts[1].contains("Topic B: C"));
        assert!(prompts[2].contains("Topic A: B") && prompts[2].contains("Topic B: C"));
        assert!(prompts[0].contains("about A"));
        assert!(batch.is_empty());
    }

    #[test]
    fn test_bridge_nodes_link_representatives() {
        let (cache, _tmp) = cache();
        let llm = ScriptedModel::new()
            .with_response(GRAPH_THEORY)
            .with_default_response("NO BRIDGE");
        let notifier = RecordingNotifier::default();
        let synth = BridgeSynthesizer::new(&llm, &cache, &notifier, options());

        let notes = vec![note("Note1"), note("Note2"), note("Note3")];
        let batch = synth.synthesize(&clusters(&[&["Note2", "Note1"], &["Note3"]]), &notes);

        assert_eq!(batch.nodes.len(), 1);
        let bridge = &batch.nodes[0];
        assert!(bridge.is_bridge);
        assert_eq!(bridge.id, "Graph Theory");
        assert_eq!(bridge.links, vec!["Note2", "Note3"]);
        assert_eq!(
            bridge.wiki_url.as_deref(),
            Some("https://en.wikipedia.org/wiki/Graph_theory")
        );
        assert_eq!(
            batch.links,
            vec![
                GraphLink::new("Graph Theory", "Note2"),
                GraphLink::new("Graph Theory", "Note3")
            ]
        );
    }

    #[test]
    fn test_second_run_uses_cache() {
        let (cache, _tmp) = cache();
        let notes = vec![note("Note1"), note("Note2"), note("Note3")];
        let parts = clusters(&[&["Note1", "Note2"], &["Note3"]]);
        let notifier = RecordingNotifier::default();

        let first_llm = ScriptedModel::new()
            .with_response(GRAPH_THEORY)
            .with_default_response("[]");
        let first = BridgeSynthesizer::new(&first_llm, &cache, &notifier, options())
            .synthesize(&parts, &notes);
        assert_eq!(first.cache_hits, 0);
        assert_eq!(first_llm.completion_calls(), 3);

        let second_llm = ScriptedModel::new().with_default_response("[]");
        let second = BridgeSynthesizer::new(&second_llm, &cache, &notifier, options())
            .synthesize(&parts, &notes);
        assert_eq!(second.cache_hits, 1);
        assert_eq!(second_llm.completion_calls(), 0);
        assert_eq!(second.nodes, first.nodes);
    }

    #[test]
    fn test_failed_parse_is_cached_too() {
        let (cache, _tmp) = cache();
        let notes = vec![note("X"), note("Y")];
        let parts = clusters(&[&["X"], &["Y"]]);
        let notifier = RecordingNotifier::default();

        let llm = ScriptedModel::new().with_default_response("sorry, I can't");
        let batch = BridgeSynthesizer::new(&llm, &cache, &notifier, options())
            .synthesize(&parts, &notes);
        assert!(batch.is_empty());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&pair_key("X", "Y")), Some(vec![]));
    }

    #[test]
    fn test_seen_pairs_skipped_within_run() {
        let (cache, _tmp) = cache();
        let llm = ScriptedModel::new().with_default_response("[]");
        let notifier = RecordingNotifier::default();
        let synth = BridgeSynthesizer::new(&llm, &cache, &notifier, options());

        let notes = vec![note("A"), note("B")];
        // same membership appearing twice gives the same signatures
        let parts = clusters(&[&["A"], &["B"], &["B"]]);
        let batch = synth.synthesize(&parts, &notes);

        // (0,1) and (0,2) share a signature; (1,2) is B-B
        assert_eq!(batch.pairs_processed, 2);
        assert_eq!(batch.requests, 1);
    }

    #[test]
    fn test_reversed_pair_counts_as_seen() {
        let (cache, _tmp) = cache();
        let llm = ScriptedModel::new().with_default_response("[]");
        let notifier = RecordingNotifier::default();
        let synth = BridgeSynthesizer::new(&llm, &cache, &notifier, options());

        let notes = vec![note("A"), note("B")];
        // (0,1) is B-A, (1,2) is A-B again in the other order
        let parts = clusters(&[&["B"], &["A"], &["B"]]);
        let batch = synth.synthesize(&parts, &notes);

        assert_eq!(batch.pairs_processed, 2);
        assert_eq!(llm.completion_calls(), 1);
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&pair_key("B", "A")).is_some());
        assert!(cache.get(&pair_key("A", "B")).is_none());
    }

    #[test]
    fn test_dangling_only_cluster_is_skipped_with_notice() {
        let (cache, _tmp) = cache();
        let llm = ScriptedModel::new().with_default_response("[]");
        let notifier = RecordingNotifier::default();
        let synth = BridgeSynthesizer::new(&llm, &cache, &notifier, options());

        let notes = vec![note("A")];
        let batch = synth.synthesize(&clusters(&[&["A"], &["Ghost"]]), &notes);

        assert_eq!(batch.pairs_processed, 0);
        assert_eq!(llm.completion_calls(), 0);
        assert!(notifier.messages()[0].starts_with("Empty cluster found"));
    }

    #[test]
    fn test_duplicate_bridge_titles_collapse() {
        let (cache, _tmp) = cache();
        let llm = ScriptedModel::new().with_default_response(GRAPH_THEORY);
        let notifier = RecordingNotifier::default();
        let synth = BridgeSynthesizer::new(&llm, &cache, &notifier, options());

        let notes = vec![note("A"), note("B"), note("C")];
        let batch = synth.synthesize(&clusters(&[&["A"], &["B"], &["C"]]), &notes);

        assert_eq!(batch.nodes.len(), 1);
        // one link pair per cluster pair: (A,B) (A,C) (B,C)
        assert_eq!(batch.links.len(), 6);
    }
}
