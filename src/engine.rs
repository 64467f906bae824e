//! The analysis pipeline: seed note → clusters → bridges → live graph.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard};

use anyhow::{bail, Context};
use serde::Serialize;

use crate::bridge::{BridgeCache, BridgeSynthesizer};
use crate::config::{ClusterStrategy, Config};
use crate::coordinator::{RunCoordinator, RunState, RunToken};
use crate::graph::{self, Cluster, NoteGraph};
use crate::live_graph::{GraphLink, GraphSnapshot, LiveGraph};
use crate::llm::{CompletionOptions, HttpLanguageModel, LanguageModel};
use crate::notes::{resolved_links, Note};
use crate::notify::{LogNotifier, Notifier};
use crate::semantic::{cluster_by_similarity, expand_by_similarity, EmbeddingCache};
use crate::storage::{BackendLocal, StorageManager};
use crate::vault::{notes_from_store, FsVault, NoteEvent, NoteStore};

const EMBEDDINGS_DIR: &str = "embeddings";
const BRIDGE_CACHE_DIR: &str = "bridge-cache";
pub const SNAPSHOT_FILE_NAME: &str = "graph.json";

const BRIDGE_TAG: &str = "#aigenerated";
const BRIDGE_TITLE_PREFIX: &str = "bridge topic";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    NoteNotFound,
    /// Same note and threshold as the last or the in-flight run
    Skipped,
    TooFewClusters,
    /// A newer run started before this one could draw or merge
    Superseded,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub note_id: Option<String>,
    pub clusters: usize,
    pub bridges_added: Vec<String>,
    pub notes_written: Vec<String>,
}

impl RunReport {
    fn new(status: RunStatus, note_id: Option<&str>) -> Self {
        Self {
            status,
            note_id: note_id.map(str::to_string),
            clusters: 0,
            bridges_added: Vec::new(),
            notes_written: Vec::new(),
        }
    }
}

pub struct GapFiller {
    config: RwLock<Config>,
    notes: Arc<dyn NoteStore>,
    llm: Arc<dyn LanguageModel>,
    notifier: Arc<dyn Notifier>,
    embeddings: EmbeddingCache,
    bridges: BridgeCache,
    data: Arc<dyn StorageManager>,
    graph: Mutex<LiveGraph>,
    coordinator: RunCoordinator,
}

impl GapFiller {
    /// Everything rooted in `config.base_path()`, the vault's data directory.
    pub fn new(
        config: Config,
        notes: Arc<dyn NoteStore>,
        llm: Arc<dyn LanguageModel>,
        notifier: Arc<dyn Notifier>,
    ) -> anyhow::Result<Self> {
        let base = config.base_path().to_path_buf();
        let data = Arc::new(BackendLocal::new(&base)?);
        let embeddings = Arc::new(
            BackendLocal::new(base.join(EMBEDDINGS_DIR))
                .context("failed to create embeddings directory")?,
        );
        let bridges = Arc::new(
            BackendLocal::new(base.join(BRIDGE_CACHE_DIR))
                .context("failed to create bridge cache directory")?,
        );

        let bridges = BridgeCache::new(bridges);
        log::debug!("{} cached bridge pairs", bridges.len());

        Ok(Self {
            config: RwLock::new(config),
            notes,
            llm,
            notifier,
            embeddings: EmbeddingCache::new(embeddings),
            bridges,
            data,
            graph: Mutex::new(LiveGraph::new()),
            coordinator: RunCoordinator::new(),
        })
    }

    /// Wire up the filesystem vault, the HTTP model and log notices for `vault`.
    pub fn open(vault: &Path) -> anyhow::Result<Self> {
        let config = Config::load_with(&Config::data_dir(vault))?;
        let llm = HttpLanguageModel::new(&config.llm).context("failed to build llm client")?;
        Self::new(
            config,
            Arc::new(FsVault::new(vault)),
            Arc::new(llm),
            Arc::new(LogNotifier),
        )
    }

    pub fn handle_event(&self, event: &NoteEvent) -> anyhow::Result<RunReport> {
        log::debug!("note event: {event:?}");
        let write_notes = self.config().write_bridge_notes;
        self.run(event.file_path(), write_notes)
    }

    /// Explicit analysis of one note. `force` skips the repeat check.
    pub fn analyze(&self, file_path: &str, force: bool) -> anyhow::Result<RunReport> {
        if force {
            self.coordinator.reset();
        }
        let write_notes = self.config().write_bridge_notes;
        self.run(file_path, write_notes)
    }

    /// Forced analysis that always writes merged bridges into the vault.
    pub fn write_bridges(&self, file_path: &str) -> anyhow::Result<RunReport> {
        self.coordinator.reset();
        self.run(file_path, true)
    }

    fn run(&self, file_path: &str, write_notes: bool) -> anyhow::Result<RunReport> {
        let notes = notes_from_store(self.notes.as_ref()).context("failed to list notes")?;

        let Some(seed) = notes
            .iter()
            .find(|n| n.file_path == file_path || n.id == file_path)
        else {
            log::info!("no note matches '{file_path}'");
            self.notifier.notice("Active note not found");
            return Ok(RunReport::new(RunStatus::NoteNotFound, None));
        };

        let threshold = self.config().similarity_threshold;
        let Some(token) = self.coordinator.begin(&seed.id, threshold) else {
            return Ok(RunReport::new(RunStatus::Skipped, Some(&seed.id)));
        };
        log::info!("run {} for '{}'", token.generation(), token.note_id());

        let report = self.run_with_token(&token, seed, &notes, write_notes);
        self.coordinator.complete(&token);
        Ok(report)
    }

    fn run_with_token(
        &self,
        token: &RunToken,
        seed: &Note,
        notes: &[Note],
        write_notes: bool,
    ) -> RunReport {
        let config = self.config().clone();
        let mut report = RunReport::new(RunStatus::Completed, Some(&seed.id));

        let clusters = match config.strategy {
            ClusterStrategy::Similarity => self.similarity_clusters(token, seed, notes, &config),
            ClusterStrategy::Structural => {
                let links = resolved_links(notes).into_iter().map(GraphLink::from).collect();
                self.draw_if_current(token, notes.to_vec(), links)
                    .then(|| graph::find_clusters_from_subgraph(notes))
            }
        };
        let Some(clusters) = clusters else {
            report.status = RunStatus::Superseded;
            return report;
        };
        report.clusters = clusters.len();

        if clusters.len() < 2 {
            log::info!("{} cluster(s) around '{}'", clusters.len(), seed.id);
            self.notifier
                .notice("No clusters found or only one cluster present.");
            report.status = RunStatus::TooFewClusters;
            return report;
        }

        let options = CompletionOptions {
            model: config.llm.completion_model.clone(),
            temperature: config.llm.temperature,
        };
        let mut batch = BridgeSynthesizer::new(
            self.llm.as_ref(),
            &self.bridges,
            self.notifier.as_ref(),
            options,
        )
        .synthesize(&clusters, notes);
        log::debug!(
            "{} pairs, {} cache hits, {} requests",
            batch.pairs_processed,
            batch.cache_hits,
            batch.requests
        );

        let merged = {
            let mut live = self.live_graph();
            if !self.coordinator.is_current(token) {
                log::debug!("run {} superseded, dropping merge", token.generation());
                report.status = RunStatus::Superseded;
                return report;
            }
            let merged = live.add_nodes_and_links(batch.nodes.clone(), std::mem::take(&mut batch.links));
            log::debug!(
                "live graph now has {} nodes and {} links",
                live.node_count(),
                live.link_count()
            );
            merged
        };

        let added: Vec<&Note> = batch
            .nodes
            .iter()
            .filter(|n| merged.added_nodes.contains(&n.id))
            .collect();
        if write_notes {
            report.notes_written = self.write_bridge_notes(&config.bridge_folder, &added, notes);
        }
        report.bridges_added = merged.added_nodes;

        if batch.is_empty() {
            self.notifier.notice("No bridge found between clusters.");
        } else {
            self.notifier.notice(&format!(
                "Bridge notes created: {} ({} new)",
                batch.nodes.len(),
                report.bridges_added.len()
            ));
        }

        report
    }

    /// Replace the live graph unless a newer run has started. The check and
    /// the draw happen under the same lock as the merge.
    fn draw_if_current(&self, token: &RunToken, nodes: Vec<Note>, links: Vec<GraphLink>) -> bool {
        let mut live = self.live_graph();
        if !self.coordinator.is_current(token) {
            log::debug!("run {} superseded, dropping draw", token.generation());
            return false;
        }
        live.draw_graph(nodes, links);
        true
    }

    /// `None` when the run was superseded before it could draw.
    fn similarity_clusters(
        &self,
        token: &RunToken,
        seed: &Note,
        notes: &[Note],
        config: &Config,
    ) -> Option<Vec<Cluster>> {
        let threshold = token.threshold();
        let depth = config.depth;

        let result = self.embeddings.with_index(|index| {
            if !index.contains(&seed.id) {
                return None;
            }
            let shallow = expand_by_similarity(&seed.id, notes, index, threshold, depth);
            let clusters = cluster_by_similarity(&shallow.notes, index, threshold);
            Some((shallow, clusters))
        });

        match result {
            Ok(Some((shallow, clusters))) => {
                let links = shallow.links.into_iter().map(GraphLink::from).collect();
                self.draw_if_current(token, shallow.notes, links)
                    .then_some(clusters)
            }
            Ok(None) => {
                log::info!("no embedding for '{}'", seed.id);
                self.notifier
                    .notice("No embedding for the active note. Reindex embeddings first.");
                Some(Vec::new())
            }
            Err(err) => {
                log::error!("embedding cache unavailable: {err}");
                self.notifier
                    .notice(&format!("Failed to load embeddings: {err}"));
                Some(Vec::new())
            }
        }
    }

    /// Write each bridge as a markdown note. Existing files are left alone.
    fn write_bridge_notes(&self, folder: &str, bridges: &[&Note], notes: &[Note]) -> Vec<String> {
        let folder = folder.trim_matches('/');
        let title_of = |id: &str| {
            notes
                .iter()
                .find(|n| n.id == id)
                .map(|n| n.title.clone())
                .unwrap_or_else(|| id.to_string())
        };

        let mut written = Vec::new();
        for bridge in bridges {
            let name = format!("{}.md", bridge_file_stem(&bridge.title));
            let path = if folder.is_empty() {
                name
            } else {
                format!("{folder}/{name}")
            };
            if self.notes.exists(&path) {
                log::info!("{path} already exists, not overwritten");
                continue;
            }

            let body = bridge_note_body(bridge, &title_of);
            match self.notes.write_file(&path, &body) {
                Ok(()) => written.push(path),
                Err(err) => log::error!("failed to write {path}: {err}"),
            }
        }
        written
    }

    /// Embed every note and replace the stored embeddings.
    pub fn reindex_embeddings(&self, show_progress: bool) -> anyhow::Result<usize> {
        let notes = notes_from_store(self.notes.as_ref()).context("failed to list notes")?;
        let count = self
            .embeddings
            .reindex(&notes, self.llm.as_ref(), show_progress)?;
        self.notifier.notice("Embeddings reindexed for all notes.");
        Ok(count)
    }

    /// Drop the in-memory embeddings so the next run reads the store again.
    /// Returns whether anything was loaded.
    pub fn reload_embeddings(&self) -> bool {
        let was_loaded = self.embeddings.is_loaded();
        self.embeddings.invalidate();
        was_loaded
    }

    /// Connected components of the full authored-link graph.
    pub fn clusters(&self) -> anyhow::Result<Vec<Cluster>> {
        let notes = notes_from_store(self.notes.as_ref()).context("failed to list notes")?;
        let graph = NoteGraph::build(&notes);
        log::debug!("{} nodes in note graph", graph.len());
        Ok(graph.find_clusters())
    }

    /// Notes with no connections at all.
    pub fn gaps(&self) -> anyhow::Result<Vec<String>> {
        let notes = notes_from_store(self.notes.as_ref()).context("failed to list notes")?;
        Ok(graph::gaps(&notes))
    }

    pub fn clear_bridge_cache(&self) -> anyhow::Result<usize> {
        let removed = self
            .bridges
            .clear()
            .context("failed to clear bridge cache")?;
        log::info!("removed {removed} cached bridge pairs");
        Ok(removed)
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        let view = self.config().view.clone();
        self.live_graph().snapshot(&view)
    }

    pub fn similarity_threshold(&self) -> f32 {
        self.config().similarity_threshold
    }

    /// Validate and persist a new threshold. The next trigger for any note,
    /// including the last processed one, runs again.
    pub fn set_similarity_threshold(&self, threshold: f32) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&threshold) {
            bail!("similarity_threshold must be between 0.0 and 1.0, got {threshold}");
        }

        let mut config = self.config.write().unwrap_or_else(|e| e.into_inner());
        let mut updated = config.clone();
        updated.similarity_threshold = threshold;
        updated.save().context("failed to save config")?;
        *config = updated;

        log::info!("similarity threshold set to {threshold}");
        Ok(())
    }

    pub fn set_filter(&self, filter: &str) {
        self.live_graph().set_node_filter(filter);
    }

    pub fn run_state(&self) -> RunState {
        self.coordinator.state()
    }

    /// Write the current snapshot to `graph.json` in the data directory.
    pub fn save_snapshot(&self) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.snapshot())?;
        self.data.write(SNAPSHOT_FILE_NAME, &bytes)?;
        Ok(())
    }

    fn config(&self) -> RwLockReadGuard<'_, Config> {
        self.config.read().unwrap_or_else(|e| e.into_inner())
    }

    fn live_graph(&self) -> MutexGuard<'_, LiveGraph> {
        self.graph.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// File name for a bridge title, without extension.
pub fn bridge_file_stem(title: &str) -> String {
    let mut title = title.trim();
    if title.len() >= BRIDGE_TITLE_PREFIX.len()
        && title.is_char_boundary(BRIDGE_TITLE_PREFIX.len())
        && title[..BRIDGE_TITLE_PREFIX.len()].eq_ignore_ascii_case(BRIDGE_TITLE_PREFIX)
    {
        title = title[BRIDGE_TITLE_PREFIX.len()..].trim_start_matches([':', '-', ' ']);
    }

    let mut stem = String::with_capacity(title.len());
    for c in title.chars() {
        let c = match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        };
        if c == '_' && stem.ends_with('_') {
            continue;
        }
        stem.push(c);
    }

    let stem = stem.trim();
    if stem.is_empty() {
        "bridge".to_string()
    } else {
        stem.to_string()
    }
}

fn bridge_note_body(bridge: &Note, title_of: &dyn Fn(&str) -> String) -> String {
    let summary = bridge.summary.as_deref().unwrap_or(&bridge.title);
    let url = bridge.wiki_url.as_deref().unwrap_or_default();
    let mut body = format!("{BRIDGE_TAG}\n\n{summary}\n\n{url}\n\n");
    for rep in &bridge.links {
        body.push_str(&format!("[[{}]]\n", title_of(rep)));
    }
    body
}
