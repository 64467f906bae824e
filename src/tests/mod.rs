use std::sync::Arc;

use crate::config::Config;
use crate::engine::GapFiller;
use crate::llm::LanguageModel;
use crate::notify::recording::RecordingNotifier;
use crate::vault::FsVault;


pub const GRAPH_THEORY: &str =
    r#"[{"title": "Graph Theory", "link": "http://en.wikipedia.org/wiki/Graph_theory"}]"#;

/// Isolated vault with `files` written into it and an engine over it.
/// Every test gets its own directory so parallel tests never collide.
pub fn create_filler(
    files: &[(&str, &str)],
    llm: Arc<dyn LanguageModel>,
    configure: impl FnOnce(&mut Config),
) -> (Arc<GapFiller>, Arc<RecordingNotifier>, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    for (path, text) in files {
        let path = tmp.path().join(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, text).unwrap();
    }

    let mut config =
        Config::load_with(&Config::data_dir(tmp.path())).expect("failed to load config");
    configure(&mut config);

    let notifier = Arc::new(RecordingNotifier::default());
    let filler = GapFiller::new(
        config,
        Arc::new(FsVault::new(tmp.path())),
        llm,
        notifier.clone(),
    )
    .expect("failed to create engine");

    (Arc::new(filler), notifier, tmp)
}

/// Two components: `Note1 - Note2` and `Note3` alone.
pub fn two_cluster_vault() -> Vec<(&'static str, &'static str)> {
    vec![
        ("Note1.md", "first note, see [[Note2]]"),
        ("Note2.md", "second note"),
        ("Note3.md", "third note"),
    ]
}
