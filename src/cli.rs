use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about = "Find gaps between note clusters and bridge them", long_about = None)]
pub struct Args {
    /// Vault directory
    #[clap(long, global = true, default_value = ".")]
    pub vault: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Embed every note and replace the stored embeddings
    Reindex,

    /// Print the connected components of the link graph
    Clusters {
        /// Only list notes with no connections
        #[clap(long, default_value = "false")]
        unconnected: bool,
    },

    /// Run the analysis for one note
    Analyze {
        /// Vault-relative path or id of the note
        file: String,
    },

    /// Run the analysis for one note and write merged bridges into the vault
    Bridges {
        /// Vault-relative path or id of the note
        file: String,
    },

    /// Remove every cached bridge result
    ClearCache,

    /// Show or set the similarity threshold saved in the vault config
    Threshold {
        /// New value between 0.0 and 1.0
        value: Option<f32>,
    },

    /// Serve the http api
    Daemon {
        #[clap(long, default_value = crate::web::DEFAULT_ADDR)]
        addr: String,
    },
}
