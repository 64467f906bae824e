use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod bridge;
mod cli;
mod config;
mod coordinator;
mod engine;
mod graph;
mod live_graph;
mod llm;
mod notes;
mod notify;
mod semantic;
mod storage;
#[cfg(test)]
mod tests;
mod vault;
mod web;

use cli::Command;
use engine::{GapFiller, RunReport};

fn print_report(report: &RunReport) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = cli::Args::parse();
    let vault = args
        .vault
        .canonicalize()
        .with_context(|| format!("vault {} not found", args.vault.display()))?;

    let filler = GapFiller::open(&vault)?;

    match args.command {
        Command::Reindex => {
            let count = filler.reindex_embeddings(true)?;
            println!("{count} notes embedded");
        }

        Command::Clusters { unconnected } => {
            if unconnected {
                println!("{}", serde_json::to_string_pretty(&filler.gaps()?)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&filler.clusters()?)?);
            }
        }

        Command::Analyze { file } => {
            let report = filler.analyze(&file, true)?;
            filler.save_snapshot()?;
            print_report(&report)?;
        }

        Command::Bridges { file } => {
            let report = filler.write_bridges(&file)?;
            filler.save_snapshot()?;
            print_report(&report)?;
        }

        Command::ClearCache => {
            let removed = filler.clear_bridge_cache()?;
            println!("{removed} cached pairs removed");
        }

        Command::Threshold { value } => {
            if let Some(value) = value {
                filler.set_similarity_threshold(value)?;
            }
            println!("{}", filler.similarity_threshold());
        }

        Command::Daemon { addr } => {
            web::start_daemon(filler, &addr)?;
        }
    }

    Ok(())
}
