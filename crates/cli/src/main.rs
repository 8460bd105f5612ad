//! libcirc-replay: run a circulation script and print the resulting state.

mod script;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;

use libcirc_circulation::{CirculationPolicy, CirculationSnapshot};

use crate::script::{Outcome, Script};

/// Replay timestamped circulation commands against a seeded catalog.
#[derive(Parser, Debug)]
#[command(name = "libcirc-replay")]
#[command(about = "Deterministically replay library circulation commands")]
struct Args {
    /// Path to the JSON replay script
    script: PathBuf,

    /// Abort on the first rejected command instead of recording it
    #[arg(long)]
    fail_fast: bool,

    /// Include per-step outcomes in the printed report
    #[arg(long)]
    outcomes: bool,

    /// Human-readable logs instead of JSON lines
    #[arg(long)]
    pretty_logs: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    outcomes: Option<&'a [Outcome]>,
    snapshot: &'a CirculationSnapshot,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.pretty_logs {
        libcirc_observability::init_pretty();
    } else {
        libcirc_observability::init();
    }

    let raw = std::fs::read_to_string(&args.script)
        .with_context(|| format!("failed to read script {:?}", args.script))?;
    let script = Script::from_json(&raw)?;
    tracing::info!(
        books = script.books.len(),
        steps = script.steps.len(),
        "replaying script"
    );

    let (library, outcomes) = script.replay(CirculationPolicy::from_env(), args.fail_fast)?;
    library
        .engine()
        .check_conservation()
        .context("replay left the ledgers inconsistent")?;

    let rejected = outcomes.iter().filter(|o| !o.is_ok()).count();
    tracing::info!(steps = outcomes.len(), rejected, "replay finished");

    let snapshot = library.snapshot();
    let report = Report {
        outcomes: args.outcomes.then_some(outcomes.as_slice()),
        snapshot: &snapshot,
    };
    let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
    println!("{json}");
    Ok(())
}
