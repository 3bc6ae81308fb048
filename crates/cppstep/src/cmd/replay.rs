//! Replay command - recover the state from a captured output log

use std::{fs, path::Path};

use eyre::{Context, Result};

/// Demultiplexes `log` and prints what it holds as JSON.
pub fn replay_log(log: &Path) -> Result<()> {
    let text =
        fs::read_to_string(log).wrap_err_with(|| format!("Failed to read {}", log.display()))?;
    let replay = cppstep_engine::replay(&text);
    tracing::info!(dumps = replay.dumps, tests = replay.tests.len(), "replayed output log");

    println!("{}", serde_json::to_string_pretty(&replay)?);
    Ok(())
}
