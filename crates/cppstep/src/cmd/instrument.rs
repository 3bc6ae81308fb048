//! Instrument command - rewrite a source file the way the debugger runs it

use std::{fs, path::Path};

use cppstep_engine::{instrument, shim::wrap_source};
use eyre::{Context, Result};

/// Instruments `file` and prints the result, or writes it to `output`.
pub fn instrument_file(file: &Path, output: Option<&Path>, wrap: bool, analysis: bool) -> Result<()> {
    let source = fs::read_to_string(file)
        .wrap_err_with(|| format!("Failed to read {}", file.display()))?;
    let instrumented = instrument(&source)?;

    let text = if analysis {
        serde_json::to_string_pretty(&instrumented.analysis)?
    } else if wrap {
        wrap_source(&instrumented.source)
    } else {
        instrumented.source
    };

    match output {
        Some(path) => {
            fs::write(path, text).wrap_err_with(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(
                path = %path.display(),
                breakable = instrumented.breakable_lines.len(),
                "wrote instrumented source"
            );
        }
        None => println!("{text}"),
    }
    Ok(())
}
