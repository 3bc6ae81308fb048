// CppStep - C++ Step Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Source instrumentation.
//!
//! Rewrites student C++ so that it announces every step, registers its
//! variables with the runtime shim and prints its aggregates as JSON.

pub mod codegen;

mod modification;
pub use modification::*;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    analysis::{analyze, SourceAnalysis},
    EngineError,
};

/// The result of instrumenting one translation unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentedSource {
    /// The rewritten source.
    pub source: String,
    /// What the analysis found.
    pub analysis: SourceAnalysis,
    /// Lines that received a step announcement.
    pub breakable_lines: BTreeSet<u32>,
}

/// Instruments C++ source.
///
/// Fails only when the source cannot be parsed at all or the collected edits
/// clash; syntax errors inside a function leave that function untouched.
pub fn instrument(source: &str) -> Result<InstrumentedSource, EngineError> {
    let analysis = analyze(source)?;
    if !analysis.skipped_functions.is_empty() {
        warn!(
            functions = ?analysis.skipped_functions,
            "some functions were left uninstrumented because of syntax errors"
        );
    }

    let mut modifications = SourceModifications::new();
    modifications.collect_modifications(&analysis)?;
    let mut instrumented = modifications.modify_source(source);

    for descriptor in &analysis.structs {
        instrumented.push_str(&codegen::generate_struct_printer(descriptor));
    }

    debug!(edits = modifications.len(), "source instrumented");
    Ok(InstrumentedSource {
        source: instrumented,
        breakable_lines: analysis.breakable_lines(),
        analysis,
    })
}

/// Instruments C++ source, returning it unchanged if that is impossible.
pub fn instrument_or_passthrough(source: &str) -> String {
    match instrument(source) {
        Ok(instrumented) => instrumented.source,
        Err(err) => {
            warn!(error = %err, "instrumentation failed, running the source as written");
            source.to_string()
        }
    }
}
