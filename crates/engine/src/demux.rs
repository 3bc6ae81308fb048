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

//! Splits the program's output stream into user output and debugger state.
//!
//! Output arrives in arbitrary chunks. [`OutputDemux`] buffers the
//! incomplete trailing line between calls, routes complete lines either to
//! the user-visible output or into the currently open debug block, and
//! reports every completed block.
//!
//! Text that is not inside a block is released as soon as it is known not to
//! start a marker, so prompts printed without a trailing newline show up
//! immediately. The shim does not break the line before a dump, so a block
//! may open after output the program left unterminated (`cout << i << " ";`).

use cppstep_common::{
    wire::{STACK_END, STACK_START, TEST_FAIL, TEST_PASS, VARS_END, VARS_START},
    TestOutcome, VariableRecord,
};
use tracing::{debug, trace, warn};

use crate::EngineError;

const MARKERS: [&str; 6] = [VARS_START, VARS_END, STACK_START, STACK_END, TEST_PASS, TEST_FAIL];

/// What one call to [`OutputDemux::feed`] produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemuxOutput {
    /// Text for the user's console, sentinels and block contents removed.
    pub output: String,
    /// The last variable block completed by this chunk.
    pub variables: Option<Vec<VariableRecord>>,
    /// The last stack block completed by this chunk, innermost frame first.
    pub stack: Option<Vec<String>>,
    /// Test markers seen in the user output.
    pub tests: Vec<TestOutcome>,
}

impl DemuxOutput {
    /// Whether the chunk produced nothing observable.
    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
            && self.variables.is_none()
            && self.stack.is_none()
            && self.tests.is_empty()
    }
}

#[derive(Debug, Default)]
enum Block {
    #[default]
    Outside,
    Variables(Vec<VariableRecord>),
    Stack(Vec<String>),
}

/// Incremental demultiplexer for one program run.
#[derive(Debug, Default)]
pub struct OutputDemux {
    /// Unconsumed tail of the current line.
    pending: String,
    /// The current line has already been partially released as output.
    released: bool,
    block: Block,
}

impl OutputDemux {
    /// Creates a demultiplexer with empty buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a debug block is open.
    pub fn in_block(&self) -> bool {
        !matches!(self.block, Block::Outside)
    }

    /// Consumes a chunk of program output.
    pub fn feed(&mut self, chunk: &str) -> DemuxOutput {
        let mut out = DemuxOutput::default();
        let mut rest = chunk;
        while let Some(pos) = rest.find('\n') {
            self.pending.push_str(&rest[..pos]);
            rest = &rest[pos + 1..];
            let line = std::mem::take(&mut self.pending);
            let released = std::mem::take(&mut self.released);
            self.process_line(line, released, &mut out);
        }
        self.pending.push_str(rest);

        if !self.in_block() {
            let held = held_from(&self.pending);
            if held > 0 {
                out.output.push_str(&self.pending[..held]);
                self.pending.drain(..held);
                self.released = true;
            }
        }
        out
    }

    /// Releases a trailing line that never received its newline.
    ///
    /// Called when the program ends. An unterminated block is dropped.
    pub fn flush(&mut self) -> DemuxOutput {
        let mut out = DemuxOutput::default();
        let line = std::mem::take(&mut self.pending);
        self.released = false;
        match std::mem::take(&mut self.block) {
            Block::Outside => {
                if let Some(outcome) = TestOutcome::parse_line(&line) {
                    out.tests.push(outcome);
                }
                out.output.push_str(&line);
            }
            Block::Variables(records) => {
                warn!(
                    records = records.len(),
                    "{}",
                    EngineError::MalformedDebugBlock("variable block never closed".into())
                );
            }
            Block::Stack(frames) => {
                warn!(
                    frames = frames.len(),
                    "{}",
                    EngineError::MalformedDebugBlock("stack block never closed".into())
                );
            }
        }
        out
    }

    /// Forgets all buffered state, e.g. when a new run starts.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.released = false;
        self.block = Block::Outside;
    }

    fn process_line(&mut self, line: String, released: bool, out: &mut DemuxOutput) {
        let content = line.strip_suffix('\r').unwrap_or(&line);
        let marker = content.trim();

        match &mut self.block {
            Block::Outside => {
                if let Some((prefix, start)) = split_block_start(content) {
                    // a whitespace-only line around the sentinel is not output
                    if released || !prefix.trim().is_empty() {
                        out.output.push_str(prefix);
                    }
                    self.block = if start == VARS_START {
                        Block::Variables(Vec::new())
                    } else {
                        Block::Stack(Vec::new())
                    };
                    return;
                }
                if !released && matches!(marker, VARS_END | STACK_END) {
                    debug!(marker, "stray block end");
                    return;
                }
                if let Some(outcome) = TestOutcome::parse_line(content) {
                    trace!(?outcome, "test marker");
                    out.tests.push(outcome);
                }
                out.output.push_str(&line);
                out.output.push('\n');
            }
            Block::Variables(records) => match marker {
                VARS_END => out.variables = Some(std::mem::take(records)),
                VARS_START | STACK_START => {
                    warn!(
                        "{}",
                        EngineError::MalformedDebugBlock(format!(
                            "{marker} inside a variable block"
                        ))
                    );
                    self.block = if marker == VARS_START {
                        Block::Variables(Vec::new())
                    } else {
                        Block::Stack(Vec::new())
                    };
                }
                "" | STACK_END => {}
                _ => records.push(VariableRecord::parse_lossy(content)),
            },
            Block::Stack(frames) => match marker {
                STACK_END => out.stack = Some(std::mem::take(frames)),
                VARS_START | STACK_START => {
                    warn!(
                        "{}",
                        EngineError::MalformedDebugBlock(format!("{marker} inside a stack block"))
                    );
                    self.block = if marker == VARS_START {
                        Block::Variables(Vec::new())
                    } else {
                        Block::Stack(Vec::new())
                    };
                }
                "" | VARS_END => {}
                _ => frames.push(marker.to_string()),
            },
        }

        if matches!(marker, VARS_END | STACK_END) {
            self.block = Block::Outside;
        }
    }
}

/// Splits a line that ends in a block start sentinel into the program output
/// before it and the sentinel.
fn split_block_start(content: &str) -> Option<(&str, &'static str)> {
    let content = content.trim_end();
    [VARS_START, STACK_START]
        .into_iter()
        .find_map(|start| content.strip_suffix(start).map(|prefix| (prefix, start)))
}

/// Offset from which `partial` must be held back because more text could
/// turn it into a marker. Everything before it can be released.
fn held_from(partial: &str) -> usize {
    partial
        .match_indices('[')
        .map(|(index, _)| index)
        .find(|&index| {
            let tail = &partial[index..];
            MARKERS.iter().any(|marker| marker.starts_with(tail) || tail.starts_with(marker))
        })
        .unwrap_or(partial.len())
}
