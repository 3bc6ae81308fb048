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

use thiserror::Error;

/// Errors surfaced by the engine.
///
/// None of these ever escape to the user as a panic: the coordinator turns
/// them into diagnostic output followed by `finished`, and the instrumenter
/// falls back to the untouched source.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The source could not be parsed at all.
    #[error("failed to parse source: {0}")]
    ParseFailure(String),

    /// The toolchain rejected the program.
    #[error("compilation failed:\n{0}")]
    CompileFailure(String),

    /// The program trapped while running.
    #[error("runtime error: {0}")]
    RuntimeTrap(String),

    /// A debug block in the output stream did not follow the wire layout.
    #[error("malformed debug block: {0}")]
    MalformedDebugBlock(String),

    /// The runtime cannot block the program at a step announcement.
    #[error("environment unsupported: {0}")]
    EnvironmentUnsupported(String),

    /// An instrumentation edit clashed with another one.
    #[error("conflicting instrumentation at offset {0}")]
    ConflictingEdit(usize),
}

impl From<eyre::Report> for EngineError {
    fn from(report: eyre::Report) -> Self {
        Self::RuntimeTrap(format!("{report:#}"))
    }
}
