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

use super::CompiledModule;

/// Why a program run ended abnormally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    /// The program trapped or could not be instantiated.
    #[error("{0}")]
    Trap(String),

    /// The host stopped the run.
    #[error("run terminated")]
    Terminated,

    /// The runner cannot suspend a program at a step announcement.
    #[error("{0}")]
    Unsupported(String),
}

/// What a running program can do to its host.
///
/// This is the only channel between the program and the debugger: output
/// goes out through [`ProgramHost::write_output`] and the program suspends
/// itself in [`ProgramHost::wait`].
pub trait ProgramHost: Send {
    /// Forwards program output, in production order.
    fn write_output(&mut self, text: &str);

    /// Called at every step announcement. Returns once the program may
    /// continue, or with [`RunError::Terminated`] if it may not.
    fn wait(&mut self, line: u32) -> Result<(), RunError>;
}

/// Executes compiled modules.
pub trait ProgramRunner: Send + Sync {
    /// Whether [`ProgramHost::wait`] may block the program. Runs are refused
    /// otherwise.
    fn supports_blocking_wait(&self) -> bool {
        true
    }

    /// Runs `module` to completion, returning its exit code.
    fn run(&self, module: &CompiledModule, host: Box<dyn ProgramHost>) -> Result<i32, RunError>;
}

/// Runner used when no WebAssembly runtime is compiled in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRuntime;

impl ProgramRunner for NoRuntime {
    fn supports_blocking_wait(&self) -> bool {
        false
    }

    fn run(&self, _module: &CompiledModule, _host: Box<dyn ProgramHost>) -> Result<i32, RunError> {
        Err(RunError::Unsupported(
            "this build has no WebAssembly runtime; rebuild with the `wasmtime` feature".into(),
        ))
    }
}
