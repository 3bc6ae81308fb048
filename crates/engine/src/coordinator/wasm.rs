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

//! In-process execution with wasmtime and WASI preview 1.

use std::{
    fs::File,
    io::{self, Read},
};

use tempfile::NamedTempFile;
use tracing::{debug, trace};
use wasmtime::{Caller, Engine, Linker, Module, Store};
use wasmtime_wasi::{
    preview1::{self, WasiP1Ctx},
    I32Exit, OutputFile, WasiCtxBuilder,
};

use super::{CompiledModule, ProgramHost, ProgramRunner, RunError};

/// Module and import name of the blocking step callback.
const WAIT_IMPORT: (&str, &str) = ("env", "_debug_wait");

/// Runs modules with wasmtime, injecting the step callback as an import.
#[derive(Clone, Default)]
pub struct WasmRunner {
    engine: Engine,
}

impl std::fmt::Debug for WasmRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmRunner").finish_non_exhaustive()
    }
}

impl WasmRunner {
    /// Creates a runner with a default engine.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Program stdout, captured in a scratch file and forwarded in pieces.
struct CapturedOutput {
    // keeps the file alive
    _file: NamedTempFile,
    reader: File,
    /// Bytes of an incomplete UTF-8 sequence held back from the last read.
    carry: Vec<u8>,
}

impl CapturedOutput {
    fn new() -> io::Result<(Self, File)> {
        let file = NamedTempFile::new()?;
        let writer = file.reopen()?;
        let reader = File::open(file.path())?;
        Ok((Self { _file: file, reader, carry: Vec::new() }, writer))
    }

    /// Text written since the previous call.
    fn take(&mut self) -> io::Result<String> {
        let mut bytes = std::mem::take(&mut self.carry);
        self.reader.read_to_end(&mut bytes)?;
        let valid = match std::str::from_utf8(&bytes) {
            Ok(_) => bytes.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => bytes.len(),
        };
        self.carry = bytes.split_off(valid);
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

struct WasmState {
    wasi: WasiP1Ctx,
    output: CapturedOutput,
    host: Box<dyn ProgramHost>,
}

impl WasmState {
    fn flush_output(&mut self) {
        match self.output.take() {
            Ok(text) => self.host.write_output(&text),
            Err(e) => debug!(error = %e, "failed to read program output"),
        }
    }
}

fn trap(error: impl std::fmt::Display) -> RunError {
    RunError::Trap(error.to_string())
}

impl ProgramRunner for WasmRunner {
    fn run(&self, module: &CompiledModule, host: Box<dyn ProgramHost>) -> Result<i32, RunError> {
        let wasm = Module::new(&self.engine, &module.bytes).map_err(|e| trap(format!("{e:#}")))?;

        let (output, stdout) = CapturedOutput::new().map_err(trap)?;
        let stderr = stdout.try_clone().map_err(trap)?;
        let wasi = WasiCtxBuilder::new()
            .stdout(OutputFile::new(stdout))
            .stderr(OutputFile::new(stderr))
            .args(&["main.wasm"])
            .build_p1();

        let mut linker: Linker<WasmState> = Linker::new(&self.engine);
        preview1::add_to_linker_sync(&mut linker, |state: &mut WasmState| &mut state.wasi)
            .map_err(trap)?;
        linker
            .func_wrap(
                WAIT_IMPORT.0,
                WAIT_IMPORT.1,
                |mut caller: Caller<'_, WasmState>, line: i32| -> wasmtime::Result<()> {
                    let state = caller.data_mut();
                    state.flush_output();
                    trace!(line, "step announcement");
                    state.host.wait(line.max(0) as u32).map_err(wasmtime::Error::new)
                },
            )
            .map_err(trap)?;

        let mut store = Store::new(&self.engine, WasmState { wasi, output, host });
        let instance =
            linker.instantiate(&mut store, &wasm).map_err(|e| trap(format!("{e:#}")))?;
        let start = instance
            .get_typed_func::<(), ()>(&mut store, "_start")
            .map_err(|e| trap(format!("{e:#}")))?;

        let result = start.call(&mut store, ());
        if let Err(e) = &result {
            if let Some(RunError::Terminated) = e.downcast_ref::<RunError>() {
                return Err(RunError::Terminated);
            }
        }
        store.data_mut().flush_output();

        match result {
            Ok(()) => Ok(0),
            Err(e) => match e.downcast_ref::<I32Exit>() {
                Some(exit) => Ok(exit.0),
                None => Err(trap(format!("{e:#}"))),
            },
        }
    }
}
