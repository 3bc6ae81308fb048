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

//! Turning instrumented source into a WebAssembly module.

use std::{io, path::PathBuf, process::Command};

use thiserror::Error;
use tracing::{debug, info};

use crate::{
    config::EngineConfig,
    shim::{self, SOURCE_FILE_NAME},
};

/// Name of the module file produced by [`CommandToolchain`].
const MODULE_FILE_NAME: &str = "main.wasm";

/// A compiled program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledModule {
    /// WebAssembly binary.
    pub bytes: Vec<u8>,
}

impl CompiledModule {
    /// Wraps a module binary.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

/// Why a toolchain produced no module.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The compiler or linker rejected the program.
    #[error("{0}")]
    Diagnostics(String),

    /// The compiler could not be started.
    #[error("toolchain unavailable: {0}")]
    Unavailable(String),

    /// Scratch files could not be written or read.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Compiles source text to a module.
pub trait Toolchain: Send + Sync {
    /// Compiles `source`, passing `flags` to the compiler after its defaults.
    fn compile(&self, source: &str, flags: &[String]) -> Result<CompiledModule, CompileError>;
}

/// Runs an external `clang++`-compatible compiler targeting `wasm32-wasi`.
///
/// Every compilation happens in a fresh temporary directory holding the shim
/// headers and the wrapped program.
#[derive(Debug, Clone)]
pub struct CommandToolchain {
    compiler: String,
    flags: Vec<String>,
    sysroot: Option<PathBuf>,
    heap_depth_limit: usize,
}

impl CommandToolchain {
    /// Creates a toolchain invoking `compiler` with the default flags.
    pub fn new(compiler: impl Into<String>) -> Self {
        let config = EngineConfig::default();
        Self {
            compiler: compiler.into(),
            flags: config.flags,
            sysroot: None,
            heap_depth_limit: config.heap_depth_limit,
        }
    }

    /// Creates a toolchain from the engine configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            compiler: config.compiler.clone(),
            flags: config.flags.clone(),
            sysroot: config.sysroot.clone(),
            heap_depth_limit: config.heap_depth_limit,
        }
    }

    /// Sets the WASI sysroot.
    pub fn with_sysroot(mut self, sysroot: impl Into<PathBuf>) -> Self {
        self.sysroot = Some(sysroot.into());
        self
    }

    /// The full argument list for one compilation, excluding the compiler.
    pub fn arguments(&self, include_dir: &str, source: &str, output: &str, extra: &[String]) -> Vec<String> {
        let mut args = self.flags.clone();
        if let Some(sysroot) = &self.sysroot {
            args.push(format!("--sysroot={}", sysroot.display()));
        }
        args.push(format!("-I{include_dir}"));
        args.push(format!("-DCPPSTEP_HEAP_DEPTH={}", self.heap_depth_limit));
        args.extend(extra.iter().cloned());
        args.push(source.to_string());
        args.push("-o".to_string());
        args.push(output.to_string());
        args
    }
}

impl Default for CommandToolchain {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl Toolchain for CommandToolchain {
    fn compile(&self, source: &str, flags: &[String]) -> Result<CompiledModule, CompileError> {
        let dir = tempfile::tempdir()?;
        shim::write_headers(dir.path()).map_err(|e| CompileError::Io(io::Error::other(e)))?;

        let source_path = dir.path().join(SOURCE_FILE_NAME);
        std::fs::write(&source_path, shim::wrap_source(source))?;
        let output_path = dir.path().join(MODULE_FILE_NAME);

        let args = self.arguments(
            &dir.path().display().to_string(),
            &source_path.display().to_string(),
            &output_path.display().to_string(),
            flags,
        );
        debug!(compiler = %self.compiler, ?args, "invoking compiler");

        let output = Command::new(&self.compiler)
            .args(&args)
            .current_dir(dir.path())
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => {
                    CompileError::Unavailable(format!("`{}` not found", self.compiler))
                }
                _ => CompileError::Io(e),
            })?;

        if !output.status.success() {
            let mut diagnostics = String::from_utf8_lossy(&output.stderr).into_owned();
            if diagnostics.trim().is_empty() {
                diagnostics = format!("{} exited with {}", self.compiler, output.status);
            }
            return Err(CompileError::Diagnostics(diagnostics));
        }

        let bytes = std::fs::read(&output_path)?;
        info!(size = bytes.len(), "compiled module");
        Ok(CompiledModule::new(bytes))
    }
}
