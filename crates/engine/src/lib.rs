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

//! CppStep Engine - source-level debugging of C++ programs compiled to WebAssembly
//!
//! The pipeline has five stages:
//!
//! 1. [`instrumentation`] rewrites the program so that every statement
//!    announces itself and every variable registers itself with the shim;
//! 2. [`shim`] is the C++ runtime the rewritten program is compiled against;
//! 3. [`coordinator`] compiles and runs the program on a worker thread and
//!    blocks it at step announcements according to a shared control register;
//! 4. [`demux`] separates the program's own output from the state dumps the
//!    shim prints into the same stream;
//! 5. [`graph`] turns a dump into stack frames, heap objects and pointers.
//!
//! [`session::DebugSession`] strings the stages together for a front end.

/// Syntax-tree analysis of the program
pub mod analysis;
/// Source rewriting
pub mod instrumentation;
pub use instrumentation::{instrument, instrument_or_passthrough, InstrumentedSource};

/// Runtime shim headers and their Rust model
pub mod shim;

/// Output demultiplexer
pub mod demux;
pub use demux::{DemuxOutput, OutputDemux};

/// Object graph reconstruction
pub mod graph;

/// Compilation and execution of instrumented programs
pub mod coordinator;
pub use coordinator::{Coordinator, RunPhase};

/// Host-side debug session
pub mod session;
pub use session::{replay, DebugSession, DebugSnapshot, Replay, SessionEvent};

/// Engine configuration
pub mod config;
pub use config::EngineConfig;

mod error;
pub use error::EngineError;
