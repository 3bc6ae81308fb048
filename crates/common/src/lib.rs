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

//! CppStep Common - Shared functionality for CppStep components
//!
//! This crate holds everything the engine and the command line front end
//! agree on: the textual debug-block wire format, the variable records and
//! object graph carried in it, the host/worker protocol messages, and the
//! logging setup.

/// Wire types: variable records, object graph, breakpoints and test outcomes
pub mod types;

/// Logging setup and utilities for consistent logging across CppStep components
pub mod logging;
/// Messages exchanged between the host and the worker that runs the program
pub mod protocol;
/// Sentinel markers and constants of the textual debug channel
pub mod wire;

pub use logging::*;
pub use protocol::*;
pub use types::*;
