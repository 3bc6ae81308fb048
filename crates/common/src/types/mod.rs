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

//! Types shared by the engine and the front ends.

/// Breakpoint line sets
pub mod breakpoint;
pub use breakpoint::*;

/// Stack/heap object graph reconstructed from a variable dump
pub mod graph;
pub use graph::*;

/// Single variable records of the debug channel
pub mod record;
pub use record::*;

/// Outcomes of `EXPECT_EQUAL` checks
pub mod test_outcome;
pub use test_outcome::*;
