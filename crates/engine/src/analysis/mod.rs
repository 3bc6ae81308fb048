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

//! Source analysis over the tree-sitter C++ grammar.

mod analyzer;
pub use analyzer::*;

mod body;
pub use body::*;

mod function;
pub use function::*;

mod loops;
pub use loops::*;

mod step;
pub use step::*;

mod structs;
pub use structs::*;

pub mod syntax;

mod variable;
pub use variable::*;
