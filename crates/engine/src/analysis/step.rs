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

use serde::{Deserialize, Serialize};

/// Statement kinds that receive a step announcement right before them.
pub(crate) const INSTRUMENTABLE_KINDS: &[&str] = &[
    "expression_statement",
    "declaration",
    "return_statement",
    "if_statement",
    "for_statement",
    "for_range_loop",
    "while_statement",
    "do_statement",
    "switch_statement",
    "break_statement",
    "continue_statement",
    "compound_statement",
    "try_statement",
];

/// Where a step announcement sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    /// Right before a statement.
    Statement,
    /// Right before the closing brace of a range-based or conditional loop
    /// body, announcing the loop header again on every iteration.
    LoopBack,
}

/// A point where the program reports its position and may block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Kind of the step.
    pub kind: StepKind,
    /// Offset in the original source where the announcement is injected.
    pub loc: usize,
    /// 1-based line reported by the announcement.
    pub line: u32,
}

impl Step {
    /// A step before the statement starting at `loc`.
    pub fn statement(loc: usize, line: u32) -> Self {
        Self { kind: StepKind::Statement, loc, line }
    }

    /// A loop-back step at `loc`, reporting the loop header `line`.
    pub fn loop_back(loc: usize, line: u32) -> Self {
        Self { kind: StepKind::LoopBack, loc, line }
    }
}
