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

use std::ops::Range;

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

/// A body containing a single statement without a wrapping block.
/// This struct is meant to capture loop or if/else branches with a single
/// statement as their bodies, which must be braced before anything is
/// injected in front of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementBody {
    /// The source range of the body, trailing semicolon included.
    pub range: Range<usize>,
    /// Loop header line announced again right before the closing brace, when
    /// the body belongs to a range-based or conditional loop.
    #[serde(default)]
    pub loop_back: Option<u32>,
}

impl StatementBody {
    /// Creates a new statement body.
    pub fn new(range: Range<usize>) -> Self {
        Self { range, loop_back: None }
    }

    /// Announces `line` at the bottom of every pass through the body.
    pub fn with_loop_back(mut self, line: u32) -> Self {
        self.loop_back = Some(line);
        self
    }

    /// Returns the statement body of `body` if it is not already a block.
    pub(crate) fn from_node(body: &Node<'_>) -> Option<Self> {
        (body.kind() != "compound_statement").then(|| Self::new(body.start_byte()..body.end_byte()))
    }
}
