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

use crate::wire::{TEST_ACTUAL, TEST_EXPECTED, TEST_FAIL, TEST_PASS};

/// Result of one `EXPECT_EQUAL` check printed by the program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum TestOutcome {
    /// `[TEST:PASS] <expr>`
    Passed {
        /// The checked expression, e.g. `fact(3) == 6`.
        expression: String,
    },
    /// `[TEST:FAIL] <expr> Expected: <e> Actual: <a>`
    Failed {
        /// The checked expression.
        expression: String,
        /// Expected value as printed.
        expected: String,
        /// Actual value as printed.
        actual: String,
    },
}

impl TestOutcome {
    /// Recognizes a line containing a test marker. Returns `None` for any
    /// other line.
    ///
    /// Text before the marker is whatever the program printed on the same
    /// line and is ignored. A failing line without the `Expected:`/`Actual:`
    /// tail is still reported as a failure, with empty values.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim_end();
        let (start, marker) = [TEST_PASS, TEST_FAIL]
            .into_iter()
            .filter_map(|marker| line.find(marker).map(|start| (start, marker)))
            .min_by_key(|(start, _)| *start)?;
        let rest = &line[start + marker.len()..];
        if marker == TEST_PASS {
            return Some(Self::Passed { expression: rest.trim().to_string() });
        }

        let outcome = match rest.rsplit_once(TEST_ACTUAL) {
            Some((head, actual)) => match head.rsplit_once(TEST_EXPECTED) {
                Some((expression, expected)) => Self::Failed {
                    expression: expression.trim().to_string(),
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                },
                None => Self::Failed {
                    expression: head.trim().to_string(),
                    expected: String::new(),
                    actual: actual.to_string(),
                },
            },
            None => Self::Failed {
                expression: rest.trim().to_string(),
                expected: String::new(),
                actual: String::new(),
            },
        };
        Some(outcome)
    }

    /// Whether the check passed.
    pub fn passed(&self) -> bool {
        matches!(self, Self::Passed { .. })
    }

    /// The checked expression.
    pub fn expression(&self) -> &str {
        match self {
            Self::Passed { expression } | Self::Failed { expression, .. } => expression,
        }
    }
}
