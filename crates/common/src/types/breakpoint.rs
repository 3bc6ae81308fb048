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

use std::{collections::BTreeSet, fmt::Display, str::FromStr};

use eyre::{bail, eyre, Error, Result};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// A set of 1-based source lines the program should stop at.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_more::Deref,
    derive_more::DerefMut,
    derive_more::From,
)]
pub struct BreakpointSet(BTreeSet<u32>);

impl BreakpointSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether execution must stop at `line`.
    pub fn hits(&self, line: u32) -> bool {
        self.0.contains(&line)
    }

    /// Adds `line` if absent, removes it otherwise. Returns whether the line
    /// is now a breakpoint.
    pub fn toggle(&mut self, line: u32) -> bool {
        if self.0.remove(&line) {
            false
        } else {
            self.0.insert(line);
            true
        }
    }

    /// Lines in ascending order.
    pub fn lines(&self) -> Vec<u32> {
        self.0.iter().copied().collect()
    }
}

impl FromIterator<u32> for BreakpointSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Display for BreakpointSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.iter().join(","))
    }
}

impl FromStr for BreakpointSet {
    type Err = Error;

    /// Parses a list of lines separated by commas or whitespace.
    ///
    /// Inclusive ranges are accepted: `3,7-9 12` is `{3, 7, 8, 9, 12}`.
    /// Line 0 does not exist and is rejected.
    fn from_str(s: &str) -> Result<Self> {
        let mut set = BTreeSet::new();
        for token in s.split(|c: char| c == ',' || c.is_whitespace()).filter(|t| !t.is_empty()) {
            let (start, end) = match token.split_once('-') {
                Some((start, end)) => (parse_line(start)?, parse_line(end)?),
                None => {
                    let line = parse_line(token)?;
                    (line, line)
                }
            };
            if start > end {
                bail!("Invalid line range: {token}");
            }
            set.extend(start..=end);
        }
        Ok(Self(set))
    }
}

fn parse_line(s: &str) -> Result<u32> {
    let line = s.trim().parse::<u32>().map_err(|e| eyre!("Invalid line number '{s}': {e}"))?;
    if line == 0 {
        bail!("Line numbers start at 1");
    }
    Ok(line)
}
