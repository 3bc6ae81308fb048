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

use std::{fmt::Display, str::FromStr};

use eyre::{bail, Error, Result};
use serde::{Deserialize, Serialize};

use crate::wire::{escape_field, unescape_field, FIELD_SEPARATOR, HEAP_FRAME, NULL_TARGET, RECORD_FIELDS};

/// One line of a variable block.
///
/// The wire layout is `name|type|ownAddr|value|targetAddr|frame|pointeeValue`.
/// Records whose frame is `heap` describe heap allocations rather than
/// variables; for those the name is the address prefixed with `*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableRecord {
    /// Variable name, or `*<addr>` for heap objects.
    pub name: String,
    /// Type name as reported by the runtime.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Address of the variable's own storage.
    pub own_address: String,
    /// Rendered value.
    pub display_value: String,
    /// Target of a pointer, `None` for non-pointers and null pointers.
    pub pointee_address: Option<String>,
    /// Frame label (`main`, `fact (2)`, `global`, `heap`).
    pub frame_label: String,
    /// Rendered value of the pointee, if any.
    pub pointee_display_value: Option<String>,
}

impl VariableRecord {
    /// Whether this record describes a heap object instead of a variable.
    pub fn is_heap(&self) -> bool {
        self.frame_label == HEAP_FRAME
    }

    /// Builds the record used when a line does not follow the wire layout.
    ///
    /// Whatever precedes the first separator becomes the name and the rest of
    /// the line the value, so the text is still shown to the user.
    pub fn degraded(line: &str) -> Self {
        let (name, value) = match line.split_once(FIELD_SEPARATOR) {
            Some((name, value)) => (name.trim(), value.trim()),
            None => (line.trim(), ""),
        };
        Self {
            name: name.to_string(),
            type_name: "unknown".to_string(),
            own_address: String::new(),
            display_value: value.to_string(),
            pointee_address: None,
            frame_label: "unknown".to_string(),
            pointee_display_value: None,
        }
    }

    /// Parses a record, falling back to [`VariableRecord::degraded`].
    pub fn parse_lossy(line: &str) -> Self {
        line.parse().unwrap_or_else(|_| Self::degraded(line))
    }
}

impl FromStr for VariableRecord {
    type Err = Error;

    /// Parses `name|type|ownAddr|value|targetAddr|frame|pointeeValue`.
    ///
    /// The pointee value may be missing (six fields). Values that contain the
    /// separator themselves are re-joined, since the address, frame and
    /// pointee fields at the end never do. Escaped newlines, backslashes and
    /// separators in the two value fields are decoded.
    fn from_str(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
        let (value, target, frame, pointee) = match parts.len() {
            n if n >= RECORD_FIELDS => (
                parts[3..n - 3].join("|"),
                parts[n - 3],
                parts[n - 2],
                Some(parts[n - 1]),
            ),
            6 => (parts[3].to_string(), parts[4], parts[5], None),
            n => bail!("expected {RECORD_FIELDS} fields in variable record, got {n}: {line}"),
        };
        if parts[0].is_empty() {
            bail!("variable record without a name: {line}");
        }

        Ok(Self {
            name: parts[0].to_string(),
            type_name: parts[1].to_string(),
            own_address: parts[2].to_string(),
            display_value: unescape_field(&value),
            pointee_address: parse_address(target).map(|_| target.to_string()),
            frame_label: frame.to_string(),
            pointee_display_value: pointee
                .filter(|p| !p.is_empty())
                .map(unescape_field),
        })
    }
}

impl Display for VariableRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}|{}|{}",
            self.name,
            self.type_name,
            self.own_address,
            escape_field(&self.display_value, false),
            self.pointee_address.as_deref().unwrap_or(NULL_TARGET),
            self.frame_label,
            self.pointee_display_value
                .as_deref()
                .map(|p| escape_field(p, true))
                .unwrap_or_default(),
        )
    }
}

/// Parses an address as printed by the runtime.
///
/// Returns `None` for null pointers (`0`, `0x0`, `nullptr`, empty) and for
/// text that is not an address at all.
pub fn parse_address(text: &str) -> Option<u64> {
    let text = text.trim();
    let value = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok()?,
        None => text.parse::<u64>().ok()?,
    };
    (value != 0).then_some(value)
}

/// Canonical spelling of an address, used to compare addresses that were
/// printed by different parts of the runtime.
pub fn format_address(addr: u64) -> String {
    format!("0x{addr:x}")
}
