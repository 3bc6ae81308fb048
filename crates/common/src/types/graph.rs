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

use crate::VariableRecord;

/// Variables of one stack frame, in the order they were dumped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameGroup {
    /// Frame label, e.g. `main` or `fact (2)`.
    pub label: String,
    /// Records belonging to this frame.
    pub variables: Vec<VariableRecord>,
}

/// Rendered contents of a heap object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum HeapValue {
    /// A struct rendered by a generated printer, as ordered key/value pairs.
    Table {
        /// Field name and rendered field value.
        fields: Vec<(String, String)>,
    },
    /// Anything else, kept verbatim.
    Opaque {
        /// The raw text.
        text: String,
    },
}

impl HeapValue {
    /// Looks up a field of a table value.
    pub fn field(&self, key: &str) -> Option<&str> {
        match self {
            Self::Table { fields } => {
                fields.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
            }
            Self::Opaque { .. } => None,
        }
    }

    /// Field names of a table value, empty for opaque values.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Self::Table { fields } => fields.iter().map(|(k, _)| k.as_str()).collect(),
            Self::Opaque { .. } => Vec::new(),
        }
    }
}

/// A live heap allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeapObject {
    /// Canonical address (`0x…`).
    pub address: String,
    /// Type name, `raw` until a typed pointer has seen the allocation.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Rendered value as dumped.
    pub display_value: String,
    /// Parsed value.
    pub value: HeapValue,
}

/// Where a pointer edge starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EdgeSource {
    /// A pointer variable on the stack.
    Variable {
        /// Frame label of the variable.
        frame: String,
        /// Variable name.
        name: String,
    },
    /// A pointer stored inside a heap object.
    Heap {
        /// Canonical address of the heap object.
        address: String,
    },
}

/// A pointer from a variable or heap object to an address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointerEdge {
    /// Edge origin.
    pub source: EdgeSource,
    /// Canonical target address; never null.
    pub target: String,
}

/// The stack/heap graph of one pause.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectGraph {
    /// Stack frames in encounter order (innermost first).
    pub frames: Vec<FrameGroup>,
    /// Heap objects, deduplicated by address.
    pub heap: Vec<HeapObject>,
    /// Pointer edges.
    pub edges: Vec<PointerEdge>,
}

impl ObjectGraph {
    /// Frame the program is currently paused in.
    pub fn current_frame(&self) -> Option<&FrameGroup> {
        self.frames.first()
    }

    /// Finds a frame by label.
    pub fn frame(&self, label: &str) -> Option<&FrameGroup> {
        self.frames.iter().find(|f| f.label == label)
    }

    /// Finds a heap object by canonical address.
    pub fn heap_object(&self, address: &str) -> Option<&HeapObject> {
        self.heap.iter().find(|h| h.address == address)
    }

    /// Edges leaving the given source.
    pub fn edges_from<'a>(
        &'a self,
        source: &'a EdgeSource,
    ) -> impl Iterator<Item = &'a PointerEdge> + 'a {
        self.edges.iter().filter(move |e| &e.source == source)
    }

    /// Whether the graph holds nothing at all.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty() && self.heap.is_empty()
    }
}
