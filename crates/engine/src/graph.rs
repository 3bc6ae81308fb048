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

//! Rebuilds the stack/heap object graph from a variable block.

use std::collections::{HashMap, HashSet};

use cppstep_common::{
    format_address, parse_address, EdgeSource, FrameGroup, HeapObject, HeapValue,
    ObjectGraph, PointerEdge, VariableRecord,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, trace};

static ADDRESS_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"0x[0-9a-fA-F]+").unwrap());

/// Builds the object graph of one pause.
///
/// Variables are grouped by frame in the order the frames are first seen.
/// Heap records are deduplicated by address, keeping the first. Every
/// variable with a non-null pointee gets an edge; heap objects get an edge
/// for each address mentioned in their value that names another known heap
/// object.
pub fn build(records: &[VariableRecord]) -> ObjectGraph {
    let mut graph = ObjectGraph::default();
    let mut frame_index: HashMap<&str, usize> = HashMap::new();
    let mut heap_index: HashSet<String> = HashSet::new();

    for record in records {
        if record.is_heap() {
            let Some(address) = heap_address(record) else {
                debug!(name = %record.name, "heap record without an address");
                continue;
            };
            if !heap_index.insert(address.clone()) {
                trace!(%address, "duplicate heap record");
                continue;
            }
            graph.heap.push(HeapObject {
                address,
                type_name: record.type_name.clone(),
                display_value: record.display_value.clone(),
                value: parse_value(&record.display_value),
            });
            continue;
        }

        let index = *frame_index.entry(record.frame_label.as_str()).or_insert_with(|| {
            graph.frames.push(FrameGroup {
                label: record.frame_label.clone(),
                variables: Vec::new(),
            });
            graph.frames.len() - 1
        });
        graph.frames[index].variables.push(record.clone());

        if let Some(target) = record.pointee_address.as_deref().and_then(parse_address) {
            graph.edges.push(PointerEdge {
                source: EdgeSource::Variable {
                    frame: record.frame_label.clone(),
                    name: record.name.clone(),
                },
                target: format_address(target),
            });
        }
    }

    for object in &graph.heap {
        let mut seen = HashSet::new();
        for token in ADDRESS_TOKEN.find_iter(&object.display_value) {
            let Some(target) = parse_address(token.as_str()).map(format_address) else {
                continue;
            };
            if heap_index.contains(&target) && seen.insert(target.clone()) {
                graph.edges.push(PointerEdge {
                    source: EdgeSource::Heap { address: object.address.clone() },
                    target,
                });
            }
        }
    }

    debug!(
        frames = graph.frames.len(),
        heap = graph.heap.len(),
        edges = graph.edges.len(),
        "built object graph"
    );
    graph
}

fn heap_address(record: &VariableRecord) -> Option<String> {
    parse_address(&record.own_address)
        .or_else(|| record.name.strip_prefix('*').and_then(parse_address))
        .map(format_address)
}

/// Parses a value rendered by a generated struct printer.
///
/// Only text that starts with `{` is attempted; anything that is not a JSON
/// object stays opaque.
fn parse_value(text: &str) -> HeapValue {
    let opaque = || HeapValue::Opaque { text: text.to_string() };
    if !text.trim_start().starts_with('{') {
        return opaque();
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => HeapValue::Table {
            fields: map
                .into_iter()
                .map(|(key, value)| {
                    let value = match value {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (key, value)
                })
                .collect(),
        },
        Ok(_) | Err(_) => {
            trace!(text, "heap value is not a table");
            opaque()
        }
    }
}
