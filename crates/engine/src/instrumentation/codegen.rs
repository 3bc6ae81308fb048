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

//! Generators for the C++ snippets injected by the instrumenter.
//!
//! Every hook named here is defined by the runtime shim (`debug_core.h`).

use std::fmt::Write;

use crate::analysis::{FunctionDescriptor, LoopDescriptor, StructDescriptor};

/// Name of the step macro.
pub const STEP_MACRO: &str = "DEBUG_STEP";

/// Prefix of every variable tracker the instrumenter declares.
pub const TRACKER_PREFIX: &str = "_dbg_";

/// Name of the frame tracker. Variable trackers all start with
/// [`TRACKER_PREFIX`], so no program variable can produce this name.
pub const FRAME_TRACKER: &str = "_dbgf_frame";

/// Generates a step announcement statement.
pub fn generate_step_hook(line: u32) -> String {
    format!("{STEP_MACRO}({line}); ")
}

/// Generates a tracker for a local variable or parameter.
pub fn generate_variable_tracker(name: &str) -> String {
    format!(" Tracer {TRACKER_PREFIX}{name}(\"{name}\", {name});")
}

/// Generates the function-entry sequence: scope tracker, entry step, then a
/// tracker per parameter.
pub fn generate_function_entry(function: &FunctionDescriptor) -> String {
    let mut code = format!(
        " FuncTracker {FRAME_TRACKER}(\"{}\"); {STEP_MACRO}({});",
        escape_literal(&function.name),
        function.header_line
    );
    for parameter in &function.parameter_names {
        code.push_str(&generate_variable_tracker(parameter));
    }
    code
}

/// Generates the per-iteration call placed in a counted loop's update clause.
pub fn generate_iteration_hook(lp: &LoopDescriptor) -> String {
    let call = match &lp.loop_variable {
        Some(name) => format!("_debug_loop_step({}, \"{name}\", {name})", lp.line),
        None => format!("{STEP_MACRO}({})", lp.line),
    };
    if lp.has_update_clause {
        format!(", {call}")
    } else {
        call
    }
}

/// Generates the prototype of a struct's stream printer.
pub fn generate_printer_prototype(descriptor: &StructDescriptor) -> String {
    format!("\nstd::ostream& operator<<(std::ostream& os, const {}& obj);", descriptor.name)
}

/// Generates a stream printer that writes the aggregate as a JSON object
/// whose values are strings, e.g. `{"val": "5", "next": "0x1040"}`.
///
/// Pointer members also refresh the heap record of their pointee so a chain
/// of nodes is re-rendered from its head.
pub fn generate_struct_printer(descriptor: &StructDescriptor) -> String {
    let mut code = String::new();
    let _ = writeln!(code, "\n// stream printer for {}", descriptor.name);
    let _ = writeln!(code, "std::ostream& operator<<(std::ostream& os, const {}& obj) {{", descriptor.name);
    let _ = writeln!(code, "    os << \"{{\";");
    for (index, field) in descriptor.fields.iter().enumerate() {
        let separator = if index > 0 { ", " } else { "" };
        let _ = writeln!(code, "    os << \"{separator}\\\"{}\\\": \";", field.name);
        if let Some(pointee) = &field.pointee_type {
            let _ = writeln!(
                code,
                "    _debug_update_heap_info(obj.{}, \"{}\");",
                field.name,
                escape_literal(pointee)
            );
        }
        let _ = writeln!(code, "    _debug_field(os, obj.{});", field.name);
    }
    let _ = writeln!(code, "    os << \"}}\";");
    let _ = writeln!(code, "    return os;");
    let _ = writeln!(code, "}}");
    code
}

/// Escapes text for use inside a C++ string literal.
fn escape_literal(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
