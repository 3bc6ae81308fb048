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

//! Rust model of the shim's per-run registries.
//!
//! The C++ shim keeps its active variables, call stack and heap registry in
//! one `_DebugSession` per module instance. [`ShimState`] holds the same
//! state and produces byte-for-byte the same dump, which lets the wire format
//! and the tracer bookkeeping be exercised without a compiler.

use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    fmt::{Display, Write},
    rc::Rc,
};

use cppstep_common::{
    types::format_address,
    wire::{
        escape_field, GLOBAL_FRAME, HEAP_FRAME, NULL_TARGET, STACK_END, STACK_START, VARS_END,
        VARS_START,
    },
};

/// Default bound on nested heap re-rendering.
pub const DEFAULT_HEAP_DEPTH: usize = 50;

const HEAP_BASE: u64 = 0x1_0000;
const HEAP_ALIGN: u64 = 16;
const STACK_BASE: u64 = 0xf000;
const STACK_SLOT: u64 = 8;

/// A registered heap allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapInfo {
    /// Requested size in bytes.
    pub size: usize,
    /// `raw` until a typed context names it.
    pub type_name: String,
    /// Last rendering of the object.
    pub value: String,
}

type Renderer = Box<dyn Fn(&SessionState) -> VariableView>;

struct VariableView {
    value: String,
    target: Option<u64>,
    pointee_value: String,
}

struct ActiveVariable {
    id: u64,
    name: String,
    type_name: String,
    frame: String,
    own_address: u64,
    render: Renderer,
}

struct SessionState {
    variables: Vec<ActiveVariable>,
    call_stack: Vec<String>,
    heap: BTreeMap<u64, HeapInfo>,
    in_hook: bool,
    depth: usize,
    depth_limit: usize,
    next_variable: u64,
    next_heap: u64,
    next_stack: u64,
}

impl SessionState {
    fn current_frame(&self) -> String {
        self.call_stack.last().cloned().unwrap_or_else(|| GLOBAL_FRAME.to_string())
    }
}

/// The registries of one debugged program.
#[derive(Clone)]
pub struct ShimState {
    state: Rc<RefCell<SessionState>>,
}

impl Default for ShimState {
    fn default() -> Self {
        Self::new(DEFAULT_HEAP_DEPTH)
    }
}

impl ShimState {
    /// Creates an empty session with the given heap rendering depth bound.
    pub fn new(depth_limit: usize) -> Self {
        Self {
            state: Rc::new(RefCell::new(SessionState {
                variables: Vec::new(),
                call_stack: Vec::new(),
                heap: BTreeMap::new(),
                in_hook: false,
                depth: 0,
                depth_limit,
                next_variable: 0,
                next_heap: HEAP_BASE,
                next_stack: STACK_BASE,
            })),
        }
    }

    /// Allocates `size` bytes. Allocations made while a hook runs are not
    /// registered, mirroring the shim's re-entrancy guard.
    pub fn allocate(&self, size: usize) -> u64 {
        let mut state = self.state.borrow_mut();
        let addr = state.next_heap;
        state.next_heap += (size as u64).max(1).div_ceil(HEAP_ALIGN) * HEAP_ALIGN;
        if !state.in_hook {
            state.heap.insert(
                addr,
                HeapInfo {
                    size,
                    type_name: "raw".to_string(),
                    value: format!("Allocated ({size} bytes)"),
                },
            );
        }
        addr
    }

    /// Releases an allocation; unknown addresses are ignored.
    pub fn deallocate(&self, addr: u64) {
        let mut state = self.state.borrow_mut();
        if !state.in_hook {
            state.heap.remove(&addr);
        }
    }

    /// Retypes and re-renders a registered allocation.
    ///
    /// `render` may call back into the session (to render linked nodes); the
    /// recursion stops at the depth limit. Returns whether `addr` was known.
    pub fn update_heap_info(
        &self,
        addr: u64,
        type_name: &str,
        render: impl FnOnce(&Self) -> String,
    ) -> bool {
        let old_hook = {
            let mut state = self.state.borrow_mut();
            if addr == 0 || state.depth > state.depth_limit {
                return false;
            }
            let Some(info) = state.heap.get_mut(&addr) else {
                return false;
            };
            info.type_name = type_name.to_string();
            state.depth += 1;
            std::mem::replace(&mut state.in_hook, true)
        };

        // no borrow is held while rendering
        let rendered = render(self);

        let mut state = self.state.borrow_mut();
        if let Some(info) = state.heap.get_mut(&addr) {
            info.value = rendered;
        }
        state.in_hook = old_hook;
        state.depth -= 1;
        true
    }

    /// Registers a variable until the returned tracer is dropped.
    ///
    /// The value is read at dump time, so later assignments through the
    /// shared cell show up like they do for the C++ reference.
    pub fn trace<T: Display + 'static>(&self, name: &str, value: &Rc<RefCell<T>>) -> VariableTracer {
        let value = Rc::clone(value);
        let render: Renderer = Box::new(move |_| VariableView {
            value: value.borrow().to_string(),
            target: None,
            pointee_value: String::new(),
        });
        self.register(name, short_type_name::<T>(), render)
    }

    /// Registers a pointer variable holding an address.
    ///
    /// A raw allocation it points to is retyped as `pointee_type`, like the
    /// shim's pointer tracer does on construction.
    pub fn trace_pointer(
        &self,
        name: &str,
        pointee_type: &str,
        pointer: &Rc<Cell<u64>>,
    ) -> VariableTracer {
        {
            let mut state = self.state.borrow_mut();
            if let Some(info) = state.heap.get_mut(&pointer.get()) {
                if info.type_name == "raw" {
                    info.type_name = pointee_type.to_string();
                }
            }
        }
        let pointer = Rc::clone(pointer);
        let render: Renderer = Box::new(move |state| {
            let addr = pointer.get();
            if addr == 0 {
                return VariableView {
                    value: "nullptr".to_string(),
                    target: None,
                    pointee_value: String::new(),
                };
            }
            VariableView {
                value: format_address(addr),
                target: Some(addr),
                pointee_value: state.heap.get(&addr).map(|h| h.value.clone()).unwrap_or_default(),
            }
        });
        self.register(name, format!("{pointee_type} *"), render)
    }

    fn register(&self, name: &str, type_name: String, render: Renderer) -> VariableTracer {
        let mut state = self.state.borrow_mut();
        let id = state.next_variable;
        state.next_variable += 1;
        let own_address = state.next_stack;
        state.next_stack -= STACK_SLOT;
        let frame = state.current_frame();
        state.variables.push(ActiveVariable {
            id,
            name: name.to_string(),
            type_name,
            frame,
            own_address,
            render,
        });
        VariableTracer { session: self.clone(), id }
    }

    /// Enters a function until the returned scope is dropped. Recursive
    /// activations are labelled `name (2)`, `name (3)`, …
    pub fn enter_function(&self, name: &str) -> FunctionScope {
        let mut state = self.state.borrow_mut();
        let prefix = format!("{name} (");
        let depth = state
            .call_stack
            .iter()
            .filter(|frame| *frame == name || frame.starts_with(&prefix))
            .count();
        let label = if depth > 0 { format!("{name} ({})", depth + 1) } else { name.to_string() };
        state.call_stack.push(label.clone());
        FunctionScope { session: self.clone(), label }
    }

    /// Names of the active variables, oldest first.
    pub fn active_variables(&self) -> Vec<String> {
        self.state.borrow().variables.iter().map(|v| v.name.clone()).collect()
    }

    /// Current call stack, outermost first.
    pub fn call_stack(&self) -> Vec<String> {
        self.state.borrow().call_stack.clone()
    }

    /// Registered allocations by address.
    pub fn heap(&self) -> BTreeMap<u64, HeapInfo> {
        self.state.borrow().heap.clone()
    }

    /// Renders the variable and stack blocks exactly as the shim prints them.
    pub fn dump(&self) -> String {
        let state = self.state.borrow();
        let mut out = String::new();
        let _ = writeln!(out, "{VARS_START}");
        for variable in state.variables.iter().rev() {
            let view = (variable.render)(&state);
            let _ = writeln!(
                out,
                "{}|{}|{}|{}|{}|{}|{}",
                variable.name,
                variable.type_name,
                format_address(variable.own_address),
                escape_field(&view.value, false),
                view.target.map(format_address).unwrap_or_else(|| NULL_TARGET.to_string()),
                variable.frame,
                escape_field(&view.pointee_value, true),
            );
        }
        for (addr, info) in &state.heap {
            let addr = format_address(*addr);
            let _ = writeln!(
                out,
                "*{addr}|{}|{addr}|{}|{NULL_TARGET}|{HEAP_FRAME}|",
                info.type_name,
                escape_field(&info.value, false)
            );
        }
        let _ = writeln!(out, "{VARS_END}");
        let _ = writeln!(out, "{STACK_START}");
        for frame in &state.call_stack {
            let _ = writeln!(out, "{frame}");
        }
        let _ = writeln!(out, "{STACK_END}");
        out
    }
}

fn short_type_name<T>() -> String {
    let full = std::any::type_name::<T>();
    match full.split('<').next() {
        Some(head) if !full.contains('<') => head.rsplit("::").next().unwrap_or(head).to_string(),
        _ => full.to_string(),
    }
}

/// Unregisters its variable when dropped, in any order.
pub struct VariableTracer {
    session: ShimState,
    id: u64,
}

impl Drop for VariableTracer {
    fn drop(&mut self) {
        let mut state = self.session.state.borrow_mut();
        if let Some(pos) = state.variables.iter().rposition(|v| v.id == self.id) {
            state.variables.remove(pos);
        }
    }
}

/// Pops its frame from the call stack when dropped.
pub struct FunctionScope {
    session: ShimState,
    label: String,
}

impl FunctionScope {
    /// The frame label, e.g. `fact (2)`.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for FunctionScope {
    fn drop(&mut self) {
        self.session.state.borrow_mut().call_stack.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{demux::OutputDemux, graph};

    #[test]
    fn test_tracers_leave_active_list_unchanged() {
        let session = ShimState::default();
        let a = Rc::new(RefCell::new(1));
        let _outer = session.trace("outer", &a);
        let before = session.active_variables();

        let x = session.trace("x", &a);
        let y = session.trace("y", &a);
        let z = session.trace("z", &a);
        // non-LIFO destruction
        drop(y);
        assert_eq!(session.active_variables(), vec!["outer", "x", "z"]);
        drop(x);
        drop(z);
        assert_eq!(session.active_variables(), before);
    }

    #[test]
    fn test_registry_never_holds_an_address_twice() {
        let session = ShimState::default();
        let first = session.allocate(12);
        let second = session.allocate(12);
        assert_ne!(first, second);
        assert_eq!(session.heap().len(), 2);

        session.deallocate(first);
        assert!(!session.heap().contains_key(&first));
        session.deallocate(first);
        assert_eq!(session.heap().len(), 1);
    }

    #[test]
    fn test_allocations_inside_hooks_are_not_registered() {
        let session = ShimState::default();
        let node = session.allocate(16);
        session.update_heap_info(node, "Node", |s| {
            s.allocate(64);
            "{}".to_string()
        });
        assert_eq!(session.heap().len(), 1);
        assert_eq!(session.heap()[&node].type_name, "Node");
    }

    #[test]
    fn test_heap_rendering_is_depth_bounded() {
        fn render_cycle(session: &ShimState, addr: u64, calls: &Cell<usize>) -> String {
            calls.set(calls.get() + 1);
            session.update_heap_info(addr, "Node", |s| render_cycle(s, addr, calls));
            "{\"next\": \"self\"}".to_string()
        }
        let session = ShimState::new(3);
        let node = session.allocate(16);
        let calls = Cell::new(0);
        session.update_heap_info(node, "Node", |s| render_cycle(s, node, &calls));
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn test_recursive_frames_are_disambiguated() {
        let session = ShimState::default();
        let outer = session.enter_function("fact");
        let inner = session.enter_function("fact");
        let innermost = session.enter_function("fact");
        assert_eq!(outer.label(), "fact");
        assert_eq!(inner.label(), "fact (2)");
        assert_eq!(innermost.label(), "fact (3)");
        drop(innermost);
        drop(inner);
        assert_eq!(session.call_stack(), vec!["fact"]);
    }

    #[test]
    fn test_dump_layout() {
        let session = ShimState::default();
        let _main = session.enter_function("main");
        let x = Rc::new(RefCell::new(5));
        let _x = session.trace("x", &x);
        *x.borrow_mut() = 6;

        let dump = session.dump();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines[0], VARS_START);
        assert_eq!(lines[1], "x|i32|0xf000|6|0|main|");
        assert_eq!(lines[2], VARS_END);
        assert_eq!(&lines[3..], &[STACK_START, "main", STACK_END]);
    }

    #[test]
    fn test_multiline_value_round_trips_through_demux() {
        let session = ShimState::default();
        let _main = session.enter_function("main");
        let text = Rc::new(RefCell::new("C:\\new\nline".to_string()));
        let _text = session.trace("text", &text);

        let dump = session.dump();
        assert_eq!(dump.lines().nth(1), Some("text|String|0xf000|C:\\\\new\\nline|0|main|"));

        let out = OutputDemux::new().feed(&dump);
        let variables = out.variables.unwrap();
        assert_eq!(variables[0].display_value, "C:\\new\nline");
    }

    #[test]
    fn test_dump_reconstructs_through_demux_and_graph() {
        let session = ShimState::default();
        let _main = session.enter_function("main");

        let second = session.allocate(16);
        session.update_heap_info(second, "Node", |_| "{\"val\": \"2\", \"next\": \"nullptr\"}".to_string());
        let first = session.allocate(16);
        let first_value = format!("{{\"val\": \"1\", \"next\": \"{}\"}}", format_address(second));
        session.update_heap_info(first, "Node", move |_| first_value);

        let head = Rc::new(Cell::new(first));
        let _head = session.trace_pointer("head", "Node", &head);
        let count = Rc::new(RefCell::new(2));
        let _count = session.trace("count", &count);

        let dump = session.dump();
        let mut demux = OutputDemux::new();
        // arbitrary chunking
        let mut records = None;
        for chunk in dump.as_bytes().chunks(7) {
            let out = demux.feed(std::str::from_utf8(chunk).unwrap());
            assert!(out.output.is_empty());
            if out.variables.is_some() {
                records = out.variables;
            }
        }
        let graph = graph::build(&records.unwrap());

        assert_eq!(graph.frames.len(), 1);
        let main = &graph.frames[0];
        assert_eq!(main.label, "main");
        let names: Vec<&str> = main.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["count", "head"]);
        assert_eq!(graph.heap.len(), 2);
        // head -> first, first -> second
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(graph.heap_object(&format_address(first)).unwrap().type_name, "Node");
    }
}
