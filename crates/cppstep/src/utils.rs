//! Text rendering of the debugger state for the terminal

use std::fmt::Write;

use cppstep_common::{BreakpointSet, ObjectGraph, TestOutcome};

/// Variables grouped by frame, innermost frame first, then the heap.
pub fn render_variables(graph: &ObjectGraph) -> String {
    let mut out = String::new();
    for frame in &graph.frames {
        let _ = writeln!(out, "{}:", frame.label);
        for var in &frame.variables {
            let _ = write!(out, "  {} {} = {}", var.type_name, var.name, var.display_value);
            match (&var.pointee_address, &var.pointee_display_value) {
                (Some(target), Some(value)) => {
                    let _ = write!(out, "  -> {target} {value}");
                }
                (Some(target), None) => {
                    let _ = write!(out, "  -> {target}");
                }
                _ => {}
            }
            out.push('\n');
        }
    }
    if !graph.heap.is_empty() {
        out.push_str("heap:\n");
        for object in &graph.heap {
            let _ = writeln!(
                out,
                "  {} {} = {}",
                object.address, object.type_name, object.display_value
            );
        }
    }
    if out.is_empty() {
        out.push_str("no variables\n");
    }
    out
}

/// Call stack as dumped (outermost first), printed innermost first.
pub fn render_stack(stack: &[String]) -> String {
    let mut out = String::new();
    for (depth, frame) in stack.iter().rev().enumerate() {
        let _ = writeln!(out, "#{depth} {frame}");
    }
    out
}

/// Source lines around `current`, marking breakpoints with `*` and the
/// current line with `>`.
pub fn render_listing(
    source: &str,
    current: Option<u32>,
    breakpoints: &BreakpointSet,
    context: u32,
) -> String {
    let center = current.unwrap_or(1);
    let first = center.saturating_sub(context).max(1);
    let last = center.saturating_add(context);

    let mut out = String::new();
    for (line, text) in (1u32..).zip(source.lines()) {
        if line < first || line > last {
            continue;
        }
        let marker = if Some(line) == current { '>' } else { ' ' };
        let bp = if breakpoints.hits(line) { '*' } else { ' ' };
        let _ = writeln!(out, "{bp}{marker}{line:>4} | {text}");
    }
    out
}

/// One-line tally of the `EXPECT` checks, followed by every failure.
pub fn render_test_summary(tests: &[TestOutcome]) -> String {
    let passed = tests.iter().filter(|t| t.passed()).count();
    let mut out = format!("tests: {passed} passed, {} failed\n", tests.len() - passed);
    for test in tests {
        if let TestOutcome::Failed { expression, expected, actual } = test {
            let _ = writeln!(out, "  FAILED {expression}: expected {expected}, got {actual}");
        }
    }
    out
}
