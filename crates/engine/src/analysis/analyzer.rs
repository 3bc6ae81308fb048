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

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use tree_sitter::Node;

use super::{
    loops::{LoopDescriptor, LoopKind, LOOP_KINDS},
    step::INSTRUMENTABLE_KINDS,
    structs::has_user_printer,
    syntax::{children, find_descendants_by_kinds, line_of, named_children, parse},
    FunctionDescriptor, Step, StepKind, StatementBody, StructDescriptor, TrackedDeclaration,
};
use crate::EngineError;

/// Everything the instrumenter needs to know about one translation unit.
///
/// # Fields
///
/// - `functions`: function definitions that get an entry tracker
/// - `loops`: loops inside those functions
/// - `structs`: aggregates that get a generated stream printer
/// - `steps`: step announcements; statement steps are unique by offset
/// - `statement_bodies`: unbraced branch and loop bodies to wrap in braces
/// - `declarations`: local declarations that get trackers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceAnalysis {
    /// Function definitions with a compound body, in source order.
    pub functions: Vec<FunctionDescriptor>,
    /// Loops inside instrumented functions, in source order.
    pub loops: Vec<LoopDescriptor>,
    /// Printable aggregates.
    pub structs: Vec<StructDescriptor>,
    /// Step announcements.
    pub steps: Vec<Step>,
    /// Single-statement bodies that must be braced.
    pub statement_bodies: Vec<StatementBody>,
    /// Tracked local declarations.
    pub declarations: Vec<TrackedDeclaration>,
    /// Names of functions left untouched because they contain syntax errors.
    pub skipped_functions: Vec<String>,
}

impl SourceAnalysis {
    /// Lines on which execution can pause.
    pub fn breakable_lines(&self) -> BTreeSet<u32> {
        self.functions
            .iter()
            .map(|f| f.header_line)
            .chain(self.steps.iter().map(|s| s.line))
            .collect()
    }
}

/// Analyzes C++ source for instrumentation.
///
/// Syntax errors do not fail the analysis: functions whose subtree contains
/// an error are skipped and reported in [`SourceAnalysis::skipped_functions`].
pub fn analyze(source: &str) -> Result<SourceAnalysis, EngineError> {
    let tree = parse(source)?;
    let root = tree.root_node();
    let mut analyzer = Analyzer::new(source);

    for node in find_descendants_by_kinds(&root, &["function_definition"]) {
        let Some(function) = FunctionDescriptor::from_node(&node, source) else {
            continue;
        };
        if node.has_error() {
            warn!(function = %function.name, "skipping function with syntax errors");
            analyzer.analysis.skipped_functions.push(function.name);
            continue;
        }
        let Some(body) = node.child_by_field_name("body") else {
            continue;
        };
        analyzer.analyze_function(function, &body);
    }

    for node in find_descendants_by_kinds(&root, &["struct_specifier", "class_specifier"]) {
        if node.has_error() {
            continue;
        }
        let Some(descriptor) = StructDescriptor::from_node(&node, source) else {
            continue;
        };
        if has_user_printer(&root, source, &descriptor.name) {
            debug!(name = %descriptor.name, "type already has a stream printer");
            continue;
        }
        analyzer.analysis.structs.push(descriptor);
    }

    let mut analysis = analyzer.analysis;
    analysis.steps.sort_by_key(|s| s.loc);
    debug!(
        functions = analysis.functions.len(),
        loops = analysis.loops.len(),
        structs = analysis.structs.len(),
        steps = analysis.steps.len(),
        "source analyzed"
    );
    Ok(analysis)
}

/// Statement walker over function bodies.
///
/// Only statements are visited. Expressions (and therefore lambda bodies)
/// are never entered, so every step lands at statement level.
struct Analyzer<'s> {
    source: &'s str,
    analysis: SourceAnalysis,
    /// Loops and declarations of the function being walked.
    function_loops: Vec<LoopDescriptor>,
    function_declarations: Vec<TrackedDeclaration>,
}

impl<'s> Analyzer<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            analysis: SourceAnalysis::default(),
            function_loops: Vec::new(),
            function_declarations: Vec::new(),
        }
    }

    fn analyze_function(&mut self, function: FunctionDescriptor, body: &Node<'_>) {
        self.walk_block(body);

        // A loop variable is tracked inside the loop body; a second tracker
        // for the same name would shadow it.
        let loop_variables: BTreeSet<String> =
            self.function_loops.iter().filter_map(|l| l.loop_variable.clone()).collect();
        let declarations = std::mem::take(&mut self.function_declarations)
            .into_iter()
            .filter_map(|d| d.without(|name| loop_variables.contains(name)));
        self.analysis.declarations.extend(declarations);
        self.analysis.loops.append(&mut self.function_loops);
        self.analysis.functions.push(function);
    }

    /// Statement steps are unique by offset. Loop-back steps never merge:
    /// nested loops may share the offset where their bodies end.
    fn add_step(&mut self, step: Step) {
        let duplicate = step.kind == StepKind::Statement
            && self.analysis.steps.iter().any(|s| s.kind == StepKind::Statement && s.loc == step.loc);
        if !duplicate {
            self.analysis.steps.push(step);
        }
    }

    fn walk_block(&mut self, block: &Node<'_>) {
        for statement in named_children(block) {
            self.walk_statement(&statement);
        }
    }

    /// Walks the body of a branch or loop, bracing it if needed.
    fn walk_body(&mut self, body: &Node<'_>) {
        self.walk_loop_body(body, None);
    }

    /// Walks a body that repeats `loop_back` at its end, if given.
    fn walk_loop_body(&mut self, body: &Node<'_>, loop_back: Option<u32>) {
        if let Some(statement_body) = StatementBody::from_node(body) {
            let statement_body = match loop_back {
                Some(line) => statement_body.with_loop_back(line),
                None => statement_body,
            };
            self.analysis.statement_bodies.push(statement_body);
            self.walk_statement(body);
        } else {
            self.walk_block(body);
        }
    }

    fn walk_statement(&mut self, statement: &Node<'_>) {
        let kind = statement.kind();
        if INSTRUMENTABLE_KINDS.contains(&kind) {
            self.add_step(Step::statement(statement.start_byte(), line_of(statement)));
        }

        match kind {
            "compound_statement" => self.walk_block(statement),
            "declaration" => {
                if let Some(declaration) = TrackedDeclaration::from_node(statement, self.source) {
                    self.function_declarations.push(declaration);
                }
            }
            "if_statement" => {
                if let Some(consequence) = statement.child_by_field_name("consequence") {
                    self.walk_body(&consequence);
                }
                if let Some(alternative) = statement.child_by_field_name("alternative") {
                    if alternative.kind() == "else_clause" {
                        if let Some(branch) = named_children(&alternative).into_iter().last() {
                            self.walk_body(&branch);
                        }
                    } else {
                        self.walk_body(&alternative);
                    }
                }
            }
            kind if LOOP_KINDS.contains(&kind) => {
                let Some(descriptor) = LoopDescriptor::from_node(statement, self.source) else {
                    return;
                };
                let loop_back = (descriptor.kind != LoopKind::Counted).then_some(descriptor.line);
                if let Some(line) = loop_back {
                    self.add_step(Step::loop_back(descriptor.body_exit_loc(), line));
                }
                self.function_loops.push(descriptor);
                if let Some(body) = statement.child_by_field_name("body") {
                    self.walk_loop_body(&body, loop_back);
                }
            }
            "switch_statement" => {
                let Some(body) = statement.child_by_field_name("body") else {
                    return;
                };
                for case in named_children(&body).iter().filter(|c| c.kind() == "case_statement") {
                    // statements follow the `case value:` / `default:` label
                    let statements = children(case)
                        .into_iter()
                        .skip_while(|c| c.kind() != ":")
                        .skip(1)
                        .filter(|c| c.is_named());
                    for inner in statements {
                        self.walk_statement(&inner);
                    }
                }
            }
            "try_statement" => {
                if let Some(body) = statement.child_by_field_name("body") {
                    self.walk_block(&body);
                }
                for handler in named_children(statement).iter().filter(|c| c.kind() == "catch_clause")
                {
                    if let Some(body) = handler.child_by_field_name("body") {
                        self.walk_block(&body);
                    }
                }
            }
            "labeled_statement" => {
                if let Some(inner) = named_children(statement).into_iter().last() {
                    self.walk_statement(&inner);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_lines(analysis: &SourceAnalysis) -> Vec<u32> {
        analysis.steps.iter().filter(|s| s.kind == StepKind::Statement).map(|s| s.line).collect()
    }

    #[test]
    fn test_straight_line_statements() {
        let source = "int main() {\n  int x = 5;\n  x++;\n  return x;\n}\n";
        let analysis = analyze(source).unwrap();
        assert_eq!(analysis.functions.len(), 1);
        assert_eq!(step_lines(&analysis), vec![2, 3, 4]);
        assert_eq!(analysis.declarations.len(), 1);
        assert_eq!(analysis.declarations[0].names, vec!["x"]);
        assert_eq!(analysis.breakable_lines().into_iter().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_branches_are_braced() {
        let source = r#"
void f(int n) {
    if (n > 0)
        n--;
    else if (n < 0)
        n++;
    else
        return;
}
"#;
        let analysis = analyze(source).unwrap();
        let bodies: Vec<&str> =
            analysis.statement_bodies.iter().map(|b| &source[b.range.clone()]).collect();
        assert_eq!(bodies.len(), 4);
        assert_eq!(bodies[0], "n--;");
        assert!(bodies[1].starts_with("if (n < 0)"));
        assert!(bodies.contains(&"n++;"));
        assert!(bodies.contains(&"return;"));
        assert_eq!(step_lines(&analysis), vec![3, 4, 5, 6, 8]);
    }

    #[test]
    fn test_loops_and_loop_variables() {
        let source = r#"
int sum(Vector<int>& v) {
    int total = 0;
    int i;
    for (i = 0; i < 3; i++) total += i;
    for (int x : v) {
        total += x;
    }
    while (total > 100) { total /= 2; }
    return total;
}
"#;
        let analysis = analyze(source).unwrap();
        assert_eq!(analysis.loops.len(), 3);
        let names: Vec<&str> =
            analysis.declarations.iter().flat_map(|d| d.names.iter().map(String::as_str)).collect();
        assert_eq!(names, vec!["total"]);

        let loop_backs: Vec<u32> = analysis
            .steps
            .iter()
            .filter(|s| s.kind == StepKind::LoopBack)
            .map(|s| s.line)
            .collect();
        assert_eq!(loop_backs, vec![6, 9]);
        assert_eq!(analysis.statement_bodies.len(), 1);
    }

    #[test]
    fn test_switch_cases() {
        let source = r#"
void f(int c) {
    switch (c) {
        case 1:
            c++;
            break;
        default:
            c--;
    }
}
"#;
        let analysis = analyze(source).unwrap();
        assert_eq!(step_lines(&analysis), vec![3, 5, 6, 8]);
    }

    #[test]
    fn test_lambda_bodies_are_not_entered() {
        let source = "void f() {\n  auto g = [](int a) { return a; };\n  g(1);\n}\n";
        let analysis = analyze(source).unwrap();
        assert_eq!(step_lines(&analysis), vec![2, 3]);
    }

    #[test]
    fn test_functions_with_errors_are_skipped() {
        let source = "void good() { int a = 1; }\nvoid bad() { int = ; }\n";
        let analysis = analyze(source).unwrap();
        let names: Vec<&str> = analysis.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["good"]);
        assert_eq!(step_lines(&analysis), vec![1]);
    }

    #[test]
    fn test_structs_with_printers_are_skipped() {
        let source = r#"
struct A { int x; };
struct B { int y; };
ostream& operator<<(ostream& os, const B& b) { return os; }
"#;
        let analysis = analyze(source).unwrap();
        let names: Vec<&str> = analysis.structs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["A"]);
    }
}
