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

use super::syntax::{children_by_field, declarator_name, is_keyword, line_of, named_children, node_text};

const PARAMETER_KINDS: &[&str] =
    &["parameter_declaration", "optional_parameter_declaration", "variadic_parameter_declaration"];

/// A function definition with a compound body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    /// Name as written, e.g. `main`, `List::push` or `operator<<`.
    pub name: String,
    /// Byte range of the body, braces included.
    pub body_range: Range<usize>,
    /// Names of the named parameters, in declaration order.
    pub parameter_names: Vec<String>,
    /// Line of the function header.
    pub header_line: u32,
}

impl FunctionDescriptor {
    /// Builds the descriptor of a `function_definition` node.
    ///
    /// Returns `None` for definitions without a compound body (`= default`,
    /// function-try-blocks) and for declarators we cannot name.
    pub(crate) fn from_node(node: &Node<'_>, source: &str) -> Option<Self> {
        let body = node.child_by_field_name("body")?;
        if body.kind() != "compound_statement" {
            return None;
        }

        let declarator = function_declarator(node)?;
        let name = node_text(&declarator.child_by_field_name("declarator")?, source).trim();
        if name.is_empty() || is_keyword(name) {
            return None;
        }

        let mut parameter_names: Vec<String> = Vec::new();
        if let Some(parameters) = declarator.child_by_field_name("parameters") {
            for parameter in named_children(&parameters) {
                if !PARAMETER_KINDS.contains(&parameter.kind()) {
                    continue;
                }
                let names = children_by_field(&parameter, "declarator")
                    .into_iter()
                    .filter_map(|d| declarator_name(&d, source));
                for name in names {
                    if !parameter_names.contains(&name) {
                        parameter_names.push(name);
                    }
                }
            }
        }

        Some(Self {
            name: name.to_string(),
            body_range: body.start_byte()..body.end_byte(),
            parameter_names,
            header_line: line_of(node),
        })
    }

    /// Offset right after the body's opening brace.
    pub fn entry_loc(&self) -> usize {
        self.body_range.start + 1
    }
}

/// Finds the `function_declarator` of a definition, looking through pointer
/// and reference return types (`Node* make()`, `int& at(int)`).
fn function_declarator<'t>(node: &Node<'t>) -> Option<Node<'t>> {
    let mut current = node.child_by_field_name("declarator")?;
    loop {
        if current.kind() == "function_declarator" {
            return Some(current);
        }
        current = match current.child_by_field_name("declarator") {
            Some(inner) => inner,
            None => named_children(&current)
                .into_iter()
                .find(|c| c.kind().ends_with("declarator"))?,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::syntax::{find_descendants_by_kinds, parse};

    fn functions(source: &str) -> Vec<FunctionDescriptor> {
        let tree = parse(source).unwrap();
        find_descendants_by_kinds(&tree.root_node(), &["function_definition"])
            .iter()
            .filter_map(|n| FunctionDescriptor::from_node(n, source))
            .collect()
    }

    #[test]
    fn test_parameters_through_declarators() {
        let source = "int sum(const Vector<int>& v, int* out, int n = 3, int) { return 0; }";
        let found = functions(source);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "sum");
        assert_eq!(found[0].parameter_names, vec!["v", "out", "n"]);
        assert_eq!(&source[found[0].body_range.clone()], "{ return 0; }");
    }

    #[test]
    fn test_pointer_return_and_methods() {
        let source = r#"
struct List {
    int size() const { return 0; }
};
Node* make(int v) { return nullptr; }
int List::count() { return 1; }
"#;
        let names: Vec<String> = functions(source).into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["size", "make", "List::count"]);
    }

    #[test]
    fn test_defaulted_function_is_skipped() {
        let source = "struct S { S() = default; };";
        assert!(functions(source).is_empty());
    }

    #[test]
    fn test_header_line() {
        let source = "\n\nint main()\n{\n}\n";
        assert_eq!(functions(source)[0].header_line, 3);
    }
}
