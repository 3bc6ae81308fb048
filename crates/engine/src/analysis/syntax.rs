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

//! Thin helpers over the tree-sitter C++ grammar.

use tree_sitter::{Node, Parser, Tree};

use crate::EngineError;

/// Words that can never name a variable or function we track.
const KEYWORDS: &[&str] = &[
    "if", "while", "for", "switch", "catch", "else", "struct", "class", "return", "break",
    "continue", "case", "default", "true", "false", "nullptr", "this", "new", "delete", "sizeof",
    "operator", "do", "try", "throw", "auto", "const", "static", "void",
];

/// Parses C++ source into a concrete syntax tree.
///
/// tree-sitter recovers from syntax errors, so a tree is returned for almost
/// any input; callers check [`Node::has_error`] where it matters.
pub fn parse(source: &str) -> Result<Tree, EngineError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_cpp::language())
        .map_err(|e| EngineError::ParseFailure(format!("failed to load C++ grammar: {e}")))?;
    parser
        .parse(source, None)
        .ok_or_else(|| EngineError::ParseFailure("parser produced no tree".to_string()))
}

/// Whether `name` is a reserved word.
pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// Source text covered by a node.
#[inline]
pub fn node_text<'s>(node: &Node<'_>, source: &'s str) -> &'s str {
    &source[node.start_byte()..node.end_byte()]
}

/// 1-based line on which a node starts.
#[inline]
pub fn line_of(node: &Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

/// Named children of a node, in source order.
pub fn named_children<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
    (0..node.named_child_count()).filter_map(|i| node.named_child(i)).collect()
}

/// All children (named or not) of a node, in source order.
pub fn children<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
    (0..node.child_count()).filter_map(|i| node.child(i)).collect()
}

/// All children stored under a field, e.g. every `declarator` of `int a, b;`.
pub fn children_by_field<'t>(node: &Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

/// Descendants (including the node itself) whose kind is in `kinds`, in
/// pre-order.
pub fn find_descendants_by_kinds<'t>(node: &Node<'t>, kinds: &[&str]) -> Vec<Node<'t>> {
    let mut result = Vec::new();
    let mut stack = vec![*node];
    while let Some(current) = stack.pop() {
        if kinds.contains(&current.kind()) {
            result.push(current);
        }
        for i in (0..current.child_count()).rev() {
            if let Some(child) = current.child(i) {
                stack.push(child);
            }
        }
    }
    result
}

/// Whether any ancestor of `node` has one of the given kinds.
pub fn has_ancestor(node: &Node<'_>, kinds: &[&str]) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if kinds.contains(&parent.kind()) {
            return true;
        }
        current = parent.parent();
    }
    false
}

/// Extracts the declared name from a declarator.
///
/// Walks through init, pointer, reference, array and parenthesized
/// declarators down to the identifier. Returns `None` for function
/// declarators, structured bindings and abstract (unnamed) declarators.
pub fn declarator_name(node: &Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "identifier" | "field_identifier" => {
            let name = node_text(node, source);
            (!is_keyword(name)).then(|| name.to_string())
        }
        "init_declarator"
        | "pointer_declarator"
        | "reference_declarator"
        | "array_declarator"
        | "parenthesized_declarator"
        | "attributed_declarator" => {
            if let Some(inner) = node.child_by_field_name("declarator") {
                return declarator_name(&inner, source);
            }
            // reference declarators keep their inner declarator unnamed
            named_children(node).iter().find_map(|child| declarator_name(child, source))
        }
        _ => None,
    }
}

/// Whether a declarator declares a function rather than an object.
pub fn is_function_declarator(node: &Node<'_>) -> bool {
    let mut current = Some(*node);
    while let Some(n) = current {
        match n.kind() {
            "function_declarator" => return true,
            "identifier" | "field_identifier" | "init_declarator" => return false,
            _ => current = n.child_by_field_name("declarator"),
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first<'t>(tree: &'t Tree, kind: &str) -> Node<'t> {
        find_descendants_by_kinds(&tree.root_node(), &[kind])[0]
    }

    #[test]
    fn test_declarator_names() {
        let source = "void f() { int a = 1, *p = nullptr; int& r = a; int arr[3]; }";
        let tree = parse(source).unwrap();
        let decls = find_descendants_by_kinds(&tree.root_node(), &["declaration"]);
        let names: Vec<String> = decls
            .iter()
            .flat_map(|d| children_by_field(d, "declarator"))
            .filter_map(|d| declarator_name(&d, source))
            .collect();
        assert_eq!(names, vec!["a", "p", "r", "arr"]);
    }

    #[test]
    fn test_function_prototype_is_detected() {
        let source = "void f() { int g(int); }";
        let tree = parse(source).unwrap();
        let decl = first(&tree, "declaration");
        let declarator = decl.child_by_field_name("declarator").unwrap();
        assert!(is_function_declarator(&declarator));
    }

    #[test]
    fn test_line_of_is_one_based() {
        let source = "\nint main() {\n  return 0;\n}\n";
        let tree = parse(source).unwrap();
        assert_eq!(line_of(&first(&tree, "function_definition")), 2);
        assert_eq!(line_of(&first(&tree, "return_statement")), 3);
    }

    #[test]
    fn test_keywords() {
        assert!(is_keyword("return"));
        assert!(is_keyword("nullptr"));
        assert!(!is_keyword("value"));
    }
}
