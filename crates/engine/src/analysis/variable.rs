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

//! Local variable declarations that get a tracker.

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use super::syntax::{children_by_field, declarator_name, is_function_declarator, line_of};

/// A statement-level declaration and the names it introduces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedDeclaration {
    /// Declared names, in declaration order.
    pub names: Vec<String>,
    /// Offset right after the declaration statement, where the trackers go.
    pub loc: usize,
    /// Line of the declaration.
    pub line: u32,
}

impl TrackedDeclaration {
    /// Builds the tracked declaration of a `declaration` statement.
    ///
    /// Function prototypes and structured bindings declare nothing we can
    /// track; a declaration made only of those yields `None`.
    pub(crate) fn from_node(node: &Node<'_>, source: &str) -> Option<Self> {
        let names: Vec<String> = children_by_field(node, "declarator")
            .iter()
            .filter(|declarator| !is_function_declarator(declarator))
            .filter_map(|declarator| declarator_name(declarator, source))
            .collect();
        if names.is_empty() {
            return None;
        }
        Some(Self { names, loc: node.end_byte(), line: line_of(node) })
    }

    /// Drops the names for which `skip` holds; `None` if nothing remains.
    pub(crate) fn without(mut self, skip: impl Fn(&str) -> bool) -> Option<Self> {
        self.names.retain(|name| !skip(name));
        (!self.names.is_empty()).then_some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::syntax::{find_descendants_by_kinds, parse};

    fn declarations(source: &str) -> Vec<TrackedDeclaration> {
        let tree = parse(source).unwrap();
        find_descendants_by_kinds(&tree.root_node(), &["declaration"])
            .iter()
            .filter_map(|n| TrackedDeclaration::from_node(n, source))
            .collect()
    }

    #[test]
    fn test_declarations_with_and_without_initializers() {
        let source = "void f() {\n  int a, *b = nullptr;\n  string s;\n}";
        let found = declarations(source);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].names, vec!["a", "b"]);
        assert_eq!(found[0].line, 2);
        assert_eq!(&source[found[0].loc - 1..found[0].loc], ";");
        assert_eq!(found[1].names, vec!["s"]);
    }

    #[test]
    fn test_prototypes_and_bindings_are_not_tracked() {
        let source = "void f() { int g(int); auto [k, v] = pair; }";
        assert!(declarations(source).is_empty());
    }

    #[test]
    fn test_without_drops_names() {
        let source = "void f() { int i, j; }";
        let decl = declarations(source).remove(0);
        let kept = decl.clone().without(|name| name == "i").unwrap();
        assert_eq!(kept.names, vec!["j"]);
        assert!(decl.without(|_| true).is_none());
    }
}
