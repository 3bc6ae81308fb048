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

use super::syntax::{children, children_by_field, declarator_name, is_keyword, line_of, node_text};

/// Node kinds that are loops.
pub(crate) const LOOP_KINDS: &[&str] =
    &["for_statement", "for_range_loop", "while_statement", "do_statement"];

/// The three loop shapes we instrument differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
pub enum LoopKind {
    /// `for (init; cond; update)`
    #[display("counted")]
    Counted,
    /// `for (decl : range)`
    #[display("range-based")]
    RangeBased,
    /// `while (cond)` and `do … while (cond)`
    #[display("conditional")]
    Conditional,
}

/// A loop inside a function body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopDescriptor {
    /// Shape of the loop.
    pub kind: LoopKind,
    /// Byte range of the loop statement.
    pub range: Range<usize>,
    /// Byte range of the body statement.
    pub body_range: Range<usize>,
    /// Whether the body is a compound statement.
    pub body_is_block: bool,
    /// Iteration variable, if the header names one.
    pub loop_variable: Option<String>,
    /// Whether a counted loop has a non-empty update clause.
    pub has_update_clause: bool,
    /// Where the iteration-boundary call goes in a counted loop: the end of
    /// the update clause, or the closing parenthesis when it is empty.
    pub update_loc: Option<usize>,
    /// Line of the loop header.
    pub line: u32,
}

impl LoopDescriptor {
    /// Builds the descriptor of a loop node; `None` if `node` is not a loop
    /// or has no body.
    pub(crate) fn from_node(node: &Node<'_>, source: &str) -> Option<Self> {
        let body = node.child_by_field_name("body")?;
        let (kind, loop_variable, has_update_clause, update_loc) = match node.kind() {
            "for_statement" => {
                let update = node.child_by_field_name("update");
                let update_loc = match update {
                    Some(update) => Some(update.end_byte()),
                    None => header_close_paren(node, &body),
                };
                let variable =
                    node.child_by_field_name("initializer").and_then(|i| initializer_name(&i, source));
                (LoopKind::Counted, variable, update.is_some(), update_loc)
            }
            "for_range_loop" => {
                let variable = node
                    .child_by_field_name("declarator")
                    .and_then(|d| declarator_name(&d, source));
                (LoopKind::RangeBased, variable, false, None)
            }
            "while_statement" | "do_statement" => (LoopKind::Conditional, None, false, None),
            _ => return None,
        };

        Some(Self {
            kind,
            range: node.start_byte()..node.end_byte(),
            body_range: body.start_byte()..body.end_byte(),
            body_is_block: body.kind() == "compound_statement",
            loop_variable,
            has_update_clause,
            update_loc,
            line: line_of(node),
        })
    }

    /// Where code that must run at the top of every iteration goes.
    pub fn body_entry_loc(&self) -> usize {
        if self.body_is_block {
            self.body_range.start + 1
        } else {
            self.body_range.start
        }
    }

    /// Where code that must run at the bottom of every iteration goes.
    pub fn body_exit_loc(&self) -> usize {
        if self.body_is_block {
            self.body_range.end - 1
        } else {
            self.body_range.end
        }
    }
}

/// The `)` closing a `for` header, found as the last `)` token before the body.
fn header_close_paren(node: &Node<'_>, body: &Node<'_>) -> Option<usize> {
    children(node)
        .into_iter()
        .filter(|c| c.kind() == ")" && c.end_byte() <= body.start_byte())
        .last()
        .map(|c| c.start_byte())
}

/// Name of the variable introduced or assigned by a `for` initializer.
fn initializer_name(initializer: &Node<'_>, source: &str) -> Option<String> {
    match initializer.kind() {
        "declaration" => children_by_field(initializer, "declarator")
            .first()
            .and_then(|d| declarator_name(d, source)),
        "assignment_expression" => {
            let left = initializer.child_by_field_name("left")?;
            let name = node_text(&left, source);
            (left.kind() == "identifier" && !is_keyword(name)).then(|| name.to_string())
        }
        "comma_expression" => {
            initializer.child_by_field_name("left").and_then(|l| initializer_name(&l, source))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::syntax::{find_descendants_by_kinds, parse};

    fn loops(source: &str) -> Vec<LoopDescriptor> {
        let tree = parse(source).unwrap();
        find_descendants_by_kinds(&tree.root_node(), LOOP_KINDS)
            .iter()
            .filter_map(|n| LoopDescriptor::from_node(n, source))
            .collect()
    }

    #[test]
    fn test_counted_loop() {
        let source = "void f() { for (int i = 0; i < 3; i++) { g(i); } }";
        let found = loops(source);
        assert_eq!(found.len(), 1);
        let lp = &found[0];
        assert_eq!(lp.kind, LoopKind::Counted);
        assert_eq!(lp.loop_variable.as_deref(), Some("i"));
        assert!(lp.has_update_clause);
        assert_eq!(&source[..lp.update_loc.unwrap()], "void f() { for (int i = 0; i < 3; i++");
        assert!(lp.body_is_block);
    }

    #[test]
    fn test_counted_loop_without_update() {
        let source = "void f() { for (i = 0; i < 3;) i++; }";
        let lp = &loops(source)[0];
        assert_eq!(lp.loop_variable.as_deref(), Some("i"));
        assert!(!lp.has_update_clause);
        assert_eq!(&source[lp.update_loc.unwrap()..lp.update_loc.unwrap() + 1], ")");
        assert!(!lp.body_is_block);
        assert_eq!(lp.body_exit_loc(), lp.body_range.end);
    }

    #[test]
    fn test_range_and_conditional_loops() {
        let source = r#"
void f(Vector<int>& v) {
    for (auto& x : v) { g(x); }
    while (n > 0) n--;
    do { n++; } while (n < 3);
}
"#;
        let found = loops(source);
        let kinds: Vec<LoopKind> = found.iter().map(|l| l.kind).collect();
        assert_eq!(kinds, vec![LoopKind::RangeBased, LoopKind::Conditional, LoopKind::Conditional]);
        assert_eq!(found[0].loop_variable.as_deref(), Some("x"));
        assert_eq!(found[1].loop_variable, None);
        assert_eq!(found[0].line, 3);
    }

    #[test]
    fn test_structured_binding_has_no_variable() {
        let source = "void f() { for (auto [k, v] : m) { g(k); } }";
        assert_eq!(loops(source)[0].loop_variable, None);
    }
}
