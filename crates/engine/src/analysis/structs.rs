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
use tree_sitter::Node;

use super::syntax::{
    children, children_by_field, declarator_name, find_descendants_by_kinds, has_ancestor,
    is_function_declarator, named_children, node_text,
};

/// Aggregates we can print from namespace scope: not templated, not local to
/// a function, not nested in another class, not inside a namespace.
const UNPRINTABLE_SCOPES: &[&str] = &[
    "template_declaration",
    "function_definition",
    "field_declaration_list",
    "namespace_definition",
    "compound_statement",
];

/// A data member of an aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Member name.
    pub name: String,
    /// Declared type, without the declarator's `*`.
    pub type_name: String,
    /// Whether the member is a pointer.
    pub is_pointer: bool,
    /// For pointers, the type pointed to.
    pub pointee_type: Option<String>,
}

/// A struct or class that gets a generated stream printer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructDescriptor {
    /// Type name.
    pub name: String,
    /// Data members in declaration order.
    pub fields: Vec<FieldDescriptor>,
    /// Where the printer prototype can be declared: right after the
    /// declaration that defines the type.
    pub prototype_loc: Option<usize>,
}

impl StructDescriptor {
    /// Builds the descriptor of a `struct_specifier`/`class_specifier` node.
    pub(crate) fn from_node(node: &Node<'_>, source: &str) -> Option<Self> {
        let name_node = node.child_by_field_name("name")?;
        if name_node.kind() != "type_identifier" || has_ancestor(node, UNPRINTABLE_SCOPES) {
            return None;
        }
        let body = node.child_by_field_name("body")?;

        let fields: Vec<FieldDescriptor> = named_children(&body)
            .iter()
            .filter(|member| member.kind() == "field_declaration" && !is_static(member, source))
            .flat_map(|member| field_descriptors(member, source))
            .collect();
        if fields.is_empty() {
            return None;
        }

        Some(Self {
            name: node_text(&name_node, source).to_string(),
            fields,
            prototype_loc: declaration_end(node),
        })
    }
}

fn is_static(member: &Node<'_>, source: &str) -> bool {
    children(member)
        .iter()
        .any(|c| c.kind() == "storage_class_specifier" && node_text(c, source) == "static")
}

fn field_descriptors(member: &Node<'_>, source: &str) -> Vec<FieldDescriptor> {
    let Some(type_node) = member.child_by_field_name("type") else {
        return Vec::new();
    };
    let type_name = node_text(&type_node, source).trim().to_string();

    children_by_field(member, "declarator")
        .iter()
        .filter(|declarator| !is_function_declarator(declarator))
        .filter_map(|declarator| {
            let name = declarator_name(declarator, source)?;
            let is_pointer = declarator.kind() == "pointer_declarator";
            let pointee_type = is_pointer.then(|| pointee_type(&type_name, declarator));
            Some(FieldDescriptor { name, type_name: type_name.clone(), is_pointer, pointee_type })
        })
        .collect()
}

/// `Node* next` points to `Node`; `Node** slots` points to `Node*`.
fn pointee_type(type_name: &str, declarator: &Node<'_>) -> String {
    let mut pointee = type_name.to_string();
    let mut inner = declarator.child_by_field_name("declarator");
    while let Some(node) = inner {
        if node.kind() != "pointer_declarator" {
            break;
        }
        pointee.push('*');
        inner = node.child_by_field_name("declarator");
    }
    pointee
}

/// End of the `struct X { … };` declaration, i.e. just past its semicolon.
fn declaration_end(node: &Node<'_>) -> Option<usize> {
    if let Some(next) = node.next_sibling() {
        if next.kind() == ";" {
            return Some(next.end_byte());
        }
    }
    let parent = node.parent()?;
    matches!(parent.kind(), "declaration" | "type_definition").then(|| parent.end_byte())
}

/// Whether the program already streams `name` itself, in which case a
/// generated printer would be a redefinition.
pub(crate) fn has_user_printer(root: &Node<'_>, source: &str, name: &str) -> bool {
    find_descendants_by_kinds(root, &["function_declarator"]).iter().any(|declarator| {
        let Some(callee) = declarator.child_by_field_name("declarator") else {
            return false;
        };
        if node_text(&callee, source).replace(' ', "") != "operator<<" {
            return false;
        }
        declarator.child_by_field_name("parameters").is_some_and(|params| {
            node_text(&params, source)
                .split(|c: char| !(c.is_alphanumeric() || c == '_'))
                .any(|word| word == name)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::syntax::parse;

    fn structs(source: &str) -> Vec<StructDescriptor> {
        let tree = parse(source).unwrap();
        find_descendants_by_kinds(&tree.root_node(), &["struct_specifier", "class_specifier"])
            .iter()
            .filter_map(|n| StructDescriptor::from_node(n, source))
            .collect()
    }

    #[test]
    fn test_linked_list_node() {
        let source = "struct Node {\n    int val;\n    Node* next;\n    int sum() const;\n};\n";
        let found = structs(source);
        assert_eq!(found.len(), 1);
        let node = &found[0];
        assert_eq!(node.name, "Node");
        let names: Vec<&str> = node.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["val", "next"]);
        assert!(!node.fields[0].is_pointer);
        assert!(node.fields[1].is_pointer);
        assert_eq!(node.fields[1].pointee_type.as_deref(), Some("Node"));
        assert_eq!(&source[..node.prototype_loc.unwrap()], source.trim_end());
    }

    #[test]
    fn test_multiple_declarators_and_static_members() {
        let source = "class Point { public: int x, y; static int count; Point** grid; };";
        let point = &structs(source)[0];
        let names: Vec<&str> = point.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y", "grid"]);
        assert_eq!(point.fields[2].pointee_type.as_deref(), Some("Point*"));
    }

    #[test]
    fn test_unprintable_aggregates_are_skipped() {
        let source = r#"
template <typename T> struct Box { T value; };
namespace ds { struct Inner { int a; }; }
struct Empty {};
void f() { struct Local { int a; }; }
"#;
        assert!(structs(source).is_empty());
    }

    #[test]
    fn test_existing_printer_is_detected() {
        let source = r#"
struct P { int x; };
ostream& operator<<(ostream& os, const P& p) { return os << p.x; }
"#;
        let tree = parse(source).unwrap();
        assert!(has_user_printer(&tree.root_node(), source, "P"));
        assert!(!has_user_printer(&tree.root_node(), source, "Q"));
    }
}
