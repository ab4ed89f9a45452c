#![allow(dead_code)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Structural resume content as stored by the persistence API.
///
/// Treated as an immutable snapshot for the duration of one compile.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResumeContent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Named reusable fragments, referenced from the tree via `fragment_ref`.
    #[serde(default)]
    pub definitions: BTreeMap<String, Vec<Node>>,
}

/// Whether a list renders with numbers or bullets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListStyle {
    #[default]
    Bullet,
    Numbered,
}

/// A typed content node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Section {
        #[serde(default)]
        class: Vec<String>,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        children: Vec<Node>,
    },
    Heading {
        level: u8,
        #[serde(default)]
        class: Vec<String>,
        #[serde(default)]
        children: Vec<Node>,
    },
    Paragraph {
        #[serde(default)]
        class: Vec<String>,
        #[serde(default)]
        children: Vec<Node>,
    },
    Text {
        value: String,
    },
    Emphasis {
        #[serde(default)]
        children: Vec<Node>,
    },
    Strong {
        #[serde(default)]
        children: Vec<Node>,
    },
    Link {
        href: String,
        #[serde(default)]
        children: Vec<Node>,
    },
    List {
        #[serde(default)]
        style: ListStyle,
        #[serde(default)]
        class: Vec<String>,
        #[serde(default)]
        items: Vec<Node>,
    },
    Item {
        #[serde(default)]
        class: Vec<String>,
        #[serde(default)]
        children: Vec<Node>,
    },
    Columns {
        #[serde(default)]
        class: Vec<String>,
        #[serde(default)]
        columns: Vec<Vec<Node>>,
    },
    Divider,
    Spacer {
        height_mm: f64,
    },
    FragmentRef {
        name: String,
    },
    /// Inline code executed by the sandbox's rendering runtime. Dropped from
    /// static (export) compiles.
    Script {
        source: String,
    },
}

impl Node {
    pub fn text(value: impl Into<String>) -> Self {
        Node::Text {
            value: value.into(),
        }
    }

    pub fn paragraph(children: Vec<Node>) -> Self {
        Node::Paragraph {
            class: Vec::new(),
            children,
        }
    }

    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Node::Heading {
            level,
            class: Vec::new(),
            children: vec![Node::text(text)],
        }
    }

    pub fn section(title: Option<&str>, children: Vec<Node>) -> Self {
        Node::Section {
            class: Vec::new(),
            title: title.map(str::to_string),
            children,
        }
    }

    pub fn fragment(name: impl Into<String>) -> Self {
        Node::FragmentRef { name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_tagged_tree() {
        let content: ResumeContent = serde_json::from_value(json!({
            "title": "Ada Lovelace",
            "nodes": [
                {"type": "heading", "level": 1, "children": [{"type": "text", "value": "Ada"}]},
                {"type": "list", "style": "numbered", "items": [
                    {"type": "item", "children": [{"type": "fragment_ref", "name": "engine"}]}
                ]},
                {"type": "divider"}
            ],
            "definitions": {
                "engine": [{"type": "text", "value": "Analytical Engine"}]
            }
        }))
        .unwrap();

        assert_eq!(content.title, "Ada Lovelace");
        assert_eq!(content.nodes.len(), 3);
        assert!(matches!(
            content.nodes[1],
            Node::List {
                style: ListStyle::Numbered,
                ..
            }
        ));
        assert_eq!(content.definitions["engine"], vec![Node::text("Analytical Engine")]);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let node: Node = serde_json::from_value(json!({"type": "paragraph"})).unwrap();
        assert_eq!(node, Node::paragraph(vec![]));
    }
}
