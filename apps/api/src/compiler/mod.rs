//! Document compiler: resume content tree + style rules → self-contained markup.
//!
//! Compilation is pure and deterministic. The output is the sheet fragment
//! (inline `<style>`, the `<article>` body and any runtime scripts); the sandbox
//! shell adds the document skeleton around it.

pub mod escape;
pub mod handlers;
mod markup;
pub mod styles;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compiler::escape::escape_html;
use crate::compiler::markup::MarkupWriter;
use crate::compiler::styles::render_stylesheet;
use crate::models::{ResumeContent, StyleRules};

/// Maximum node nesting, fragment expansion included.
pub const MAX_DEPTH: usize = 64;

/// Styles for the structural classes the compiler itself emits, so a compiled
/// document lays out correctly without the sandbox shell.
const BASE_STYLES: &str = "\
.resume{box-sizing:border-box;padding:12mm 14mm;font-family:system-ui,-apple-system,'Segoe UI',sans-serif;line-height:1.35;color:#1a1a1a;}\n\
.resume .columns{display:flex;gap:6mm;}\n\
.resume .column{flex:1 1 0;min-width:0;}\n\
.resume .section-title{margin:4mm 0 2mm;}\n\
.resume .link-removed{text-decoration:underline dotted;}\n";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompilationError {
    #[error("Unresolved fragment reference '{name}'")]
    UnresolvedReference { name: String },

    #[error("Fragment '{name}' references itself")]
    CyclicReference { name: String },

    #[error("Content nesting exceeds {max} levels")]
    TooDeep { max: usize },

    #[error("Heading level {level} is outside 1-6")]
    InvalidHeadingLevel { level: u8 },

    #[error("Invalid dimension '{value}'")]
    InvalidDimension { value: String },

    #[error("Invalid style rule for '{selector}': {reason}")]
    InvalidStyle { selector: String, reason: String },
}

/// Whether runtime scripts are kept (preview) or stripped (export rasterization).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompileMode {
    #[default]
    Interactive,
    Static,
}

/// Compiled, self-contained sheet markup. Value-equal documents are interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompiledDocument {
    markup: String,
}

impl CompiledDocument {
    pub fn as_str(&self) -> &str {
        &self.markup
    }

    pub fn into_string(self) -> String {
        self.markup
    }
}

impl fmt::Display for CompiledDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.markup)
    }
}

/// Compiles for the interactive preview.
pub fn compile(content: &ResumeContent, rules: &StyleRules) -> Result<CompiledDocument, CompilationError> {
    compile_with(content, rules, CompileMode::Interactive)
}

pub fn compile_with(
    content: &ResumeContent,
    rules: &StyleRules,
    mode: CompileMode,
) -> Result<CompiledDocument, CompilationError> {
    let user_css = render_stylesheet(rules)?;

    let mut writer = MarkupWriter::new(&content.definitions, mode);
    writer.write_nodes(&content.nodes, 0)?;
    let (body, scripts) = writer.finish();

    let mut markup = String::with_capacity(BASE_STYLES.len() + user_css.len() + body.len() + 64);
    markup.push_str("<style data-resume-styles>\n");
    markup.push_str(BASE_STYLES);
    markup.push_str(&user_css);
    markup.push_str("</style>\n");

    markup.push_str("<article class=\"resume\"");
    if !content.title.is_empty() {
        markup.push_str(" aria-label=\"");
        markup.push_str(&escape_html(&content.title));
        markup.push('"');
    }
    markup.push_str(">\n");
    markup.push_str(&body);
    markup.push_str("</article>\n");

    for (index, script) in scripts.iter().enumerate() {
        markup.push_str(&format!(
            "<script data-resume-runtime=\"{index}\">\ntry{{\n{script}\n}}catch(e){{(window.__resumeDiagnostic||console.error)(e);}}\n</script>\n"
        ));
    }

    Ok(CompiledDocument { markup })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ListStyle, Node};

    fn sample_content() -> ResumeContent {
        let mut content = ResumeContent {
            title: "Grace Hopper".to_string(),
            nodes: vec![
                Node::heading(1, "Grace Hopper"),
                Node::section(
                    Some("Experience"),
                    vec![Node::List {
                        style: ListStyle::Bullet,
                        class: vec!["tight".to_string()],
                        items: vec![
                            Node::Item {
                                class: vec![],
                                children: vec![Node::text("Built the A-0 compiler")],
                            },
                            Node::fragment("cobol"),
                        ],
                    }],
                ),
                Node::Script {
                    source: "document.title = 'x';".to_string(),
                },
            ],
            ..Default::default()
        };
        content
            .definitions
            .insert("cobol".to_string(), vec![Node::text("Co-designed COBOL")]);
        content
    }

    #[test]
    fn test_compile_is_deterministic() {
        let content = sample_content();
        let rules = StyleRules::new()
            .declare("h1", "font-size", "22pt")
            .declare(".tight", "margin", "0");

        let first = compile(&content, &rules).unwrap();
        let second = compile(&content.clone(), &rules.clone()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_str().as_bytes(), second.as_str().as_bytes());
    }

    #[test]
    fn test_compile_structure() {
        let doc = compile(&sample_content(), &StyleRules::new()).unwrap();
        let html = doc.as_str();

        assert!(html.starts_with("<style data-resume-styles>"));
        assert!(html.contains("<article class=\"resume\" aria-label=\"Grace Hopper\">"));
        assert!(html.contains("<h1>Grace Hopper</h1>"));
        assert!(html.contains("<section><h2 class=\"section-title\">Experience</h2>"));
        assert!(html.contains("<ul class=\"tight\"><li>Built the A-0 compiler</li><li>Co-designed COBOL</li></ul>"));
        assert!(html.contains("<script data-resume-runtime=\"0\">"));
    }

    #[test]
    fn test_static_mode_strips_scripts() {
        let doc = compile_with(&sample_content(), &StyleRules::new(), CompileMode::Static).unwrap();
        assert!(!doc.as_str().contains("<script"));
        assert!(doc.as_str().contains("Co-designed COBOL"));
    }

    #[test]
    fn test_user_text_cannot_break_out() {
        let content = ResumeContent {
            nodes: vec![Node::paragraph(vec![Node::text(
                "</p></article><script>alert(1)</script>",
            )])],
            ..Default::default()
        };
        let doc = compile(&content, &StyleRules::new()).unwrap();
        assert!(!doc.as_str().contains("<script>alert"));
        assert!(doc
            .as_str()
            .contains("&lt;/p&gt;&lt;/article&gt;&lt;script&gt;alert(1)&lt;/script&gt;"));
    }

    #[test]
    fn test_script_inside_list_adds_no_item() {
        let content = ResumeContent {
            nodes: vec![Node::List {
                style: ListStyle::Numbered,
                class: vec![],
                items: vec![
                    Node::text("first"),
                    Node::Script {
                        source: "window.ready = true;".to_string(),
                    },
                    Node::text("second"),
                ],
            }],
            ..Default::default()
        };

        let doc = compile(&content, &StyleRules::new()).unwrap();
        assert!(doc.as_str().contains("<ol><li>first</li><li>second</li></ol>"));
        assert!(!doc.as_str().contains("<li></li>"));
        assert!(doc.as_str().contains("window.ready = true;"));

        let printed = compile_with(&content, &StyleRules::new(), CompileMode::Static).unwrap();
        assert!(printed.as_str().contains("<ol><li>first</li><li>second</li></ol>"));
        assert!(!printed.as_str().contains("<script"));
    }

    #[test]
    fn test_script_source_is_guarded() {
        let content = ResumeContent {
            nodes: vec![Node::Script {
                source: "var s = '</script><b>pwned</b>';".to_string(),
            }],
            ..Default::default()
        };
        let doc = compile(&content, &StyleRules::new()).unwrap();
        assert!(doc.as_str().contains("'<\\/script><b>pwned</b>'"));
        assert_eq!(doc.as_str().matches("</script>").count(), 1);
    }

    #[test]
    fn test_unsafe_links_are_dropped() {
        let content = ResumeContent {
            nodes: vec![Node::paragraph(vec![
                Node::Link {
                    href: "javascript:alert(1)".to_string(),
                    children: vec![Node::text("bad")],
                },
                Node::Link {
                    href: "https://example.com".to_string(),
                    children: vec![Node::text("good")],
                },
            ])],
            ..Default::default()
        };
        let html = compile(&content, &StyleRules::new()).unwrap().into_string();
        assert!(html.contains("<span class=\"link-removed\">bad</span>"));
        assert!(html.contains("<a href=\"https://example.com\" rel=\"noopener noreferrer\">good</a>"));
        assert!(!html.contains("javascript:"));
    }

    #[test]
    fn test_unresolved_reference_fails() {
        let content = ResumeContent {
            nodes: vec![Node::fragment("missing")],
            ..Default::default()
        };
        assert_eq!(
            compile(&content, &StyleRules::new()),
            Err(CompilationError::UnresolvedReference {
                name: "missing".to_string()
            })
        );
    }

    #[test]
    fn test_cyclic_reference_fails() {
        let mut content = ResumeContent {
            nodes: vec![Node::fragment("a")],
            ..Default::default()
        };
        content.definitions.insert("a".to_string(), vec![Node::fragment("b")]);
        content.definitions.insert("b".to_string(), vec![Node::fragment("a")]);

        let err = compile(&content, &StyleRules::new()).unwrap_err();
        assert!(matches!(err, CompilationError::CyclicReference { .. }));
    }

    #[test]
    fn test_fragment_reused_twice_is_not_a_cycle() {
        let mut content = ResumeContent {
            nodes: vec![Node::fragment("x"), Node::fragment("x")],
            ..Default::default()
        };
        content.definitions.insert("x".to_string(), vec![Node::text("x")]);
        let doc = compile(&content, &StyleRules::new()).unwrap();
        assert!(doc.as_str().contains(">\nxx</article>"));
    }

    #[test]
    fn test_too_deep_fails() {
        let mut node = Node::text("leaf");
        for _ in 0..(MAX_DEPTH + 2) {
            node = Node::Strong {
                children: vec![node],
            };
        }
        let content = ResumeContent {
            nodes: vec![node],
            ..Default::default()
        };
        assert_eq!(
            compile(&content, &StyleRules::new()),
            Err(CompilationError::TooDeep { max: MAX_DEPTH })
        );
    }

    #[test]
    fn test_invalid_heading_and_spacer() {
        let content = ResumeContent {
            nodes: vec![Node::heading(7, "nope")],
            ..Default::default()
        };
        assert_eq!(
            compile(&content, &StyleRules::new()),
            Err(CompilationError::InvalidHeadingLevel { level: 7 })
        );

        let content = ResumeContent {
            nodes: vec![Node::Spacer { height_mm: f64::NAN }],
            ..Default::default()
        };
        assert!(matches!(
            compile(&content, &StyleRules::new()),
            Err(CompilationError::InvalidDimension { .. })
        ));
    }

    #[test]
    fn test_invalid_style_fails_compile() {
        let rules = StyleRules::new().declare("p", "color", "red}</style>");
        assert!(matches!(
            compile(&ResumeContent::default(), &rules),
            Err(CompilationError::InvalidStyle { .. })
        ));
    }
}
