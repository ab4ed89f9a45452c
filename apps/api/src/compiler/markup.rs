//! Walks the content tree and writes escaped markup.

use std::collections::BTreeMap;

use crate::compiler::escape::{class_attr, escape_html, guard_script, safe_href};
use crate::compiler::{CompilationError, CompileMode, MAX_DEPTH};
use crate::models::{ListStyle, Node};

const MAX_SPACER_MM: f64 = 297.0;

pub(crate) struct MarkupWriter<'a> {
    definitions: &'a BTreeMap<String, Vec<Node>>,
    mode: CompileMode,
    out: String,
    scripts: Vec<String>,
    /// Fragment names currently being expanded, outermost first.
    expanding: Vec<&'a str>,
}

impl<'a> MarkupWriter<'a> {
    pub(crate) fn new(definitions: &'a BTreeMap<String, Vec<Node>>, mode: CompileMode) -> Self {
        Self {
            definitions,
            mode,
            out: String::new(),
            scripts: Vec::new(),
            expanding: Vec::new(),
        }
    }

    /// Returns `(body_markup, runtime_scripts)`.
    pub(crate) fn finish(self) -> (String, Vec<String>) {
        (self.out, self.scripts)
    }

    pub(crate) fn write_nodes(&mut self, nodes: &'a [Node], depth: usize) -> Result<(), CompilationError> {
        for node in nodes {
            self.write_node(node, depth)?;
        }
        Ok(())
    }

    fn write_node(&mut self, node: &'a Node, depth: usize) -> Result<(), CompilationError> {
        if depth > MAX_DEPTH {
            return Err(CompilationError::TooDeep { max: MAX_DEPTH });
        }
        let next = depth + 1;

        match node {
            Node::Section {
                class,
                title,
                children,
            } => {
                self.open("section", class);
                if let Some(title) = title {
                    self.out.push_str("<h2 class=\"section-title\">");
                    self.out.push_str(&escape_html(title));
                    self.out.push_str("</h2>");
                }
                self.write_nodes(children, next)?;
                self.out.push_str("</section>\n");
            }
            Node::Heading {
                level,
                class,
                children,
            } => {
                if !(1..=6).contains(level) {
                    return Err(CompilationError::InvalidHeadingLevel { level: *level });
                }
                let tag = format!("h{level}");
                self.open(&tag, class);
                self.write_nodes(children, next)?;
                self.close(&tag);
                self.out.push('\n');
            }
            Node::Paragraph { class, children } => {
                self.open("p", class);
                self.write_nodes(children, next)?;
                self.out.push_str("</p>\n");
            }
            Node::Text { value } => self.out.push_str(&escape_html(value)),
            Node::Emphasis { children } => {
                self.out.push_str("<em>");
                self.write_nodes(children, next)?;
                self.out.push_str("</em>");
            }
            Node::Strong { children } => {
                self.out.push_str("<strong>");
                self.write_nodes(children, next)?;
                self.out.push_str("</strong>");
            }
            Node::Link { href, children } => match safe_href(href) {
                Some(href) => {
                    self.out.push_str("<a href=\"");
                    self.out.push_str(&href);
                    self.out.push_str("\" rel=\"noopener noreferrer\">");
                    self.write_nodes(children, next)?;
                    self.out.push_str("</a>");
                }
                None => {
                    self.out.push_str("<span class=\"link-removed\">");
                    self.write_nodes(children, next)?;
                    self.out.push_str("</span>");
                }
            },
            Node::List {
                style,
                class,
                items,
            } => {
                let tag = match style {
                    ListStyle::Bullet => "ul",
                    ListStyle::Numbered => "ol",
                };
                self.open(tag, class);
                for item in items {
                    match item {
                        Node::Item { .. } => self.write_node(item, next)?,
                        // Scripts emit no markup; wrapping them would leave an empty bullet.
                        Node::Script { .. } => self.write_node(item, next)?,
                        other => {
                            self.out.push_str("<li>");
                            self.write_node(other, next + 1)?;
                            self.out.push_str("</li>");
                        }
                    }
                }
                self.close(tag);
                self.out.push('\n');
            }
            Node::Item { class, children } => {
                self.open("li", class);
                self.write_nodes(children, next)?;
                self.out.push_str("</li>");
            }
            Node::Columns { class, columns } => {
                let mut classes = vec!["columns".to_string()];
                classes.extend(class.iter().cloned());
                self.open("div", &classes);
                for column in columns {
                    self.out.push_str("<div class=\"column\">");
                    self.write_nodes(column, next + 1)?;
                    self.out.push_str("</div>");
                }
                self.out.push_str("</div>\n");
            }
            Node::Divider => self.out.push_str("<hr>\n"),
            Node::Spacer { height_mm } => {
                if !height_mm.is_finite() || *height_mm < 0.0 || *height_mm > MAX_SPACER_MM {
                    return Err(CompilationError::InvalidDimension {
                        value: height_mm.to_string(),
                    });
                }
                self.out.push_str(&format!(
                    "<div class=\"spacer\" style=\"height:{height_mm}mm\"></div>\n"
                ));
            }
            Node::FragmentRef { name } => self.expand_fragment(name, next)?,
            Node::Script { source } => {
                if self.mode == CompileMode::Interactive {
                    self.scripts.push(guard_script(source));
                }
            }
        }
        Ok(())
    }

    fn expand_fragment(&mut self, name: &'a str, depth: usize) -> Result<(), CompilationError> {
        if self.expanding.contains(&name) {
            return Err(CompilationError::CyclicReference {
                name: name.to_string(),
            });
        }
        let nodes = self
            .definitions
            .get(name)
            .ok_or_else(|| CompilationError::UnresolvedReference {
                name: name.to_string(),
            })?;

        self.expanding.push(name);
        let result = self.write_nodes(nodes, depth);
        self.expanding.pop();
        result
    }

    fn open(&mut self, tag: &str, class: &[String]) {
        self.out.push('<');
        self.out.push_str(tag);
        self.out.push_str(&class_attr(class));
        self.out.push('>');
    }

    fn close(&mut self, tag: &str) {
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push('>');
    }
}
