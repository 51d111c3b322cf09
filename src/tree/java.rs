//! Tree-sitter backed Java source trees
//!
//! Parses a file once, answers every query from that original parse, and
//! queues mutations as byte-range edits that are folded into the text when
//! `print` runs. Deleted statement spans are widened to whole lines when
//! nothing else shares them, so removals are visible in the line count of
//! the reprinted file.

use std::cell::RefCell;

use anyhow::{anyhow, Result};
use tree_sitter::{Node, Parser};

use super::{Element, MethodSig, NodeKind, SourceTree, Span};

// Tree-sitter parsers are expensive to create but reusable across files, so
// the single Java parser lives in thread-local storage.
thread_local! {
    static JAVA_PARSER: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        // Ignore error here - will be caught at parse time if language fails
        let _ = p.set_language(&tree_sitter_java::LANGUAGE.into());
        p
    });
}

#[derive(Debug, Clone)]
enum Edit {
    /// Remove a byte range of the original text.
    Delete { start: usize, end: usize },
    /// Insert text at a byte offset of the original text.
    Insert { at: usize, text: String },
    /// Replace a byte range of the original text.
    Replace { start: usize, end: usize, text: String },
}

/// One parsed Java file plus its queued edits.
pub struct JavaTree {
    text: String,
    tree: tree_sitter::Tree,
    edits: Vec<Edit>,
    /// Body spans that already received an appended return.
    appended_returns: Vec<Span>,
}

impl JavaTree {
    pub fn parse(text: String) -> Result<Self> {
        let tree = JAVA_PARSER
            .with(|p| p.borrow_mut().parse(&text, None))
            .ok_or_else(|| anyhow!("tree-sitter failed to parse Java source"))?;

        Ok(Self {
            text,
            tree,
            edits: Vec::new(),
            appended_returns: Vec::new(),
        })
    }

    fn span_of(node: &Node) -> Span {
        Span {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
        }
    }

    fn node_text(&self, node: &Node) -> &str {
        &self.text[node.start_byte()..node.end_byte()]
    }

    /// Maps a tree-sitter node kind to the closed structural enumeration.
    /// Expression-level nodes are not structural: a diagnostic on a line
    /// takes out the statement, not its sub-expressions one by one.
    fn structural_kind(kind: &str) -> Option<NodeKind> {
        match kind {
            "import_declaration" => Some(NodeKind::Import),
            "class_declaration"
            | "interface_declaration"
            | "enum_declaration"
            | "record_declaration"
            | "annotation_type_declaration" => Some(NodeKind::Class),
            "field_declaration" | "constant_declaration" => Some(NodeKind::Field),
            "method_declaration" | "constructor_declaration" => Some(NodeKind::Method),
            "marker_annotation" | "annotation" => Some(NodeKind::Annotation),
            "local_variable_declaration" => Some(NodeKind::LocalVariable),
            "expression_statement" => Some(NodeKind::ExpressionStatement),
            "return_statement" => Some(NodeKind::Return),
            "if_statement" => Some(NodeKind::If),
            "for_statement" | "enhanced_for_statement" => Some(NodeKind::For),
            "while_statement" | "do_statement" => Some(NodeKind::While),
            "try_statement" | "try_with_resources_statement" => Some(NodeKind::Try),
            "throw_statement" => Some(NodeKind::Throw),
            "switch_expression" => Some(NodeKind::Switch),
            "break_statement"
            | "continue_statement"
            | "assert_statement"
            | "labeled_statement"
            | "synchronized_statement"
            | "yield_statement" => Some(NodeKind::OtherStatement),
            _ => None,
        }
    }

    fn is_comment(kind: &str) -> bool {
        kind == "line_comment" || kind == "block_comment"
    }

    /// Whether a span is already gone under the queued deletes/replaces.
    fn is_pending_removed(&self, span: &Span) -> bool {
        self.edits.iter().any(|e| match e {
            Edit::Delete { start, end } | Edit::Replace { start, end, .. } => {
                *start <= span.start_byte && span.end_byte <= *end
            }
            Edit::Insert { .. } => false,
        })
    }

    /// Pre-order walk over every named node.
    fn walk_named<'t>(&'t self, mut visit: impl FnMut(Node<'t>)) {
        let mut cursor = self.tree.root_node().walk();
        loop {
            let node = cursor.node();
            if node.is_named() {
                visit(node);
            }

            if cursor.goto_first_child() {
                continue;
            }
            while !cursor.goto_next_sibling() {
                if !cursor.goto_parent() {
                    return;
                }
            }
        }
    }

    fn method_sig(&self, node: &Node) -> MethodSig {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.node_text(&n).to_string())
            .unwrap_or_default();

        let return_type = if node.kind() == "constructor_declaration" {
            None
        } else {
            node.child_by_field_name("type").and_then(|t| {
                if t.kind() == "void_type" {
                    None
                } else {
                    Some(self.node_text(&t).to_string())
                }
            })
        };

        let body = node.child_by_field_name("body").map(|b| Self::span_of(&b));

        MethodSig {
            name,
            return_type,
            span: Self::span_of(node),
            body,
        }
    }

    /// Surviving top-level statements of a body block, in order.
    fn surviving_statements(&self, body: &Span) -> Vec<(Span, String)> {
        let mut out = Vec::new();
        let Some(block) = self.node_at_span(body) else {
            return out;
        };

        let mut cursor = block.walk();
        for child in block.named_children(&mut cursor) {
            if Self::is_comment(child.kind()) {
                continue;
            }
            let span = Self::span_of(&child);
            if !self.is_pending_removed(&span) {
                out.push((span, child.kind().to_string()));
            }
        }
        out
    }

    /// Finds the node with exactly this byte span (used to get back from a
    /// stored body span to its block node).
    fn node_at_span(&self, span: &Span) -> Option<Node<'_>> {
        let mut found = None;
        self.walk_named(|node| {
            if found.is_none()
                && node.start_byte() == span.start_byte
                && node.end_byte() == span.end_byte
            {
                found = Some(node);
            }
        });
        found
    }

    /// Leading whitespace of the line a byte offset sits on.
    fn line_indent_at(&self, byte: usize) -> String {
        let line_start = self.text[..byte].rfind('\n').map(|i| i + 1).unwrap_or(0);
        self.text[line_start..]
            .chars()
            .take_while(|c| *c == ' ' || *c == '\t')
            .collect()
    }

    /// Widens a deletion to whole lines when the element is alone on them.
    fn widen_to_lines(&self, start: usize, end: usize) -> (usize, usize) {
        let line_start = self.text[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let prefix_blank = self.text[line_start..start]
            .chars()
            .all(|c| c == ' ' || c == '\t');

        let (line_end, suffix_blank) = match self.text[end..].find('\n') {
            Some(off) => (
                end + off + 1,
                self.text[end..end + off]
                    .chars()
                    .all(|c| matches!(c, ' ' | '\t' | '\r')),
            ),
            None => (
                self.text.len(),
                self.text[end..].chars().all(|c| matches!(c, ' ' | '\t' | '\r')),
            ),
        };

        if prefix_blank && suffix_blank {
            (line_start, line_end)
        } else {
            (start, end)
        }
    }
}

impl SourceTree for JavaTree {
    fn elements_at(&self, line: usize) -> Vec<Element> {
        let mut found = Vec::new();
        self.walk_named(|node| {
            if node.start_position().row + 1 != line {
                return;
            }
            if let Some(kind) = Self::structural_kind(node.kind()) {
                let span = Self::span_of(&node);
                if !self.is_pending_removed(&span) {
                    found.push(Element { kind, span });
                }
            }
        });
        // Pre-order walk yields ancestors first; callers expect the most
        // specific element first.
        found.reverse();
        found
    }

    fn delete(&mut self, element: &Element) {
        let (start, end) = self.widen_to_lines(element.span.start_byte, element.span.end_byte);
        self.edits.push(Edit::Delete { start, end });
    }

    fn enclosing_method(&self, line: usize) -> Option<MethodSig> {
        let mut best: Option<MethodSig> = None;
        self.walk_named(|node| {
            let kind = node.kind();
            if kind != "method_declaration" && kind != "constructor_declaration" {
                return;
            }
            let span = Self::span_of(&node);
            if !span.covers_line(line) || self.is_pending_removed(&span) {
                return;
            }
            let tighter = best
                .as_ref()
                .map(|b| span.end_byte - span.start_byte < b.span.end_byte - b.span.start_byte)
                .unwrap_or(true);
            if tighter {
                best = Some(self.method_sig(&node));
            }
        });
        best
    }

    fn methods(&self) -> Vec<MethodSig> {
        let mut out = Vec::new();
        self.walk_named(|node| {
            if node.kind() != "method_declaration" {
                return;
            }
            let span = Self::span_of(&node);
            if !self.is_pending_removed(&span) {
                out.push(self.method_sig(&node));
            }
        });
        out
    }

    fn imports(&self) -> Vec<Element> {
        let mut out = Vec::new();
        self.walk_named(|node| {
            if node.kind() != "import_declaration" {
                return;
            }
            let span = Self::span_of(&node);
            if !self.is_pending_removed(&span) {
                out.push(Element {
                    kind: NodeKind::Import,
                    span,
                });
            }
        });
        out
    }

    fn body_is_empty(&self, method: &MethodSig) -> bool {
        match &method.body {
            Some(body) => {
                self.surviving_statements(body).is_empty()
                    && !self.appended_returns.contains(body)
            }
            None => true,
        }
    }

    fn has_return(&self, method: &MethodSig) -> bool {
        let Some(body) = &method.body else {
            return false;
        };
        if self.appended_returns.contains(body) {
            return true;
        }

        // Any return at any depth counts, as long as it survives the edits.
        let mut found = false;
        self.walk_named(|node| {
            if found || node.kind() != "return_statement" {
                return;
            }
            let span = Self::span_of(&node);
            if body.contains(&span) && !self.is_pending_removed(&span) {
                found = true;
            }
        });
        found
    }

    fn has_code_after_return(&self, method: &MethodSig) -> bool {
        let Some(body) = &method.body else {
            return false;
        };
        let mut seen_return = false;
        for (_, kind) in self.surviving_statements(body) {
            if kind == "return_statement" {
                seen_return = true;
            } else if seen_return {
                return true;
            }
        }
        false
    }

    fn append_return(&mut self, method: &MethodSig, literal: &str) {
        let Some(body) = method.body else {
            return;
        };
        if body.end_byte == 0 || body.end_byte > self.text.len() {
            return;
        }

        let indent = self.line_indent_at(method.span.start_byte);
        // Walk back from the closing brace over its indentation so the new
        // statement lands on its own line.
        let bytes = self.text.as_bytes();
        let mut at = body.end_byte - 1;
        while at > body.start_byte + 1 && matches!(bytes[at - 1], b' ' | b'\t') {
            at -= 1;
        }

        let text = if at > 0 && bytes[at - 1] == b'\n' {
            format!("{}    return {};\n", indent, literal)
        } else {
            format!("\n{}    return {};\n{}", indent, literal, indent)
        };

        self.edits.push(Edit::Insert { at, text });
        self.appended_returns.push(body);
    }

    fn replace_body(&mut self, method: &MethodSig, statement: &str) {
        let Some(body) = method.body else {
            return;
        };
        let indent = self.line_indent_at(method.span.start_byte);
        let text = format!("{{\n{}    {}\n{}}}", indent, statement, indent);
        self.edits.push(Edit::Replace {
            start: body.start_byte,
            end: body.end_byte,
            text,
        });
    }

    fn modified(&self) -> bool {
        !self.edits.is_empty()
    }

    fn print(&self) -> String {
        // Merge deletions; nested and overlapping ranges collapse.
        let mut deletes: Vec<(usize, usize)> = self
            .edits
            .iter()
            .filter_map(|e| match e {
                Edit::Delete { start, end } => Some((*start, *end)),
                _ => None,
            })
            .collect();
        deletes.sort_unstable();
        let mut merged: Vec<(usize, usize)> = Vec::with_capacity(deletes.len());
        for (s, e) in deletes {
            match merged.last_mut() {
                Some((_, last_end)) if s <= *last_end => *last_end = (*last_end).max(e),
                _ => merged.push((s, e)),
            }
        }

        fn strictly_inside(at: usize, ranges: &[(usize, usize)]) -> bool {
            ranges.iter().any(|(s, e)| *s < at && at < *e)
        }
        fn intersects(start: usize, end: usize, ranges: &[(usize, usize)]) -> bool {
            ranges.iter().any(|(s, e)| start < *e && *s < end)
        }

        // (start, end, replacement); deletions are empty replacements.
        let mut ops: Vec<(usize, usize, &str)> = merged.iter().map(|(s, e)| (*s, *e, "")).collect();
        for edit in &self.edits {
            match edit {
                Edit::Replace { start, end, text } if !intersects(*start, *end, &merged) => {
                    ops.push((*start, *end, text.as_str()));
                }
                Edit::Insert { at, text } if !strictly_inside(*at, &merged) => {
                    ops.push((*at, *at, text.as_str()));
                }
                _ => {}
            }
        }

        // Back-to-front so earlier offsets stay valid; at equal starts the
        // wider op (delete/replace) applies before the insert.
        ops.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));

        let mut out = self.text.clone();
        for (start, end, replacement) in ops {
            out.replace_range(start..end, replacement);
        }
        out
    }
}
