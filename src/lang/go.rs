//! Go language support.
//!
//! Thin layer over `tree-sitter-go` providing what the checker needs from Go
//! syntax:
//! - Parsing with syntax-error detection
//! - Package clause and import extraction
//! - Field comments (leading doc comments and trailing line comments)
//! - Struct tag decoding with `reflect.StructTag` lookup rules

use tree_sitter::{Node, Parser, Tree};

use crate::error::{CheckError, Result};

/// Go language implementation.
pub struct Go;

/// A single import spec: `import alias "path"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    /// Explicit alias, `_` for blank imports, `.` for dot imports.
    pub alias: Option<String>,
    /// Import path without quotes.
    pub path: String,
    /// 1-indexed line of the spec.
    pub line_number: usize,
}

/// Safely decode bytes to UTF-8 string, replacing invalid sequences.
#[inline]
pub fn node_text<'a>(source: &'a [u8], node: Node) -> &'a str {
    let bytes = &source[node.start_byte()..node.end_byte()];
    std::str::from_utf8(bytes).unwrap_or("")
}

impl Go {
    /// Create a parser with the Go grammar loaded.
    pub fn parser(&self) -> Result<Parser> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_go::LANGUAGE.into())
            .map_err(|e| CheckError::TreeSitter(e.to_string()))?;
        Ok(parser)
    }

    /// Parse a Go source file.
    ///
    /// Tree-sitter recovers from syntax errors, so a returned tree may still
    /// contain `ERROR` or `MISSING` nodes; see [`Go::first_syntax_error`].
    pub fn parse(&self, parser: &mut Parser, source: &str) -> Result<Tree> {
        parser
            .parse(source, None)
            .ok_or_else(|| CheckError::TreeSitter("parser returned no tree".to_string()))
    }

    /// Find the first `ERROR` or `MISSING` node in pre-order.
    pub fn first_syntax_error<'t>(&self, tree: &'t Tree) -> Option<Node<'t>> {
        let root = tree.root_node();
        if !root.has_error() {
            return None;
        }

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.is_error() || node.is_missing() {
                return Some(node);
            }
            if !node.has_error() {
                continue;
            }
            let mut cursor = node.walk();
            let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
            // Reverse so the leftmost child is popped first.
            stack.extend(children.into_iter().rev());
        }

        // has_error() was set but no node matched; report the root.
        Some(root)
    }

    /// Extract the package name from the `package` clause.
    pub fn package_name(&self, tree: &Tree, source: &[u8]) -> Option<String> {
        let root = tree.root_node();
        let mut cursor = root.walk();
        let clause = root
            .children(&mut cursor)
            .find(|c| c.kind() == "package_clause")?;

        let mut inner = clause.walk();
        let ident = clause
            .children(&mut inner)
            .find(|c| c.kind() == "package_identifier")?;
        Some(node_text(source, ident).to_string())
    }

    /// Extract all import specs of a file.
    pub fn imports(&self, tree: &Tree, source: &[u8]) -> Vec<ImportSpec> {
        let mut imports = Vec::new();
        let root = tree.root_node();
        let mut cursor = root.walk();

        for child in root.children(&mut cursor) {
            if child.kind() == "import_declaration" {
                self.extract_import_declaration(child, source, &mut imports);
            }
        }

        imports
    }

    /// Extract import declarations, single and grouped.
    fn extract_import_declaration(&self, node: Node, source: &[u8], imports: &mut Vec<ImportSpec>) {
        let mut cursor = node.walk();

        for child in node.children(&mut cursor) {
            match child.kind() {
                "import_spec" => {
                    if let Some(import) = self.extract_import_spec(child, source) {
                        imports.push(import);
                    }
                }
                "import_spec_list" => {
                    let mut inner_cursor = child.walk();
                    for inner_child in child.children(&mut inner_cursor) {
                        if inner_child.kind() == "import_spec" {
                            if let Some(import) = self.extract_import_spec(inner_child, source) {
                                imports.push(import);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Extract a single import spec.
    fn extract_import_spec(&self, node: Node, source: &[u8]) -> Option<ImportSpec> {
        let mut alias: Option<String> = None;
        let mut path: Option<String> = None;
        let mut cursor = node.walk();

        for child in node.children(&mut cursor) {
            match child.kind() {
                "package_identifier" => {
                    alias = Some(node_text(source, child).to_string());
                }
                "interpreted_string_literal" | "raw_string_literal" => {
                    let text = node_text(source, child);
                    path = Some(text.trim_matches(|c| c == '"' || c == '`').to_string());
                }
                "blank_identifier" => {
                    alias = Some("_".to_string());
                }
                "dot" => {
                    alias = Some(".".to_string());
                }
                _ => {}
            }
        }

        Some(ImportSpec {
            alias,
            path: path?,
            line_number: node.start_position().row + 1,
        })
    }

    /// Get the leading doc comment of a declaration.
    ///
    /// Comments must be immediately adjacent (no blank lines) and must not be
    /// the trailing comment of the previous declaration on its line.
    pub fn doc_comment(&self, node: Node, source: &[u8]) -> Option<String> {
        let mut comments = Vec::new();
        // Row the next comment (walking backwards) must end on.
        let mut expected_end_row = node.start_position().row;
        let mut current = node.prev_sibling();

        while let Some(sibling) = current {
            if sibling.kind() != "comment" {
                break;
            }
            if sibling.end_position().row + 1 != expected_end_row {
                break;
            }
            if let Some(before) = sibling.prev_sibling() {
                if before.kind() != "comment"
                    && before.end_position().row == sibling.start_position().row
                {
                    // Line comment of the previous declaration.
                    break;
                }
            }
            comments.push(strip_comment_markers(node_text(source, sibling)).to_string());
            expected_end_row = sibling.start_position().row;
            current = sibling.prev_sibling();
        }

        if comments.is_empty() {
            None
        } else {
            comments.reverse();
            Some(comments.join("\n"))
        }
    }

    /// Get the comment trailing a declaration on its last line.
    pub fn trailing_comment(&self, node: Node, source: &[u8]) -> Option<String> {
        let end_row = node.end_position().row;
        let mut comments = Vec::new();

        // Depending on terminators the comment can be attached inside the node.
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "comment" && child.start_position().row == end_row {
                comments.push(strip_comment_markers(node_text(source, child)).to_string());
            }
        }

        let mut current = node.next_sibling();

        while let Some(sibling) = current {
            if sibling.kind() != "comment" || sibling.start_position().row != end_row {
                break;
            }
            comments.push(strip_comment_markers(node_text(source, sibling)).to_string());
            current = sibling.next_sibling();
        }

        if comments.is_empty() {
            None
        } else {
            Some(comments.join(" "))
        }
    }

    /// Decode the struct tag of a `field_declaration`, if any.
    pub fn struct_tag(&self, field: Node, source: &[u8]) -> Option<StructTag> {
        let tag = field.child_by_field_name("tag")?;
        let text = node_text(source, tag);
        let body = match tag.kind() {
            "raw_string_literal" => text.trim_matches('`').to_string(),
            "interpreted_string_literal" => unquote(text)?,
            _ => return None,
        };
        Some(StructTag(body))
    }
}

/// Remove `//` or `/* */` delimiters from comment text.
fn strip_comment_markers(text: &str) -> &str {
    if let Some(line) = text.strip_prefix("//") {
        return line.trim();
    }
    text.strip_prefix("/*")
        .and_then(|t| t.strip_suffix("*/"))
        .unwrap_or(text)
        .trim()
}

/// Unquote a Go interpreted string literal (`"..."`).
///
/// Supports the escapes that realistically appear in struct tags; unknown
/// escapes are kept verbatim.
fn unquote(text: &str) -> Option<String> {
    let inner = text.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }

    Some(out)
}

/// Go struct tag content, e.g. `json:"id" immutable:"true"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructTag(pub String);

impl StructTag {
    /// Look up `key` following `reflect.StructTag.Lookup`.
    ///
    /// Scanning stops at the first malformed pair, exactly like the Go
    /// runtime, so keys after a syntax error are never seen.
    pub fn lookup(&self, key: &str) -> Option<String> {
        let mut tag = self.0.as_str();

        while !tag.is_empty() {
            tag = tag.trim_start_matches(' ');
            if tag.is_empty() {
                break;
            }

            let bytes = tag.as_bytes();
            let mut i = 0;
            while i < bytes.len()
                && bytes[i] > b' '
                && bytes[i] != b':'
                && bytes[i] != b'"'
                && bytes[i] != 0x7f
            {
                i += 1;
            }
            if i == 0 || i + 1 >= bytes.len() || bytes[i] != b':' || bytes[i + 1] != b'"' {
                break;
            }
            let name = &tag[..i];
            tag = &tag[i + 1..];

            let bytes = tag.as_bytes();
            let mut j = 1;
            while j < bytes.len() && bytes[j] != b'"' {
                if bytes[j] == b'\\' {
                    j += 1;
                }
                j += 1;
            }
            if j >= bytes.len() {
                break;
            }
            let quoted = &tag[..j + 1];
            tag = &tag[j + 1..];

            if name == key {
                return unquote(quoted);
            }
        }

        None
    }
}
