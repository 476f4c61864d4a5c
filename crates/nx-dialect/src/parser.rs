//! Dialect reader

use crate::serializer::INDENT;
use crate::syntax::{
    is_header, parse_dimensions, parse_header, parse_list, parse_occurs, split_property,
    split_typed,
};
use crate::{Error, Result};
use nx_schema::model::normalize_text;
use nx_schema::{Category, NodeKind, Occurrence, OverrideMode, SchemaClass, SchemaNode};
use tracing::debug;

fn display(path: &str) -> &str {
    if path.is_empty() { "/" } else { path }
}

struct Parser<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().collect(),
            pos: 0,
        }
    }

    /// 1-based number of the current line
    fn line_no(&self) -> usize {
        self.pos + 1
    }

    /// Skip blank lines and return the indentation and content of the next one
    fn peek(&mut self, path: &str) -> Result<Option<(usize, &'a str)>> {
        while let Some(&line) = self.lines.get(self.pos) {
            let content = line.trim();
            if content.is_empty() {
                self.pos += 1;
                continue;
            }
            let rest = line.trim_start_matches(' ');
            if rest.starts_with('\t') {
                return Err(Error::parse(
                    self.line_no(),
                    display(path),
                    "tabs are not allowed in indentation",
                ));
            }
            return Ok(Some((line.len() - rest.len(), content)));
        }
        Ok(None)
    }

    /// Consume one comment, single-line (`# text`) or block (`# |`)
    fn comment(&mut self) -> Option<String> {
        let content = self.lines[self.pos].trim();
        self.pos += 1;
        let body = &content[1..];
        if body.trim() != "|" {
            let text = body.trim();
            return (!text.is_empty()).then(|| text.to_string());
        }

        let mut lines = Vec::new();
        while let Some(&line) = self.lines.get(self.pos) {
            let trimmed = line.trim_start();
            if trimmed.trim_end() == "#" {
                lines.push("");
            } else if let Some(rest) = trimmed.strip_prefix("#   ") {
                lines.push(rest.trim_end());
            } else {
                break;
            }
            self.pos += 1;
        }
        let text = normalize_text(&lines.join("\n"));
        (!text.is_empty()).then_some(text)
    }

    /// Value of a `doc:` property declared at `indent`
    fn doc(&mut self, value: &str, indent: usize) -> String {
        if value != "|" {
            return value.to_string();
        }
        let body = indent + INDENT;
        let mut lines = Vec::new();
        while let Some(&line) = self.lines.get(self.pos) {
            if line.trim().is_empty() {
                lines.push("");
            } else if line.len() - line.trim_start_matches(' ').len() >= body {
                lines.push(&line[body..]);
            } else {
                break;
            }
            self.pos += 1;
        }
        normalize_text(&lines.join("\n"))
    }

    fn class(&mut self) -> Result<SchemaClass> {
        let mut comments = Vec::new();
        let mut category = None;
        let mut doc = None;

        let header = loop {
            let Some((indent, content)) = self.peek("")? else {
                return Err(Error::parse(self.line_no(), "/", "missing class header"));
            };
            let line = self.line_no();
            if indent != 0 {
                return Err(Error::parse(line, "/", "unexpected indentation"));
            }
            if content.starts_with('#') {
                comments.extend(self.comment());
                continue;
            }
            if is_header(content) {
                self.pos += 1;
                break content;
            }
            let (key, value) = split_property(content).ok_or_else(|| {
                Error::parse(line, "/", format!("expected a property, found '{content}'"))
            })?;
            self.pos += 1;
            match key {
                "category" => {
                    category = Some(Category::parse(value).ok_or_else(|| {
                        Error::parse(line, "/", format!("unknown category '{value}'"))
                    })?);
                }
                "doc" => doc = Some(self.doc(value, 0)),
                other => {
                    return Err(Error::parse(
                        line,
                        "/",
                        format!("unknown class property '{other}'"),
                    ));
                }
            }
        };

        let header_line = self.pos;
        let head = &header[..header.len() - 1];
        let (name, extends) =
            split_typed(head).map_err(|message| Error::parse(header_line, "/", message))?;
        if name.starts_with('\\') {
            return Err(Error::parse(header_line, "/", "the class header cannot be an attribute"));
        }
        if extends == Some(name) {
            return Err(Error::parse(header_line, "/", "class extends itself"));
        }

        let mut class = SchemaClass::new(name, category.unwrap_or_default());
        class.extends = extends.map(str::to_string);
        class.doc = doc;
        class.comments = comments;
        self.block(INDENT, &mut class.root, "", false)?;
        class.comments.append(&mut class.root.comments);

        while let Some((indent, content)) = self.peek("")? {
            if indent == 0 && content.starts_with('#') {
                class.comments.extend(self.comment());
            } else {
                return Err(Error::parse(
                    self.line_no(),
                    "/",
                    "only one class may be defined per file",
                ));
            }
        }
        Ok(class)
    }

    /// Read the members and properties of `node` written at `indent`
    fn block(
        &mut self,
        indent: usize,
        node: &mut SchemaNode,
        path: &str,
        properties: bool,
    ) -> Result<()> {
        let mut pending = Vec::new();
        while let Some((at, content)) = self.peek(path)? {
            if at < indent {
                break;
            }
            let line = self.line_no();
            if at > indent {
                return Err(Error::parse(line, display(path), "unexpected indentation"));
            }
            if content.starts_with('#') {
                pending.extend(self.comment());
                continue;
            }

            if is_header(content) {
                let mut child = parse_header(&content[..content.len() - 1])
                    .map_err(|message| Error::parse(line, display(path), message))?;
                self.pos += 1;
                match (node.kind, child.kind) {
                    (NodeKind::Attribute, _) => {
                        return Err(Error::parse(
                            line,
                            display(path),
                            "attributes cannot have children",
                        ));
                    }
                    (NodeKind::Field, NodeKind::Group | NodeKind::Field) => {
                        return Err(Error::parse(
                            line,
                            display(path),
                            "fields may only contain attributes",
                        ));
                    }
                    _ => {}
                }
                let marker = if child.kind == NodeKind::Attribute { "@" } else { "" };
                let child_path = format!("{path}/{marker}{}", child.display_name());
                child.comments = std::mem::take(&mut pending);
                self.block(indent + INDENT, &mut child, &child_path, true)?;

                if node.children.iter().any(|c| c.key() == child.key()) {
                    return Err(Error::parse(
                        line,
                        display(path),
                        format!("duplicate {} '{}'", child.kind, child.display_name()),
                    ));
                }
                node.children.push(child);
                continue;
            }

            if !properties {
                return Err(Error::parse(
                    line,
                    display(path),
                    format!("expected a node header, found '{content}'"),
                ));
            }
            let (key, value) = split_property(content).ok_or_else(|| {
                Error::parse(line, display(path), format!("expected a property, found '{content}'"))
            })?;
            self.pos += 1;
            self.property(node, key, value, indent)
                .map_err(|message| Error::parse(line, display(path), message))?;
        }
        // Comments with no node after them stay with the enclosing node
        node.comments.extend(pending);
        Ok(())
    }

    fn property(
        &mut self,
        node: &mut SchemaNode,
        key: &str,
        value: &str,
        indent: usize,
    ) -> std::result::Result<(), String> {
        match key {
            "exists" => {
                node.occurrence = Some(
                    Occurrence::parse(value)
                        .ok_or_else(|| format!("invalid exists value '{value}'"))?,
                );
            }
            "occurs" => {
                let (min, max) = parse_occurs(value)?;
                node.min_occurs = min;
                node.max_occurs = max;
            }
            "nameType" => node.name_type = Some(value.to_string()),
            "unit" => node.units = Some(value.to_string()),
            "override" => {
                node.override_mode = match value {
                    "replace" => OverrideMode::Replace,
                    "extend" => OverrideMode::Extend,
                    other => return Err(format!("invalid override mode '{other}'")),
                };
            }
            "dimensions" => node.dimensions = Some(parse_dimensions(value)?),
            "enumeration" => node.enumeration = parse_list(value)?,
            "doc" => node.doc = Some(self.doc(value, indent)),
            other => return Err(format!("unknown property '{other}'")),
        }
        Ok(())
    }
}

/// Parse dialect text into a class
///
/// # Errors
///
/// Returns [`Error::Parse`] with the 1-based line and the path of the node
/// being read for bad indentation, unknown properties or values, malformed
/// headers, duplicate members, misplaced children and extra classes.
pub fn dialect_to_canonical(text: &str) -> Result<SchemaClass> {
    let mut parser = Parser::new(text);
    let class = parser.class()?;
    debug!(
        class = %class.name,
        nodes = class.root.node_count() - 1,
        "Parsed dialect text"
    );
    Ok(class)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nx_schema::{MaxOccurs, NxType};

    const DEMO: &str = "\
# leading note
category: application
doc: |
  Demo class.

  With two paragraphs.
NXdemo(NXobject):
  # the entry
  (NXentry):
    exists: required
    title(NX_CHAR):
      exists: recommended
      \\@language:
        enumeration: [en, \"de, ch\"]
    data(NXdata):
      occurs: [min, 1, max, unbounded]
      doc: Plotted data.
";

    #[test]
    fn test_parse_demo_class() {
        let class = dialect_to_canonical(DEMO).unwrap();
        assert_eq!(class.name, "NXdemo");
        assert_eq!(class.extends.as_deref(), Some("NXobject"));
        assert_eq!(class.category, Category::Application);
        assert_eq!(class.comments, vec!["leading note".to_string()]);
        assert_eq!(class.doc.as_deref(), Some("Demo class.\n\nWith two paragraphs."));

        let entry = class.root.find_child(NodeKind::Group, "ENTRY").unwrap();
        assert_eq!(entry.name, None);
        assert_eq!(entry.comments, vec!["the entry".to_string()]);
        assert_eq!(entry.occurrence, Some(Occurrence::Required));

        let title = entry.find_child(NodeKind::Field, "title").unwrap();
        assert_eq!(title.data_type, Some(NxType::Char));
        let language = title.find_child(NodeKind::Attribute, "language").unwrap();
        assert_eq!(language.enumeration, vec!["en", "de, ch"]);

        let data = entry.find_child(NodeKind::Group, "data").unwrap();
        assert_eq!(data.min_occurs, Some(1));
        assert_eq!(data.max_occurs, Some(MaxOccurs::Unbounded));
        assert_eq!(data.doc.as_deref(), Some("Plotted data."));
    }

    #[test]
    fn test_errors_carry_line_and_path() {
        let cases = [
            ("NXa:\n  x:\n      y:\n", 3, "/x", "unexpected indentation"),
            ("NXa:\n  x(NX_REAL):\n", 2, "/", "invalid type name"),
            ("NXa:\n  x:\n  x:\n", 3, "/", "duplicate field 'x'"),
            ("NXa:\n  x:\n    y:\n", 3, "/x", "fields may only contain attributes"),
            ("NXa:\n  \\@a:\n    \\@b:\n", 3, "/@a", "attributes cannot have children"),
            ("NXa:\n  g(NXb):\n    colour: red\n", 3, "/g", "unknown property"),
            ("NXa:\n  g(NXb):\n    occurs: [min, x]\n", 3, "/g", "non-numeric minimum"),
            ("NXa:\n  unit: m\n", 2, "/", "expected a node header"),
            ("category: odd\nNXa:\n", 1, "/", "unknown category"),
            ("NXa:\nNXb:\n", 2, "/", "only one class"),
            ("# only a comment\n", 2, "/", "missing class header"),
            ("NXa:\n\t x:\n", 2, "/", "tabs"),
            ("NXa(NXa):\n", 1, "/", "extends itself"),
        ];
        for (text, line, path, expected) in cases {
            match dialect_to_canonical(text) {
                Err(Error::Parse {
                    line: l,
                    path: p,
                    message,
                }) => {
                    assert_eq!((l, p.as_str()), (line, path), "{text:?}: {message}");
                    assert!(message.contains(expected), "{text:?}: {message}");
                }
                other => panic!("{text:?}: expected a parse error, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_trailing_comments_stay_with_their_node() {
        let text = "NXa:\n  g(NXb):\n    x:\n    # after x\n# closing\n";
        let class = dialect_to_canonical(text).unwrap();
        let group = class.root.find_child(NodeKind::Group, "g").unwrap();
        assert_eq!(group.comments, vec!["after x".to_string()]);
        assert_eq!(class.comments, vec!["closing".to_string()]);
    }
}
