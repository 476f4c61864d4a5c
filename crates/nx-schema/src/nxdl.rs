//! NXDL XML reader and writer
//!
//! The reader builds a small element tree with `quick-xml` and converts it
//! into a [`SchemaClass`]. Only the parts of NXDL the engine understands are
//! accepted: `definition`, `group`, `field`, `attribute`, `doc`,
//! `enumeration`/`item` and `dimensions`/`dim`. `symbols` blocks are skipped;
//! any other element is a parse error.

use crate::model::{
    Category, Dimensions, MaxOccurs, NodeKind, NxType, Occurrence, OverrideMode, SchemaClass,
    SchemaNode, normalize_text,
};
use crate::{Error, Result};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::trace;

const NXDL_NAMESPACE: &str = "http://definition.nexusformat.org/nxdl/3.1";

#[derive(Debug)]
enum XmlItem {
    Element(XmlElement),
    Text(String),
    Comment(String),
}

#[derive(Debug)]
struct XmlElement {
    tag: String,
    attrs: Vec<(String, String)>,
    items: Vec<XmlItem>,
}

impl XmlElement {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn flag(&self, key: &str) -> bool {
        self.attr(key).is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    fn text(&self) -> String {
        self.items
            .iter()
            .filter_map(|item| match item {
                XmlItem::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }
}

fn read_element(start: &BytesStart<'_>, source: &str) -> Result<XmlElement> {
    let tag = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::parse(source, format!("bad attribute: {e}")))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::parse(source, format!("bad attribute value: {e}")))?
            .into_owned();
        attrs.push((key, value));
    }
    Ok(XmlElement {
        tag,
        attrs,
        items: Vec::new(),
    })
}

/// Parse the document into top-level items
fn read_tree(xml: &str, source: &str) -> Result<Vec<XmlItem>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut top: Vec<XmlItem> = Vec::new();
    let mut stack: Vec<XmlElement> = Vec::new();

    fn push(stack: &mut [XmlElement], top: &mut Vec<XmlItem>, item: XmlItem) {
        match stack.last_mut() {
            Some(parent) => parent.items.push(item),
            None => top.push(item),
        }
    }

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => stack.push(read_element(e, source)?),
            Ok(Event::Empty(ref e)) => {
                let element = read_element(e, source)?;
                push(&mut stack, &mut top, XmlItem::Element(element));
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| Error::parse(source, "unbalanced end tag"))?;
                push(&mut stack, &mut top, XmlItem::Element(element));
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| Error::parse(source, format!("bad text: {err}")))?
                    .into_owned();
                push(&mut stack, &mut top, XmlItem::Text(text));
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                push(&mut stack, &mut top, XmlItem::Text(text));
            }
            Ok(Event::Comment(ref e)) => {
                let text = normalize_text(&String::from_utf8_lossy(e));
                push(&mut stack, &mut top, XmlItem::Comment(text));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(Error::parse(
                    source,
                    format!("malformed XML at byte {}: {e}", reader.buffer_position()),
                ));
            }
        }
    }

    if let Some(open) = stack.last() {
        return Err(Error::parse(
            source,
            format!("unexpected end of document inside <{}>", open.tag),
        ));
    }
    Ok(top)
}

/// Parse an NXDL document into a class
///
/// `source` names the document in error messages (usually the class name
/// requested from the corpus).
///
/// # Errors
///
/// Returns [`Error::Parse`] for malformed XML, unknown elements, invalid
/// type names or occurrence values, duplicate children, self-inheritance
/// and children placed where NXDL does not allow them.
pub fn parse_nxdl(xml: &str, source: &str) -> Result<SchemaClass> {
    let items = read_tree(xml, source)?;
    let mut leading_comments = Vec::new();
    let mut definition = None;
    for item in items {
        match item {
            XmlItem::Comment(c) if definition.is_none() => leading_comments.push(c),
            XmlItem::Element(e) if e.tag == "definition" && definition.is_none() => {
                definition = Some(e);
            }
            XmlItem::Element(e) => {
                return Err(Error::parse(
                    source,
                    format!("unexpected top-level element <{}>", e.tag),
                ));
            }
            _ => {}
        }
    }
    let definition =
        definition.ok_or_else(|| Error::parse(source, "missing <definition> element"))?;

    let name = definition
        .attr("name")
        .ok_or_else(|| Error::parse(source, "definition has no name"))?
        .to_string();
    let category = match definition.attr("category") {
        None => Category::Base,
        Some(raw) => Category::parse(raw)
            .ok_or_else(|| Error::parse(&name, format!("unknown category '{raw}'")))?,
    };
    let extends = definition.attr("extends").map(str::to_string);
    if extends.as_deref() == Some(name.as_str()) {
        return Err(Error::parse(&name, "class extends itself"));
    }

    let mut class = SchemaClass::new(name.clone(), category);
    class.extends = extends;
    class.comments = leading_comments;

    let mut pending = Vec::new();
    for item in definition.items {
        match item {
            XmlItem::Comment(c) => pending.push(c),
            XmlItem::Text(_) => {}
            XmlItem::Element(e) => match e.tag.as_str() {
                "doc" => class.doc = Some(normalize_text(&e.text())),
                "symbols" => {}
                "group" | "field" | "attribute" => {
                    let mut node = convert_node(e, &name, "")?;
                    attach_comments(&mut node, &mut pending);
                    add_child(&mut class.root, node, &name, "")?;
                }
                other => {
                    return Err(Error::parse(&name, format!("unknown node kind <{other}>")));
                }
            },
        }
    }
    class.comments.extend(pending);

    trace!(
        class = %class.name,
        nodes = class.root.node_count() - 1,
        "Parsed NXDL definition"
    );
    Ok(class)
}

fn add_child(parent: &mut SchemaNode, child: SchemaNode, class: &str, path: &str) -> Result<()> {
    let key = child.key();
    if parent.children.iter().any(|c| c.key() == key) {
        let what = if child.is_placeholder() {
            "duplicate placeholder"
        } else {
            "duplicate child"
        };
        return Err(Error::parse(
            class,
            format!("{what} {} '{}' under '{}'", key.0, key.1, display(path)),
        ));
    }
    parent.children.push(child);
    Ok(())
}

/// Comments preceding a node come before the ones found inside it
fn attach_comments(node: &mut SchemaNode, pending: &mut Vec<String>) {
    let mut comments = std::mem::take(pending);
    comments.append(&mut node.comments);
    node.comments = comments;
}

fn display(path: &str) -> &str {
    if path.is_empty() { "/" } else { path }
}

fn convert_node(element: XmlElement, class: &str, parent_path: &str) -> Result<SchemaNode> {
    let kind = match element.tag.as_str() {
        "group" => NodeKind::Group,
        "field" => NodeKind::Field,
        "attribute" => NodeKind::Attribute,
        other => return Err(Error::parse(class, format!("unknown node kind <{other}>"))),
    };

    let mut node = SchemaNode::new(kind);
    node.name = element.attr("name").map(str::to_string);
    match kind {
        NodeKind::Group => {
            let nx_class = element.attr("type").ok_or_else(|| {
                Error::parse(class, format!("group under '{}' has no type", display(parent_path)))
            })?;
            node.nx_class = Some(nx_class.to_string());
        }
        NodeKind::Field | NodeKind::Attribute => {
            if node.name.is_none() {
                return Err(Error::parse(
                    class,
                    format!("{kind} under '{}' has no name", display(parent_path)),
                ));
            }
            if let Some(raw) = element.attr("type") {
                node.data_type = Some(
                    NxType::parse(raw)
                        .ok_or_else(|| Error::parse(class, format!("invalid type name '{raw}'")))?,
                );
            }
        }
    }

    let path = format!("{parent_path}/{}", node.display_name());
    node.name_type = element.attr("nameType").map(str::to_string);
    node.units = element.attr("units").map(str::to_string);
    node.min_occurs = element
        .attr("minOccurs")
        .map(|raw| {
            raw.parse::<u32>().map_err(|_| {
                Error::parse(class, format!("non-numeric minOccurs '{raw}' at '{path}'"))
            })
        })
        .transpose()?;
    node.max_occurs = element
        .attr("maxOccurs")
        .map(|raw| {
            MaxOccurs::parse(raw).ok_or_else(|| {
                Error::parse(class, format!("invalid maxOccurs '{raw}' at '{path}'"))
            })
        })
        .transpose()?;
    node.occurrence = if element.flag("required") {
        Some(Occurrence::Required)
    } else if element.flag("recommended") {
        Some(Occurrence::Recommended)
    } else if element.flag("optional") {
        Some(Occurrence::Optional)
    } else {
        None
    };
    node.override_mode = match element.attr("overrideMode") {
        None | Some("extend") => OverrideMode::Extend,
        Some("replace") => OverrideMode::Replace,
        Some(other) => {
            return Err(Error::parse(
                class,
                format!("invalid overrideMode '{other}' at '{path}'"),
            ));
        }
    };

    let mut pending = Vec::new();
    for item in element.items {
        match item {
            XmlItem::Comment(c) => pending.push(c),
            XmlItem::Text(_) => {}
            XmlItem::Element(child) => match child.tag.as_str() {
                "doc" => node.doc = Some(normalize_text(&child.text())),
                "enumeration" => node.enumeration = convert_enumeration(&child),
                "dimensions" => node.dimensions = Some(convert_dimensions(&child, class, &path)?),
                "group" | "field" | "attribute" => {
                    if kind == NodeKind::Attribute {
                        return Err(Error::parse(
                            class,
                            format!("attribute '{path}' cannot have children"),
                        ));
                    }
                    if kind == NodeKind::Field && child.tag != "attribute" {
                        return Err(Error::parse(
                            class,
                            format!("field '{path}' may only contain attributes"),
                        ));
                    }
                    let mut sub = convert_node(child, class, &path)?;
                    attach_comments(&mut sub, &mut pending);
                    add_child(&mut node, sub, class, &path)?;
                }
                other => {
                    return Err(Error::parse(
                        class,
                        format!("unknown node kind <{other}> under '{path}'"),
                    ));
                }
            },
        }
    }
    // Trailing comments belong to the node itself
    node.comments.extend(pending);
    Ok(node)
}

fn convert_enumeration(element: &XmlElement) -> Vec<String> {
    element
        .items
        .iter()
        .filter_map(|item| match item {
            XmlItem::Element(e) if e.tag == "item" => e.attr("value").map(str::to_string),
            _ => None,
        })
        .collect()
}

fn convert_dimensions(element: &XmlElement, class: &str, path: &str) -> Result<Dimensions> {
    let mut dims: Vec<(usize, String)> = Vec::new();
    for item in &element.items {
        if let XmlItem::Element(e) = item {
            if e.tag != "dim" {
                continue;
            }
            let index = e
                .attr("index")
                .and_then(|i| i.parse::<usize>().ok())
                .unwrap_or(dims.len() + 1);
            dims.push((index, e.attr("value").unwrap_or_default().to_string()));
        }
    }
    dims.sort_by_key(|(i, _)| *i);
    let rank = match element.attr("rank") {
        Some(raw) => raw.parse::<usize>().map_err(|_| {
            Error::parse(class, format!("non-numeric dimensions rank '{raw}' at '{path}'"))
        })?,
        None => dims.len(),
    };
    Ok(Dimensions {
        rank,
        values: dims.into_iter().map(|(_, v)| v).collect(),
    })
}

struct NxdlWriter {
    writer: Writer<Vec<u8>>,
    class: String,
}

impl NxdlWriter {
    fn emit<'a>(&mut self, event: impl Into<Event<'a>>) -> Result<()> {
        self.writer.write_event(event).map_err(|e| Error::Serialize {
            class: self.class.clone(),
            message: e.to_string(),
        })
    }

    fn comments(&mut self, comments: &[String]) -> Result<()> {
        for comment in comments {
            let comment = comment.replace("--", "- -");
            let text = if comment.contains('\n') {
                format!("\n{comment}\n")
            } else {
                format!(" {comment} ")
            };
            self.emit(Event::Comment(BytesText::from_escaped(text)))?;
        }
        Ok(())
    }

    fn doc(&mut self, doc: Option<&str>) -> Result<()> {
        if let Some(doc) = doc {
            self.emit(Event::Start(BytesStart::new("doc")))?;
            self.emit(Event::Text(BytesText::new(doc)))?;
            self.emit(Event::End(BytesEnd::new("doc")))?;
        }
        Ok(())
    }

    fn node(&mut self, node: &SchemaNode) -> Result<()> {
        let tag = node.kind.as_str();
        let mut start = BytesStart::new(tag);
        if let Some(name) = &node.name {
            start.push_attribute(("name", name.as_str()));
        }
        let type_name = match node.kind {
            NodeKind::Group => node.nx_class.as_deref(),
            _ => node.data_type.map(NxType::as_str),
        };
        if let Some(type_name) = type_name {
            start.push_attribute(("type", type_name));
        }
        if let Some(name_type) = &node.name_type {
            start.push_attribute(("nameType", name_type.as_str()));
        }
        if let Some(units) = &node.units {
            start.push_attribute(("units", units.as_str()));
        }
        if let Some(min) = node.min_occurs {
            start.push_attribute(("minOccurs", min.to_string().as_str()));
        }
        if let Some(max) = node.max_occurs {
            start.push_attribute(("maxOccurs", max.to_string().as_str()));
        }
        if let Some(occurrence) = node.occurrence {
            start.push_attribute((occurrence.as_str(), "true"));
        }
        if node.override_mode == OverrideMode::Replace {
            start.push_attribute(("overrideMode", "replace"));
        }

        let has_body = node.doc.is_some()
            || !node.enumeration.is_empty()
            || node.dimensions.is_some()
            || !node.children.is_empty();
        if !has_body {
            return self.emit(Event::Empty(start));
        }

        self.emit(Event::Start(start))?;
        self.doc(node.doc.as_deref())?;
        if let Some(dims) = &node.dimensions {
            let rank = dims.rank.to_string();
            let mut start = BytesStart::new("dimensions");
            start.push_attribute(("rank", rank.as_str()));
            if dims.values.is_empty() {
                self.emit(Event::Empty(start))?;
            } else {
                self.emit(Event::Start(start))?;
                for (i, value) in dims.values.iter().enumerate() {
                    let index = (i + 1).to_string();
                    let mut dim = BytesStart::new("dim");
                    dim.push_attribute(("index", index.as_str()));
                    dim.push_attribute(("value", value.as_str()));
                    self.emit(Event::Empty(dim))?;
                }
                self.emit(Event::End(BytesEnd::new("dimensions")))?;
            }
        }
        if !node.enumeration.is_empty() {
            self.emit(Event::Start(BytesStart::new("enumeration")))?;
            for value in &node.enumeration {
                let mut item = BytesStart::new("item");
                item.push_attribute(("value", value.as_str()));
                self.emit(Event::Empty(item))?;
            }
            self.emit(Event::End(BytesEnd::new("enumeration")))?;
        }
        for child in &node.children {
            self.comments(&child.comments)?;
            self.node(child)?;
        }
        self.emit(Event::End(BytesEnd::new(tag)))
    }
}

/// Serialize a class as an NXDL document
///
/// Comments attached to nodes are written immediately before the node;
/// class comments precede the `definition` element.
///
/// # Errors
///
/// Returns [`Error::Serialize`] if the XML writer fails.
pub fn to_nxdl_string(class: &SchemaClass) -> Result<String> {
    let mut out = NxdlWriter {
        writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        class: class.name.clone(),
    };
    out.emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    out.comments(&class.comments)?;

    let mut start = BytesStart::new("definition");
    start.push_attribute(("xmlns", NXDL_NAMESPACE));
    start.push_attribute(("name", class.name.as_str()));
    start.push_attribute(("type", "group"));
    if let Some(extends) = &class.extends {
        start.push_attribute(("extends", extends.as_str()));
    }
    start.push_attribute(("category", class.category.as_str()));
    out.emit(Event::Start(start))?;
    out.doc(class.doc.as_deref())?;
    for child in &class.root.children {
        out.comments(&child.comments)?;
        out.node(child)?;
    }
    out.emit(Event::End(BytesEnd::new("definition")))?;

    let bytes = out.writer.into_inner();
    String::from_utf8(bytes).map_err(|e| Error::Serialize {
        class: class.name.clone(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BEAM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- beam description -->
<definition name="NXbeam" type="group" extends="NXobject" category="base"
    xmlns="http://definition.nexusformat.org/nxdl/3.1">
  <doc>
     Properties of the neutron or X-ray beam.
  </doc>
  <symbols><symbol name="n"/></symbols>
  <!-- energy of the beam -->
  <field name="energy" type="NX_FLOAT" units="NX_ENERGY">
    <doc>Incident energy.</doc>
    <attribute name="units" type="NX_CHAR"/>
  </field>
  <field name="mode">
    <enumeration><item value="single"/><item value="multi"/></enumeration>
  </field>
  <field name="profile" type="NX_FLOAT" minOccurs="0" maxOccurs="unbounded">
    <dimensions rank="2"><dim index="2" value="ny"/><dim index="1" value="nx"/></dimensions>
  </field>
  <group type="NXdata"/>
</definition>
"#;

    #[test]
    fn test_parse_base_class() {
        let class = parse_nxdl(BEAM, "NXbeam").unwrap();
        assert_eq!(class.name, "NXbeam");
        assert_eq!(class.extends.as_deref(), Some("NXobject"));
        assert_eq!(class.category, Category::Base);
        assert_eq!(class.comments, vec!["beam description".to_string()]);
        assert_eq!(
            class.doc.as_deref(),
            Some("Properties of the neutron or X-ray beam.")
        );

        let energy = class.root.find_child(NodeKind::Field, "energy").unwrap();
        assert_eq!(energy.data_type, Some(NxType::Float));
        assert_eq!(energy.units.as_deref(), Some("NX_ENERGY"));
        assert_eq!(energy.comments, vec!["energy of the beam".to_string()]);
        assert_eq!(energy.children.len(), 1);

        let mode = class.root.find_child(NodeKind::Field, "mode").unwrap();
        assert_eq!(mode.data_type, None);
        assert_eq!(mode.enumeration, vec!["single", "multi"]);

        let profile = class.root.find_child(NodeKind::Field, "profile").unwrap();
        assert_eq!(profile.min_occurs, Some(0));
        assert_eq!(profile.max_occurs, Some(MaxOccurs::Unbounded));
        let dims = profile.dimensions.as_ref().unwrap();
        assert_eq!(dims.rank, 2);
        assert_eq!(dims.values, vec!["nx", "ny"]);

        let data = class.root.find_child(NodeKind::Group, "DATA").unwrap();
        assert!(data.is_placeholder());
    }

    #[test]
    fn test_parse_errors() {
        let cases = [
            ("<definition name=\"NXa\" extends=\"NXa\"/>", "extends itself"),
            (
                "<definition name=\"NXa\"><field name=\"x\"/><field name=\"x\"/></definition>",
                "duplicate child",
            ),
            (
                "<definition name=\"NXa\"><group type=\"NXdata\"/><group type=\"NXdata\"/></definition>",
                "duplicate placeholder",
            ),
            (
                "<definition name=\"NXa\"><field name=\"x\" type=\"NX_REAL\"/></definition>",
                "invalid type name",
            ),
            (
                "<definition name=\"NXa\"><group type=\"NXb\" minOccurs=\"one\"/></definition>",
                "non-numeric minOccurs",
            ),
            (
                "<definition name=\"NXa\"><attribute name=\"a\"><field name=\"x\"/></attribute></definition>",
                "cannot have children",
            ),
            (
                "<definition name=\"NXa\"><field name=\"x\"><group type=\"NXb\"/></field></definition>",
                "may only contain attributes",
            ),
            ("<definition name=\"NXa\"><choice name=\"c\"/></definition>", "unknown node kind"),
        ];
        for (xml, expected) in cases {
            let err = parse_nxdl(xml, "NXa").unwrap_err().to_string();
            assert!(err.contains(expected), "{xml}: {err}");
        }
    }

    #[test]
    fn test_doc_with_non_breaking_space_indent() {
        let xml = "<definition name=\"NXnote\" type=\"group\" category=\"base\">\
                   <doc>\n \u{a0}x\n y\n</doc></definition>";
        let class = parse_nxdl(xml, "NXnote").unwrap();
        let doc = class.doc.unwrap();
        assert!(doc.starts_with("\u{a0}x\n"), "{doc:?}");
        assert!(doc.ends_with('y'), "{doc:?}");
    }

    #[test]
    fn test_unclosed_definition_is_rejected() {
        assert!(parse_nxdl("<definition name=\"NXa\"><field name=\"x\"/>", "NXa").is_err());
        assert!(parse_nxdl("<group type=\"NXa\"/>", "NXa").is_err());
    }

    #[test]
    fn test_placeholder_and_concrete_override_coexist() {
        let xml = r#"<definition name="NXa">
            <group type="NXentry"/>
            <group name="entry" type="NXentry"/>
        </definition>"#;
        let class = parse_nxdl(xml, "NXa").unwrap();
        assert_eq!(class.root.children.len(), 2);
    }

    #[test]
    fn test_write_then_parse_preserves_class() {
        let class = parse_nxdl(BEAM, "NXbeam").unwrap();
        let xml = to_nxdl_string(&class).unwrap();
        assert!(xml.contains("<definition"));
        assert!(xml.contains("maxOccurs=\"unbounded\""));
        let reparsed = parse_nxdl(&xml, "NXbeam").unwrap();
        assert_eq!(reparsed, class);
    }
}
