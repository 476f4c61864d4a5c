//! Dialect syntax: node headers, bracketed lists and item quoting
//!
//! Helpers here return plain messages; the parser wraps them with the line
//! and node path it was reading.

use nx_schema::{Dimensions, MaxOccurs, NodeKind, NxType, SchemaNode};

/// Marker that turns a header into an attribute
pub const ATTRIBUTE_MARKER: &str = "\\@";

/// Characters that force a list item into quotes
const SPECIAL: &[char] = &[',', '[', ']', '{', '}', '"', '\\', '\n'];

/// Whether a trimmed line is a node header (`name(TYPE):`)
///
/// Headers end in a colon and contain no spaces, which keeps them apart
/// from `key: value` property lines.
pub fn is_header(content: &str) -> bool {
    content
        .strip_suffix(':')
        .is_some_and(|head| !head.is_empty() && !head.contains([' ', ':']))
}

/// Split `key: value` into its parts
pub fn split_property(content: &str) -> Option<(&str, &str)> {
    content
        .split_once(": ")
        .map(|(key, value)| (key.trim(), value.trim()))
        .filter(|(key, _)| !key.is_empty() && !key.contains(' '))
}

/// Split `name(TYPE)` into name and optional type
pub fn split_typed(head: &str) -> Result<(&str, Option<&str>), String> {
    let Some(open) = head.find('(') else {
        if head.contains(')') {
            return Err(format!("unbalanced parenthesis in '{head}'"));
        }
        return Ok((head, None));
    };
    let inner = head[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| format!("expected ')' at the end of '{head}'"))?;
    if inner.is_empty() || inner.contains(['(', ')']) {
        return Err(format!("malformed type in '{head}'"));
    }
    Ok((&head[..open], Some(inner)))
}

/// Whether a header type names a group class rather than a data type
pub fn is_group_class(type_name: &str) -> bool {
    type_name.starts_with("NX") && !type_name.starts_with("NX_")
}

/// Build the node a header line declares; `head` excludes the colon
pub fn parse_header(head: &str) -> Result<SchemaNode, String> {
    let (attribute, head) = match head.strip_prefix(ATTRIBUTE_MARKER) {
        Some(rest) => (true, rest),
        None => (false, head),
    };
    let (name, type_name) = split_typed(head)?;
    let name = (!name.is_empty()).then_some(name);

    let kind = match type_name {
        _ if attribute => NodeKind::Attribute,
        Some(t) if is_group_class(t) => NodeKind::Group,
        _ => NodeKind::Field,
    };
    let mut node = SchemaNode::new(kind);
    node.name = name.map(str::to_string);
    match kind {
        NodeKind::Group => node.nx_class = type_name.map(str::to_string),
        NodeKind::Field | NodeKind::Attribute => {
            if name.is_none() {
                return Err(format!("{kind} declared without a name"));
            }
            node.data_type = type_name
                .map(|t| NxType::parse(t).ok_or_else(|| format!("invalid type name '{t}'")))
                .transpose()?;
        }
    }
    Ok(node)
}

/// Header line for a node, including the trailing colon
pub fn format_header(node: &SchemaNode) -> String {
    let marker = if node.kind == NodeKind::Attribute {
        ATTRIBUTE_MARKER
    } else {
        ""
    };
    let name = node.name.as_deref().unwrap_or_default();
    let type_name = match node.kind {
        NodeKind::Group => node.nx_class.as_deref(),
        NodeKind::Field | NodeKind::Attribute => node.data_type.map(NxType::as_str),
    };
    match type_name {
        Some(t) => format!("{marker}{name}({t}):"),
        None => format!("{marker}{name}:"),
    }
}

fn needs_quotes(item: &str) -> bool {
    item.is_empty() || item.trim() != item || item.starts_with('#') || item.contains(SPECIAL)
}

/// Render a list item, quoting it when it would not survive bare
pub fn quote(item: &str) -> String {
    if !needs_quotes(item) {
        return item.to_string();
    }
    let mut out = String::with_capacity(item.len() + 2);
    out.push('"');
    for c in item.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render `[a, b, c]`
pub fn format_list<S: AsRef<str>>(items: &[S]) -> String {
    let items: Vec<String> = items.iter().map(|i| quote(i.as_ref())).collect();
    format!("[{}]", items.join(", "))
}

/// Parse `[a, "b, c", d]`
pub fn parse_list(text: &str) -> Result<Vec<String>, String> {
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| format!("expected a bracketed list, found '{text}'"))?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut items = Vec::new();
    let mut chars = inner.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let mut item = String::new();
        if chars.next_if_eq(&'"').is_some() {
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some('\\') => match chars.next() {
                        Some('n') => item.push('\n'),
                        Some(c) => item.push(c),
                        None => return Err("dangling escape in list".to_string()),
                    },
                    Some(c) => item.push(c),
                    None => return Err(format!("unterminated quote in '{text}'")),
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| *c != ',') {
                item.push(c);
            }
            item = item.trim().to_string();
        }
        items.push(item);

        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        match chars.next() {
            None => break,
            Some(',') => {}
            Some(c) => return Err(format!("unexpected '{c}' in list '{text}'")),
        }
    }
    Ok(items)
}

/// Render cardinality as `[min, N, max, M]`, omitting absent bounds
pub fn format_occurs(min: Option<u32>, max: Option<MaxOccurs>) -> Option<String> {
    let mut items = Vec::new();
    if let Some(min) = min {
        items.push("min".to_string());
        items.push(min.to_string());
    }
    if let Some(max) = max {
        items.push("max".to_string());
        items.push(max.to_string());
    }
    (!items.is_empty()).then(|| format_list(&items))
}

/// Parse `[min, N, max, M]`; either pair may be missing
pub fn parse_occurs(text: &str) -> Result<(Option<u32>, Option<MaxOccurs>), String> {
    let items = parse_list(text)?;
    if items.len() % 2 != 0 {
        return Err(format!("occurs expects key/value pairs, found '{text}'"));
    }
    let mut min = None;
    let mut max = None;
    for pair in items.chunks(2) {
        let (key, value) = (pair[0].as_str(), pair[1].as_str());
        match key {
            "min" => {
                min = Some(
                    value
                        .parse::<u32>()
                        .map_err(|_| format!("non-numeric minimum '{value}'"))?,
                );
            }
            "max" => {
                max = Some(
                    MaxOccurs::parse(value).ok_or_else(|| format!("invalid maximum '{value}'"))?,
                );
            }
            other => return Err(format!("unknown occurs key '{other}'")),
        }
    }
    Ok((min, max))
}

/// Render `{rank: N, dim: [..]}`
pub fn format_dimensions(dims: &Dimensions) -> String {
    if dims.values.is_empty() {
        format!("{{rank: {}}}", dims.rank)
    } else {
        format!("{{rank: {}, dim: {}}}", dims.rank, format_list(&dims.values))
    }
}

/// Parse `{rank: N, dim: [..]}`
pub fn parse_dimensions(text: &str) -> Result<Dimensions, String> {
    let inner = text
        .trim()
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .ok_or_else(|| format!("expected '{{rank: N, dim: [..]}}', found '{text}'"))?;
    let (rank_part, dim_part) = match inner.split_once(',') {
        Some((rank, rest)) => (rank, Some(rest)),
        None => (inner, None),
    };
    let rank = rank_part
        .trim()
        .strip_prefix("rank:")
        .map(str::trim)
        .ok_or_else(|| format!("dimensions must start with 'rank:', found '{text}'"))?;
    let rank = rank
        .parse::<usize>()
        .map_err(|_| format!("non-numeric dimensions rank '{rank}'"))?;
    let values = match dim_part {
        None => Vec::new(),
        Some(rest) => {
            let list = rest
                .trim()
                .strip_prefix("dim:")
                .ok_or_else(|| format!("expected 'dim:' after the rank in '{text}'"))?;
            parse_list(list)?
        }
    };
    Ok(Dimensions { rank, values })
}
