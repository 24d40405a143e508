use crate::cli::OutputFormat;
use crate::node::NodeRecord;
use quick_xml::Writer;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::name::QName;
use std::borrow::Cow;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to serialize nodes as JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to serialize nodes as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Failed to serialize nodes as XML: {0}")]
    Xml(String),
}

/// Serialize nodes in the requested Rundeck resource format
pub fn render(nodes: &[NodeRecord], format: OutputFormat) -> Result<String, OutputError> {
    match format {
        OutputFormat::Json => to_json(nodes),
        OutputFormat::Yaml => to_yaml(nodes),
        OutputFormat::Xml => to_xml(nodes),
    }
}

/// Pretty-printed JSON array of flat node objects
pub fn to_json(nodes: &[NodeRecord]) -> Result<String, OutputError> {
    Ok(serde_json::to_string_pretty(nodes)?)
}

/// YAML sequence of node mappings (Rundeck resource-yaml), keys in fetch order
pub fn to_yaml(nodes: &[NodeRecord]) -> Result<String, OutputError> {
    Ok(serde_yaml::to_string(nodes)?)
}

/// Rundeck resource-xml document.
///
/// Standard fields become attributes of `<node>` (`nodename` is written as
/// `name`); every other attribute becomes a child
/// `<attribute name="..." value="..."/>`.
pub fn to_xml(nodes: &[NodeRecord]) -> Result<String, OutputError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    write_xml_event(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;
    write_xml_event(&mut writer, Event::Start(BytesStart::new("project")))?;

    for node in nodes {
        let mut elem = BytesStart::new("node");
        elem.push_attribute(xml_attribute("name", node.get("nodename").unwrap_or("")));
        for field in ["hostname", "username", "osFamily"] {
            elem.push_attribute(xml_attribute(field, node.get(field).unwrap_or("")));
        }
        for field in ["description", "tags"] {
            if let Some(value) = node.get(field) {
                elem.push_attribute(xml_attribute(field, value));
            }
        }

        let mut extras = node.extra_attributes().peekable();
        if extras.peek().is_none() {
            write_xml_event(&mut writer, Event::Empty(elem))?;
            continue;
        }

        write_xml_event(&mut writer, Event::Start(elem))?;
        for (name, value) in extras {
            let mut attr = BytesStart::new("attribute");
            attr.push_attribute(xml_attribute("name", name));
            attr.push_attribute(xml_attribute("value", value));
            write_xml_event(&mut writer, Event::Empty(attr))?;
        }
        write_xml_event(&mut writer, Event::End(BytesEnd::new("node")))?;
    }

    write_xml_event(&mut writer, Event::End(BytesEnd::new("project")))?;

    String::from_utf8(writer.into_inner()).map_err(|e| OutputError::Xml(e.to_string()))
}

fn write_xml_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), OutputError> {
    writer
        .write_event(event)
        .map_err(|e| OutputError::Xml(e.to_string()))
}

/// Attribute with its value escaped, including line breaks so multi-line
/// descriptions survive attribute-value normalization.
fn xml_attribute<'a>(key: &'a str, value: &str) -> Attribute<'a> {
    let escaped = quick_xml::escape::escape(value)
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
        .replace('\t', "&#9;");
    Attribute {
        key: QName(key.as_bytes()),
        value: Cow::Owned(escaped.into_bytes()),
    }
}
