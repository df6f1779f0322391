//! XML helpers
//!
//! Replies are built from an [`XmlNode`] tree: text values are wrapped in
//! CDATA, raw values (numbers, timestamps) are written as-is. Inbound XML is
//! parsed with `serde_xml_rs`.

use serde::de::DeserializeOwned;

use crate::error::Result;

/// Value of a child element
#[derive(Debug, Clone, PartialEq)]
pub enum XmlValue {
    /// Escaped as CDATA
    Text(String),
    /// Written verbatim
    Raw(String),
    /// Nested element
    Node(XmlNode),
    /// Repeated `<item>` elements
    Items(Vec<XmlNode>),
}

/// Ordered list of child elements
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    children: Vec<(String, XmlValue)>,
}

impl XmlNode {
    pub fn element() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.children
            .push((name.to_string(), XmlValue::Text(value.into())));
        self
    }

    pub fn raw(mut self, name: &str, value: impl ToString) -> Self {
        self.children
            .push((name.to_string(), XmlValue::Raw(value.to_string())));
        self
    }

    pub fn node(mut self, name: &str, node: XmlNode) -> Self {
        self.children.push((name.to_string(), XmlValue::Node(node)));
        self
    }

    pub fn items(mut self, name: &str, items: Vec<XmlNode>) -> Self {
        self.children.push((name.to_string(), XmlValue::Items(items)));
        self
    }

    /// Add a text child only when a value is present
    pub fn text_opt(self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.text(name, value),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    fn write(&self, out: &mut String) {
        for (name, value) in &self.children {
            out.push('<');
            out.push_str(name);
            out.push('>');
            match value {
                XmlValue::Text(text) => write_cdata(text, out),
                XmlValue::Raw(raw) => out.push_str(raw),
                XmlValue::Node(node) => node.write(out),
                XmlValue::Items(items) => {
                    for item in items {
                        out.push_str("<item>");
                        item.write(out);
                        out.push_str("</item>");
                    }
                }
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
    }
}

/// A literal `]]>` would close the section early, so it is split across two
fn write_cdata(text: &str, out: &mut String) {
    out.push_str("<![CDATA[");
    out.push_str(&text.replace("]]>", "]]]]><![CDATA[>"));
    out.push_str("]]>");
}

/// Render `node` under a root element
pub fn build(root: &str, node: &XmlNode) -> String {
    let mut out = String::new();
    XmlNode::element().node(root, node.clone()).write(&mut out);
    out
}

/// Parse an XML document into `T`
pub fn parse<T: DeserializeOwned>(xml: &str) -> Result<T> {
    Ok(serde_xml_rs::from_str(xml)?)
}
