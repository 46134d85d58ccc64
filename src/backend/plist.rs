//! XML property list serialization.

use std::fmt::Write;

const HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
"#;

/// A property list node. Dictionaries keep insertion order.
#[derive(Debug, Clone, PartialEq)]
pub enum PlistValue {
    String(String),
    Integer(i64),
    Real(f64),
    Bool(bool),
    Array(Vec<PlistValue>),
    Dict(Vec<(String, PlistValue)>),
}

impl PlistValue {
    pub fn string(value: impl Into<String>) -> Self {
        PlistValue::String(value.into())
    }

    /// Build a dictionary from `(key, value)` pairs.
    pub fn dict<K: Into<String>>(entries: impl IntoIterator<Item = (K, PlistValue)>) -> Self {
        PlistValue::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Serialize as a complete plist document.
    #[must_use]
    pub fn to_document(&self) -> String {
        let mut out = String::from(HEADER);
        self.write_node(&mut out, 0);
        out.push_str("</plist>\n");
        out
    }

    fn write_node(&self, out: &mut String, depth: usize) {
        let indent = "\t".repeat(depth);
        match self {
            PlistValue::String(s) => {
                let _ = writeln!(out, "{indent}<string>{}</string>", escape(s));
            }
            PlistValue::Integer(i) => {
                let _ = writeln!(out, "{indent}<integer>{i}</integer>");
            }
            PlistValue::Real(r) => {
                let _ = writeln!(out, "{indent}<real>{r}</real>");
            }
            PlistValue::Bool(b) => {
                let _ = writeln!(out, "{indent}<{b}/>");
            }
            PlistValue::Array(items) if items.is_empty() => {
                let _ = writeln!(out, "{indent}<array/>");
            }
            PlistValue::Array(items) => {
                let _ = writeln!(out, "{indent}<array>");
                for item in items {
                    item.write_node(out, depth + 1);
                }
                let _ = writeln!(out, "{indent}</array>");
            }
            PlistValue::Dict(entries) if entries.is_empty() => {
                let _ = writeln!(out, "{indent}<dict/>");
            }
            PlistValue::Dict(entries) => {
                let _ = writeln!(out, "{indent}<dict>");
                for (key, value) in entries {
                    let _ = writeln!(out, "{indent}\t<key>{}</key>", escape(key));
                    value.write_node(out, depth + 1);
                }
                let _ = writeln!(out, "{indent}</dict>");
            }
        }
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
