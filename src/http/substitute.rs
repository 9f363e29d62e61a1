// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! `values_for` substitution into outgoing bodies
//!
//! Three body flavours are handled:
//!
//! - XML/SOAP strings: the first `<tag>...</tag>` per key is rewritten,
//!   namespace prefixes optionally ignored.
//! - JSON strings: targeted pattern replacement per key, covering quoted
//!   and bare keys with quoted or word values.
//! - Structured JSON: matching keys are set wherever they occur inside the
//!   record. For a list of records the substitution is either one record
//!   applied to every entry or a list applied positionally.

use regex::{NoExpand, Regex, RegexBuilder};
use serde_json::{Map, Value as JsonValue};

use crate::error::{Error, Result};

/// Content types treated as XML for substitution
const XML_CONTENT_TYPES: &[&str] = &["text/xml", "application/soap+xml", "application/jxml"];

/// True for content types rewritten with XML tag substitution
pub fn is_xml_content_type(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    XML_CONTENT_TYPES.iter().any(|x| ct.contains(x))
}

/// True for JSON content types
pub fn is_json_content_type(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("application/json")
}

fn strip_prefix(tag_name: &str) -> &str {
    match tag_name.find(':') {
        Some(i) => &tag_name[i + 1..],
        None => tag_name,
    }
}

fn xml_tag_regex(tag_name: &str, take_off_prefix: bool) -> Option<Regex> {
    let tag = regex::escape(tag_name);
    let ns = if take_off_prefix {
        r"(?:[A-Za-z0-9_\-]+:)?"
    } else {
        ""
    };
    let pattern = format!(r"(<{ns}{tag}(?:\s[^>]*)?>)(.*?)(</{ns}{tag}>)");
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .ok()
}

/// Replace the content of the first `tag_name` element.
///
/// With `take_off_prefix`, a namespace prefix on `tag_name` is dropped and
/// elements match whatever prefix they carry in the document.
pub fn set_value_xml_tag(tag_name: &str, xml: &str, value: &str, take_off_prefix: bool) -> String {
    if xml.is_empty() {
        return String::new();
    }
    let tag_name = if take_off_prefix {
        strip_prefix(tag_name)
    } else {
        tag_name
    };
    let Some(re) = xml_tag_regex(tag_name, take_off_prefix) else {
        return xml.to_string();
    };
    re.replacen(xml, 1, |caps: &regex::Captures| {
        format!("{}{}{}", &caps[1], value, &caps[3])
    })
    .into_owned()
}

/// Every value held by `tag_name` elements, in document order.
///
/// Returns an empty vector when the tag does not occur.
pub fn get_value_xml_tag(tag_name: &str, xml: &str, take_off_prefix: bool) -> Vec<String> {
    let tag_name = if take_off_prefix {
        strip_prefix(tag_name)
    } else {
        tag_name
    };
    match xml_tag_regex(tag_name, take_off_prefix) {
        Some(re) => re
            .captures_iter(xml)
            .map(|caps| caps[2].to_string())
            .collect(),
        None => Vec::new(),
    }
}

/// Rewrite `key: value` occurrences inside a JSON-like string body
pub fn substitute_json_string(data: &str, values: &Map<String, JsonValue>) -> String {
    let mut out = data.to_string();
    for (key, value) in values {
        let k = regex::escape(key);
        let v = match value {
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        };
        let rules = [
            (format!(r#""({k})":\s*"([^"]*)""#), format!(r#""{key}": "{v}""#)),
            (format!(r#"\b({k}):\s*"([^"]*)""#), format!(r#"{key}: "{v}""#)),
            (format!(r#"\b({k}):\s*'([^']*)'"#), format!("{key}: '{v}'")),
            (format!(r#""({k})":\s*(\w+)"#), format!(r#""{key}": {v}"#)),
            (format!(r#"\b({k}):\s*(\w+)"#), format!("{key}: {v}")),
        ];
        for (pattern, replacement) in rules {
            if let Ok(re) = Regex::new(&pattern) {
                out = re.replace_all(&out, NoExpand(&replacement)).into_owned();
            }
        }
    }
    out
}

/// Set every key of `values` wherever it appears inside `target`
pub fn set_values(target: &mut JsonValue, values: &Map<String, JsonValue>) {
    match target {
        JsonValue::Object(map) => {
            for (key, slot) in map.iter_mut() {
                match values.get(key) {
                    Some(replacement) => *slot = replacement.clone(),
                    None => set_values(slot, values),
                }
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                set_values(item, values);
            }
        }
        _ => {}
    }
}

/// Apply substitutions to a structured body.
///
/// `values_for` must be a record, or for list bodies a record or a list of
/// records. Entries of a list body must be records or lists themselves.
pub fn apply_structured(body: &mut JsonValue, values_for: &JsonValue) -> Result<()> {
    match body {
        JsonValue::Object(_) => match values_for {
            JsonValue::Object(values) => {
                set_values(body, values);
                Ok(())
            }
            JsonValue::Null => Ok(()),
            _ => Err(Error::data_shape(
                "values_for needs to be a hash when the data is a hash",
            )),
        },
        JsonValue::Array(rows) => {
            if values_for.is_null() {
                return Ok(());
            }
            for (i, row) in rows.iter_mut().enumerate() {
                if !(row.is_object() || row.is_array()) {
                    return Err(Error::data_shape(format!(
                        "entry {} of the array is not a record, be sure is a Hash, Array of Hashes or JSON string",
                        i
                    )));
                }
                match values_for {
                    JsonValue::Object(values) => set_values(row, values),
                    JsonValue::Array(per_row) => {
                        if let Some(JsonValue::Object(values)) = per_row.get(i) {
                            set_values(row, values);
                        }
                    }
                    _ => {
                        return Err(Error::data_shape(
                            "values_for needs to be an array or a hash",
                        ))
                    }
                }
            }
            Ok(())
        }
        _ => Err(Error::data_shape(
            "be sure is a Hash, Array of Hashes or JSON string",
        )),
    }
}
