// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sub-structures shared by every record family: composition, not
//! inheritance, since `Origin` and `Fields` are identical across
//! `JobUsageRecord`, `StorageElement`, and `StorageElementRecord`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::xmltree::XmlNode;

/// A captured but not specifically recognised child element.
///
/// Corresponds to an entry of a record's `Fields` list: every XML child
/// that isn't one of a record family's named sub-structures ends up here,
/// keyed by its own tag name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEntry {
    /// The element's local tag name — also the flattened key (§4.2).
    pub name: String,
    /// Character-data value, if the element had any non-empty text.
    pub value: Option<String>,
    /// `description` attribute.
    pub description: Option<String>,
    /// `unit` attribute.
    pub unit: Option<String>,
    /// `phaseUnit` attribute (an ISO-8601 duration, flattened to seconds).
    pub phase_unit: Option<String>,
    /// `storageUnit` attribute.
    pub storage_unit: Option<String>,
    /// `formula` attribute.
    pub formula: Option<String>,
    /// `metric` attribute.
    pub metric: Option<String>,
}

impl FieldEntry {
    pub(crate) fn from_node(node: &XmlNode) -> Self {
        let text = node.text.trim();
        Self {
            name: node.name.clone(),
            value: (!text.is_empty()).then(|| text.to_string()),
            description: node.attr("description").map(str::to_string),
            unit: node.attr("unit").map(str::to_string),
            phase_unit: node.attr("phaseUnit").map(str::to_string),
            storage_unit: node.attr("storageUnit").map(str::to_string),
            formula: node.attr("formula").map(str::to_string),
            metric: node.attr("metric").map(str::to_string),
        }
    }
}

/// Origin / replication chain metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginInfo {
    /// Number of collector hops this record has been relayed through.
    pub hop: Option<i64>,
    /// The instant the most recent hop's server stamped the record.
    pub server_date: Option<String>,
    /// Hostname of the sending collector.
    pub sender_host: Option<String>,
    /// Identity of the sending collector.
    pub sender: Option<String>,
    /// Identity of the collector that produced this hop.
    pub collector: Option<String>,
}

impl OriginInfo {
    pub(crate) fn from_node(node: &XmlNode) -> Self {
        let connection = node.child("Connection");
        Self {
            hop: node.attr("hop").and_then(|h| h.parse().ok()),
            server_date: node.child_text("ServerDate").filter(|s| !s.is_empty()),
            sender_host: connection
                .and_then(|c| c.child_text("SenderHost"))
                .filter(|s| !s.is_empty()),
            sender: connection
                .and_then(|c| c.child_text("Sender"))
                .filter(|s| !s.is_empty()),
            collector: connection
                .and_then(|c| c.child_text("Collector"))
                .filter(|s| !s.is_empty()),
        }
    }
}

/// Map a `description`/`type` attribute to a flatten-safe key: `.` and ` `
/// become `-`; an absent or empty value becomes `"unknown"`.
pub(crate) fn flatten_key(raw: Option<&str>) -> String {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.chars().map(|c| if c == '.' || c == ' ' { '-' } else { c }).collect(),
        None => "unknown".to_string(),
    }
}

/// Best-effort RFC-3339 normalisation: re-format if parseable, otherwise
/// pass the source text through unchanged. Unlike durations, a malformed
/// instant has no numeric fallback to fall back to.
pub(crate) fn flatten_instant(raw: &str) -> String {
    let trimmed = raw.trim();
    chrono::DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|_| trimmed.to_string())
}

pub(crate) fn flatten_fields(fields: &[FieldEntry], out: &mut Map<String, Value>) {
    for f in fields {
        if let Some(v) = &f.value {
            out.insert(f.name.clone(), Value::String(v.clone()));
        }
        if let Some(d) = &f.description {
            out.insert(format!("{}_description", f.name), Value::String(d.clone()));
        }
        if let Some(u) = &f.unit {
            out.insert(format!("{}_unit", f.name), Value::String(u.clone()));
        }
        if let Some(pu) = &f.phase_unit {
            out.insert(
                format!("{}_phaseUnit", f.name),
                serde_json::json!(gracc_duration::to_seconds(pu)),
            );
        }
        if let Some(su) = &f.storage_unit {
            out.insert(format!("{}_storageUnit", f.name), Value::String(su.clone()));
        }
        if let Some(fo) = &f.formula {
            out.insert(format!("{}_formula", f.name), Value::String(fo.clone()));
        }
        if let Some(me) = &f.metric {
            out.insert(format!("{}_metric", f.name), Value::String(me.clone()));
        }
    }
}

pub(crate) fn flatten_origin(origin: &Option<OriginInfo>, out: &mut Map<String, Value>) {
    let Some(o) = origin else { return };
    if let Some(hop) = o.hop {
        if hop > 0 {
            out.insert("Origin_hop".to_string(), serde_json::json!(hop));
        }
    }
    if let Some(sd) = &o.server_date {
        out.insert("OriginServerDate".to_string(), Value::String(flatten_instant(sd)));
    }
    if let Some(sh) = &o.sender_host {
        out.insert("OriginSenderHost".to_string(), Value::String(sh.clone()));
    }
    if let Some(s) = &o.sender {
        out.insert("OriginSender".to_string(), Value::String(s.clone()));
    }
    if let Some(c) = &o.collector {
        out.insert("OriginCollector".to_string(), Value::String(c.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_key_maps_dots_and_spaces() {
        assert_eq!(flatten_key(Some("a.b c")), "a-b-c");
    }

    #[test]
    fn flatten_key_defaults_to_unknown() {
        assert_eq!(flatten_key(None), "unknown");
        assert_eq!(flatten_key(Some("  ")), "unknown");
    }

    #[test]
    fn flatten_instant_passes_through_unparseable() {
        assert_eq!(flatten_instant("not-a-date"), "not-a-date");
    }

    #[test]
    fn flatten_instant_normalises_valid_rfc3339() {
        let got = flatten_instant("2020-01-01T00:00:00Z");
        assert!(got.starts_with("2020-01-01T00:00:00"));
    }
}
