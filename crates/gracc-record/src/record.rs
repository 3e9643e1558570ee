// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed record families and the canonical-JSON flatten operation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use gracc_error::{ErrorCode, GraccError};

use crate::common::{flatten_fields, flatten_instant, flatten_key, flatten_origin, FieldEntry, OriginInfo};
use crate::xmltree::{self, XmlNode};

/// `RecordIdentity` sub-structure common to job usage records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordIdentity {
    pub record_id: String,
    pub create_time: String,
}

/// `JobIdentity` sub-structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobIdentity {
    pub global_job_id: String,
    pub local_job_id: String,
    pub process_id: Vec<String>,
}

/// `UserIdentity` sub-structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub global_username: String,
    pub local_user_id: String,
    pub vo_name: String,
    pub reportable_vo_name: String,
    pub common_name: String,
    pub dn: String,
}

/// A `CpuDuration` entry (there may be several, one per usage type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuDurationEntry {
    pub usage_type: String,
    pub description: Option<String>,
    pub value: String,
}

/// The single `WallDuration` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallDurationEntry {
    pub description: Option<String>,
    pub value: String,
}

/// A `Resource`/`ConsumableResource`/`PhaseResource`/`VolumeResource` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub description: Option<String>,
    pub value: String,
    pub unit: Option<String>,
    pub phase_unit: Option<String>,
    pub storage_unit: Option<String>,
}

/// A `TimeDuration` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeDurationEntry {
    pub kind: Option<String>,
    pub description: Option<String>,
    pub value: String,
}

/// A `TimeInstant` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInstantEntry {
    pub kind: Option<String>,
    pub description: Option<String>,
    pub value: String,
}

/// A fully parsed `JobUsageRecord` (or `UsageRecord` — the two root tags
/// share an identical shape and are distinguished only by which bundle
/// list they end up in).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobUsageRecord {
    pub record_identity: RecordIdentity,
    pub job_identity: JobIdentity,
    pub user_identity: UserIdentity,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub wall_duration: Option<WallDurationEntry>,
    pub cpu_duration: Vec<CpuDurationEntry>,
    pub resource: Vec<ResourceEntry>,
    pub consumable_resource: Vec<ResourceEntry>,
    pub phase_resource: Vec<ResourceEntry>,
    pub volume_resource: Vec<ResourceEntry>,
    pub time_duration: Vec<TimeDurationEntry>,
    pub time_instant: Vec<TimeInstantEntry>,
    pub origin: Option<OriginInfo>,
    pub fields: Vec<FieldEntry>,
    /// `true` if the root element was `UsageRecord` rather than
    /// `JobUsageRecord` — used only to route into the right bundle list.
    pub from_usage_record_tag: bool,
    pub raw: Vec<u8>,
}

/// A fully parsed `StorageElement`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageElement {
    pub unique_id: Option<String>,
    pub timestamp: Option<String>,
    pub origin: Option<OriginInfo>,
    pub fields: Vec<FieldEntry>,
    pub raw: Vec<u8>,
}

/// A fully parsed `StorageElementRecord` — a `StorageElement` plus five
/// numeric capacity fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageElementRecord {
    pub base: StorageElement,
    pub total_space: Option<u64>,
    pub free_space: Option<u64>,
    pub used_space: Option<u64>,
    pub file_count: Option<u64>,
    pub file_count_limit: Option<u64>,
}

/// A well-formed XML document whose root element isn't one of the three
/// recognised record families. Classifying as `Unknown` is success, not
/// failure — the bundle still counts it, just never publishes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownRecord {
    pub root_name: String,
    pub raw: Vec<u8>,
}

/// Any parsed record, still tagged with which family it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Record {
    Jur(JobUsageRecord),
    Se(StorageElement),
    Ser(StorageElementRecord),
    Unknown(UnknownRecord),
}

const JUR_KNOWN: &[&str] = &[
    "RecordIdentity",
    "JobIdentity",
    "UserIdentity",
    "WallDuration",
    "CpuDuration",
    "StartTime",
    "EndTime",
    "TimeDuration",
    "TimeInstant",
    "Resource",
    "ConsumableResource",
    "PhaseResource",
    "VolumeResource",
    "Origin",
];

const SE_KNOWN: &[&str] = &["UniqueID", "Timestamp", "Origin"];

const SER_KNOWN: &[&str] = &[
    "UniqueID",
    "Timestamp",
    "Origin",
    "TotalSpace",
    "FreeSpace",
    "UsedSpace",
    "FileCount",
    "FileCountLimit",
];

fn resource_entry(node: &XmlNode) -> ResourceEntry {
    ResourceEntry {
        description: node.attr("description").map(str::to_string),
        value: node.text.trim().to_string(),
        unit: node.attr("unit").map(str::to_string),
        phase_unit: node.attr("phaseUnit").map(str::to_string),
        storage_unit: node.attr("storageUnit").map(str::to_string),
    }
}

fn parse_jur(root: &XmlNode, from_usage_record_tag: bool, raw: &[u8]) -> JobUsageRecord {
    let record_identity = root
        .child("RecordIdentity")
        .map(|n| RecordIdentity {
            record_id: n.attr("recordId").unwrap_or_default().to_string(),
            create_time: n.attr("createTime").unwrap_or_default().to_string(),
        })
        .unwrap_or_default();

    let job_identity = root
        .child("JobIdentity")
        .map(|n| JobIdentity {
            global_job_id: n.child_text("GlobalJobId").unwrap_or_default(),
            local_job_id: n.child_text("LocalJobId").unwrap_or_default(),
            process_id: n
                .children_named("ProcessId")
                .map(|c| c.text.trim().to_string())
                .collect(),
        })
        .unwrap_or_default();

    let user_identity = root
        .child("UserIdentity")
        .map(|n| UserIdentity {
            global_username: n.child_text("GlobalUsername").unwrap_or_default(),
            local_user_id: n.child_text("LocalUserId").unwrap_or_default(),
            vo_name: n.child_text("VOName").unwrap_or_default(),
            reportable_vo_name: n.child_text("ReportableVOName").unwrap_or_default(),
            common_name: n.child_text("CommonName").unwrap_or_default(),
            dn: n.child_text("DN").unwrap_or_default(),
        })
        .unwrap_or_default();

    let wall_duration = root.child("WallDuration").map(|n| WallDurationEntry {
        description: n.attr("description").map(str::to_string),
        value: n.text.trim().to_string(),
    });

    let cpu_duration = root
        .children_named("CpuDuration")
        .map(|n| CpuDurationEntry {
            usage_type: n.attr("usageType").unwrap_or_default().to_string(),
            description: n.attr("description").map(str::to_string),
            value: n.text.trim().to_string(),
        })
        .collect();

    let time_duration = root
        .children_named("TimeDuration")
        .map(|n| TimeDurationEntry {
            kind: n.attr("type").map(str::to_string),
            description: n.attr("description").map(str::to_string),
            value: n.text.trim().to_string(),
        })
        .collect();

    let time_instant = root
        .children_named("TimeInstant")
        .map(|n| TimeInstantEntry {
            kind: n.attr("type").map(str::to_string),
            description: n.attr("description").map(str::to_string),
            value: n.text.trim().to_string(),
        })
        .collect();

    let origin = root.child("Origin").map(OriginInfo::from_node);

    let fields = root
        .children
        .iter()
        .filter(|c| !JUR_KNOWN.contains(&c.name.as_str()))
        .map(FieldEntry::from_node)
        .collect();

    JobUsageRecord {
        record_identity,
        job_identity,
        user_identity,
        start_time: root.child_text("StartTime").filter(|s| !s.is_empty()),
        end_time: root.child_text("EndTime").filter(|s| !s.is_empty()),
        wall_duration,
        cpu_duration,
        resource: root.children_named("Resource").map(resource_entry).collect(),
        consumable_resource: root
            .children_named("ConsumableResource")
            .map(resource_entry)
            .collect(),
        phase_resource: root.children_named("PhaseResource").map(resource_entry).collect(),
        volume_resource: root.children_named("VolumeResource").map(resource_entry).collect(),
        time_duration,
        time_instant,
        origin,
        fields,
        from_usage_record_tag,
        raw: raw.to_vec(),
    }
}

fn parse_se(root: &XmlNode, raw: &[u8]) -> StorageElement {
    StorageElement {
        unique_id: root.child_text("UniqueID").filter(|s| !s.is_empty()),
        timestamp: root.child_text("Timestamp").filter(|s| !s.is_empty()),
        origin: root.child("Origin").map(OriginInfo::from_node),
        fields: root
            .children
            .iter()
            .filter(|c| !SE_KNOWN.contains(&c.name.as_str()))
            .map(FieldEntry::from_node)
            .collect(),
        raw: raw.to_vec(),
    }
}

fn parse_u64_child(root: &XmlNode, name: &str) -> Option<u64> {
    root.child_text(name).and_then(|s| s.parse().ok())
}

fn parse_ser(root: &XmlNode, raw: &[u8]) -> StorageElementRecord {
    let base = StorageElement {
        unique_id: root.child_text("UniqueID").filter(|s| !s.is_empty()),
        timestamp: root.child_text("Timestamp").filter(|s| !s.is_empty()),
        origin: root.child("Origin").map(OriginInfo::from_node),
        fields: root
            .children
            .iter()
            .filter(|c| !SER_KNOWN.contains(&c.name.as_str()))
            .map(FieldEntry::from_node)
            .collect(),
        raw: raw.to_vec(),
    };
    StorageElementRecord {
        total_space: parse_u64_child(root, "TotalSpace"),
        free_space: parse_u64_child(root, "FreeSpace"),
        used_space: parse_u64_child(root, "UsedSpace"),
        file_count: parse_u64_child(root, "FileCount"),
        file_count_limit: parse_u64_child(root, "FileCountLimit"),
        base,
    }
}

/// Parse one record's raw bytes into a classified [`Record`].
///
/// A recognised root (`UsageRecord`, `JobUsageRecord`, `StorageElement`,
/// `StorageElementRecord`) always succeeds. Any other well-formed root
/// also succeeds, as [`Record::Unknown`] — only bytes that aren't valid
/// UTF-8 or aren't well-formed XML at all are reported as an error.
pub fn parse_record(raw: &[u8]) -> Result<Record, GraccError> {
    let text = std::str::from_utf8(raw).map_err(|e| {
        GraccError::new(ErrorCode::MalformedRecord, "record is not valid UTF-8").with_source(e)
    })?;

    let root = xmltree::parse(text)
        .map_err(|e| GraccError::new(ErrorCode::MalformedRecord, "record is not well-formed XML").with_source(e))?;

    Ok(match root.name.as_str() {
        "UsageRecord" => Record::Jur(parse_jur(&root, true, raw)),
        "JobUsageRecord" => Record::Jur(parse_jur(&root, false, raw)),
        "StorageElementRecord" => Record::Ser(parse_ser(&root, raw)),
        "StorageElement" => Record::Se(parse_se(&root, raw)),
        other => Record::Unknown(UnknownRecord {
            root_name: other.to_string(),
            raw: raw.to_vec(),
        }),
    })
}

fn flatten_resource_type(out: &mut Map<String, Value>) {
    let raw = out.remove("Resource_ResourceType").and_then(|v| v.as_str().map(str::to_string));
    let resolved = match raw.as_deref() {
        None | Some("") | Some("Batch") => "Batch",
        Some("BatchPilot") => "Payload",
        Some(other) => other,
    };
    out.insert("ResourceType".to_string(), Value::String(resolved.to_string()));
}

fn flatten_resources(entries: &[ResourceEntry], out: &mut Map<String, Value>) {
    for r in entries {
        let key = flatten_key(r.description.as_deref());
        out.insert(format!("Resource_{key}"), Value::String(r.value.clone()));
        if let Some(u) = &r.unit {
            out.insert(format!("Resource_{key}_unit"), Value::String(u.clone()));
        }
        if let Some(pu) = &r.phase_unit {
            out.insert(
                format!("Resource_{key}_phaseUnit"),
                serde_json::json!(gracc_duration::to_seconds(pu)),
            );
        }
        if let Some(su) = &r.storage_unit {
            out.insert(format!("Resource_{key}_storageUnit"), Value::String(su.clone()));
        }
    }
}

impl JobUsageRecord {
    /// Canonical `RecordId`, used for logging and as the JSON `RecordId`.
    pub fn id(&self) -> &str {
        &self.record_identity.record_id
    }

    /// Flatten into the canonical JSON representation published to the
    /// broker.
    pub fn to_json(&self) -> Value {
        let mut m = Map::new();
        m.insert("type".to_string(), Value::String("JobUsageRecord".to_string()));
        m.insert("RecordId".to_string(), Value::String(self.record_identity.record_id.clone()));
        m.insert(
            "CreateTime".to_string(),
            Value::String(flatten_instant(&self.record_identity.create_time)),
        );
        m.insert("GlobalJobId".to_string(), Value::String(self.job_identity.global_job_id.clone()));
        m.insert("LocalJobId".to_string(), Value::String(self.job_identity.local_job_id.clone()));
        m.insert(
            "GlobalUsername".to_string(),
            Value::String(self.user_identity.global_username.clone()),
        );
        m.insert("LocalUserId".to_string(), Value::String(self.user_identity.local_user_id.clone()));
        m.insert("VOName".to_string(), Value::String(self.user_identity.vo_name.clone()));
        m.insert(
            "ReportableVOName".to_string(),
            Value::String(self.user_identity.reportable_vo_name.clone()),
        );
        m.insert("CommonName".to_string(), Value::String(self.user_identity.common_name.clone()));
        m.insert("DN".to_string(), Value::String(self.user_identity.dn.clone()));

        let start = self.start_time.as_deref().unwrap_or("");
        m.insert("StartTime".to_string(), Value::String(flatten_instant(start)));
        let end = self.end_time.as_deref().unwrap_or("");
        m.insert("EndTime".to_string(), Value::String(flatten_instant(end)));

        let wall_value = self.wall_duration.as_ref().map(|w| w.value.as_str()).unwrap_or("");
        m.insert("WallDuration".to_string(), serde_json::json!(gracc_duration::to_seconds(wall_value)));
        if let Some(Some(d)) = self.wall_duration.as_ref().map(|w| w.description.clone()) {
            m.insert("WallDuration_description".to_string(), Value::String(d));
        }

        let mut total_cpu = 0.0;
        for c in &self.cpu_duration {
            let secs = gracc_duration::to_seconds(&c.value);
            if secs > 0.0 {
                total_cpu += secs;
            }
            m.insert(format!("CpuDuration_{}", c.usage_type), serde_json::json!(secs));
            if let Some(d) = &c.description {
                m.insert(format!("CpuDuration_{}_description", c.usage_type), Value::String(d.clone()));
            }
        }
        m.insert("CpuDuration".to_string(), serde_json::json!(total_cpu));

        flatten_resources(&self.resource, &mut m);
        flatten_resources(&self.consumable_resource, &mut m);
        flatten_resources(&self.phase_resource, &mut m);
        flatten_resources(&self.volume_resource, &mut m);
        flatten_resource_type(&mut m);

        for t in &self.time_duration {
            let key = flatten_key(t.kind.as_deref());
            m.insert(format!("TimeDuration_{key}"), serde_json::json!(gracc_duration::to_seconds(&t.value)));
            if let Some(d) = &t.description {
                m.insert(format!("TimeDuration_{key}_description"), Value::String(d.clone()));
            }
        }
        for t in &self.time_instant {
            let key = flatten_key(t.kind.as_deref());
            m.insert(format!("TimeInstant_{key}"), Value::String(flatten_instant(&t.value)));
            if let Some(d) = &t.description {
                m.insert(format!("TimeInstant_{key}_description"), Value::String(d.clone()));
            }
        }

        flatten_origin(&self.origin, &mut m);
        flatten_fields(&self.fields, &mut m);

        m.insert("RawXML".to_string(), Value::String(String::from_utf8_lossy(&self.raw).into_owned()));
        Value::Object(m)
    }

    /// Re-marshal through the model rather than passing `raw` through
    /// verbatim, as the `"xml"` publish format requires.
    pub fn to_xml(&self) -> String {
        let root_name = if self.from_usage_record_tag { "UsageRecord" } else { "JobUsageRecord" };
        let mut w = crate::xmlwrite::XmlWriter::new();
        w.open(root_name, &[]);
        w.leaf(
            "RecordIdentity",
            &[
                ("recordId", &self.record_identity.record_id),
                ("createTime", &self.record_identity.create_time),
            ],
            None,
        );
        w.open("JobIdentity", &[]);
        w.leaf("GlobalJobId", &[], Some(&self.job_identity.global_job_id));
        w.leaf("LocalJobId", &[], Some(&self.job_identity.local_job_id));
        for p in &self.job_identity.process_id {
            w.leaf("ProcessId", &[], Some(p));
        }
        w.close("JobIdentity");
        w.open("UserIdentity", &[]);
        w.leaf("GlobalUsername", &[], Some(&self.user_identity.global_username));
        w.leaf("LocalUserId", &[], Some(&self.user_identity.local_user_id));
        w.leaf("VOName", &[], Some(&self.user_identity.vo_name));
        w.leaf("ReportableVOName", &[], Some(&self.user_identity.reportable_vo_name));
        w.leaf("CommonName", &[], Some(&self.user_identity.common_name));
        w.leaf("DN", &[], Some(&self.user_identity.dn));
        w.close("UserIdentity");
        if let Some(s) = &self.start_time {
            w.leaf("StartTime", &[], Some(s));
        }
        if let Some(e) = &self.end_time {
            w.leaf("EndTime", &[], Some(e));
        }
        if let Some(wd) = &self.wall_duration {
            let attrs: Vec<(&str, &str)> = wd.description.as_deref().map(|d| vec![("description", d)]).unwrap_or_default();
            w.leaf("WallDuration", &attrs, Some(&wd.value));
        }
        for c in &self.cpu_duration {
            let mut attrs = vec![("usageType", c.usage_type.as_str())];
            if let Some(d) = &c.description {
                attrs.push(("description", d));
            }
            w.leaf("CpuDuration", &attrs, Some(&c.value));
        }
        write_resources(&mut w, "Resource", &self.resource);
        write_resources(&mut w, "ConsumableResource", &self.consumable_resource);
        write_resources(&mut w, "PhaseResource", &self.phase_resource);
        write_resources(&mut w, "VolumeResource", &self.volume_resource);
        for t in &self.time_duration {
            let mut attrs = Vec::new();
            if let Some(k) = &t.kind {
                attrs.push(("type", k.as_str()));
            }
            if let Some(d) = &t.description {
                attrs.push(("description", d.as_str()));
            }
            w.leaf("TimeDuration", &attrs, Some(&t.value));
        }
        for t in &self.time_instant {
            let mut attrs = Vec::new();
            if let Some(k) = &t.kind {
                attrs.push(("type", k.as_str()));
            }
            if let Some(d) = &t.description {
                attrs.push(("description", d.as_str()));
            }
            w.leaf("TimeInstant", &attrs, Some(&t.value));
        }
        write_origin(&mut w, &self.origin);
        write_fields(&mut w, &self.fields);
        w.close(root_name);
        w.finish()
    }
}

fn write_resources(w: &mut crate::xmlwrite::XmlWriter, tag: &str, entries: &[ResourceEntry]) {
    for r in entries {
        let mut attrs = Vec::new();
        if let Some(d) = &r.description {
            attrs.push(("description", d.as_str()));
        }
        if let Some(u) = &r.unit {
            attrs.push(("unit", u.as_str()));
        }
        if let Some(pu) = &r.phase_unit {
            attrs.push(("phaseUnit", pu.as_str()));
        }
        if let Some(su) = &r.storage_unit {
            attrs.push(("storageUnit", su.as_str()));
        }
        w.leaf(tag, &attrs, Some(&r.value));
    }
}

fn write_origin(w: &mut crate::xmlwrite::XmlWriter, origin: &Option<OriginInfo>) {
    let Some(o) = origin else { return };
    let hop_str = o.hop.map(|h| h.to_string());
    let attrs: Vec<(&str, &str)> = hop_str.as_deref().map(|h| vec![("hop", h)]).unwrap_or_default();
    w.open("Origin", &attrs);
    if let Some(sd) = &o.server_date {
        w.leaf("ServerDate", &[], Some(sd));
    }
    if o.sender_host.is_some() || o.sender.is_some() || o.collector.is_some() {
        w.open("Connection", &[]);
        if let Some(sh) = &o.sender_host {
            w.leaf("SenderHost", &[], Some(sh));
        }
        if let Some(s) = &o.sender {
            w.leaf("Sender", &[], Some(s));
        }
        if let Some(c) = &o.collector {
            w.leaf("Collector", &[], Some(c));
        }
        w.close("Connection");
    }
    w.close("Origin");
}

fn write_fields(w: &mut crate::xmlwrite::XmlWriter, fields: &[FieldEntry]) {
    for f in fields {
        let mut attrs = Vec::new();
        if let Some(d) = &f.description {
            attrs.push(("description", d.as_str()));
        }
        if let Some(u) = &f.unit {
            attrs.push(("unit", u.as_str()));
        }
        if let Some(pu) = &f.phase_unit {
            attrs.push(("phaseUnit", pu.as_str()));
        }
        if let Some(su) = &f.storage_unit {
            attrs.push(("storageUnit", su.as_str()));
        }
        if let Some(fo) = &f.formula {
            attrs.push(("formula", fo.as_str()));
        }
        if let Some(me) = &f.metric {
            attrs.push(("metric", me.as_str()));
        }
        w.leaf(&f.name, &attrs, f.value.as_deref());
    }
}

impl StorageElement {
    pub fn id(&self) -> &str {
        self.unique_id.as_deref().unwrap_or("")
    }

    fn to_json_as(&self, type_name: &str) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("type".to_string(), Value::String(type_name.to_string()));
        m.insert("UniqueID".to_string(), Value::String(self.unique_id.clone().unwrap_or_default()));
        if let Some(ts) = &self.timestamp {
            m.insert("Timestamp".to_string(), Value::String(flatten_instant(ts)));
        }
        flatten_origin(&self.origin, &mut m);
        flatten_fields(&self.fields, &mut m);
        m.insert("RawXML".to_string(), Value::String(String::from_utf8_lossy(&self.raw).into_owned()));
        m
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.to_json_as("StorageElement"))
    }

    fn write_body(&self, w: &mut crate::xmlwrite::XmlWriter) {
        w.leaf("UniqueID", &[], self.unique_id.as_deref());
        if let Some(ts) = &self.timestamp {
            w.leaf("Timestamp", &[], Some(ts));
        }
        write_origin(w, &self.origin);
        write_fields(w, &self.fields);
    }

    pub fn to_xml(&self) -> String {
        let mut w = crate::xmlwrite::XmlWriter::new();
        w.open("StorageElement", &[]);
        self.write_body(&mut w);
        w.close("StorageElement");
        w.finish()
    }
}

impl StorageElementRecord {
    pub fn id(&self) -> &str {
        self.base.id()
    }

    pub fn to_json(&self) -> Value {
        let mut m = self.base.to_json_as("StorageElementRecord");
        if let Some(v) = self.total_space {
            m.insert("TotalSpace".to_string(), serde_json::json!(v));
        }
        if let Some(v) = self.free_space {
            m.insert("FreeSpace".to_string(), serde_json::json!(v));
        }
        if let Some(v) = self.used_space {
            m.insert("UsedSpace".to_string(), serde_json::json!(v));
        }
        if let Some(v) = self.file_count {
            m.insert("FileCount".to_string(), serde_json::json!(v));
        }
        if let Some(v) = self.file_count_limit {
            m.insert("FileCountLimit".to_string(), serde_json::json!(v));
        }
        Value::Object(m)
    }

    pub fn to_xml(&self) -> String {
        let mut w = crate::xmlwrite::XmlWriter::new();
        w.open("StorageElementRecord", &[]);
        self.base.write_body(&mut w);
        if let Some(v) = self.total_space {
            w.leaf("TotalSpace", &[], Some(&v.to_string()));
        }
        if let Some(v) = self.free_space {
            w.leaf("FreeSpace", &[], Some(&v.to_string()));
        }
        if let Some(v) = self.used_space {
            w.leaf("UsedSpace", &[], Some(&v.to_string()));
        }
        if let Some(v) = self.file_count {
            w.leaf("FileCount", &[], Some(&v.to_string()));
        }
        if let Some(v) = self.file_count_limit {
            w.leaf("FileCountLimit", &[], Some(&v.to_string()));
        }
        w.close("StorageElementRecord");
        w.finish()
    }
}

impl Record {
    pub fn id(&self) -> &str {
        match self {
            Record::Jur(r) => r.id(),
            Record::Se(r) => r.id(),
            Record::Ser(r) => r.id(),
            Record::Unknown(_) => "",
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Record::Jur(_) => "JobUsageRecord",
            Record::Se(_) => "StorageElement",
            Record::Ser(_) => "StorageElementRecord",
            Record::Unknown(_) => "Unknown",
        }
    }

    pub fn raw(&self) -> &[u8] {
        match self {
            Record::Jur(r) => &r.raw,
            Record::Se(r) => &r.raw,
            Record::Ser(r) => &r.base.raw,
            Record::Unknown(r) => &r.raw,
        }
    }

    pub fn to_json(&self) -> Option<Value> {
        match self {
            Record::Jur(r) => Some(r.to_json()),
            Record::Se(r) => Some(r.to_json()),
            Record::Ser(r) => Some(r.to_json()),
            Record::Unknown(_) => None,
        }
    }

    /// Re-marshal through the model for the `"xml"` publish format.
    /// `None` for [`Record::Unknown`] — those are never published.
    pub fn to_xml(&self) -> Option<String> {
        match self {
            Record::Jur(r) => Some(r.to_xml()),
            Record::Se(r) => Some(r.to_xml()),
            Record::Ser(r) => Some(r.to_xml()),
            Record::Unknown(_) => None,
        }
    }
}
