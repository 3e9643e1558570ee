// SPDX-License-Identifier: MIT OR Apache-2.0
//! A decoded batch of records, grouped by family in submission order.

use crate::record::{JobUsageRecord, Record, StorageElement, StorageElementRecord, UnknownRecord};

/// A reference to one record inside a [`Bundle`], borrowed rather than
/// cloned out of whichever typed list it lives in.
#[derive(Debug, Clone, Copy)]
pub enum RecordRef<'a> {
    Jur(&'a JobUsageRecord),
    Se(&'a StorageElement),
    Ser(&'a StorageElementRecord),
}

impl RecordRef<'_> {
    pub fn id(&self) -> &str {
        match self {
            RecordRef::Jur(r) => r.id(),
            RecordRef::Se(r) => r.id(),
            RecordRef::Ser(r) => r.id(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            RecordRef::Jur(_) => "JobUsageRecord",
            RecordRef::Se(_) => "StorageElement",
            RecordRef::Ser(_) => "StorageElementRecord",
        }
    }

    pub fn raw(&self) -> &[u8] {
        match self {
            RecordRef::Jur(r) => &r.raw,
            RecordRef::Se(r) => &r.raw,
            RecordRef::Ser(r) => &r.base.raw,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            RecordRef::Jur(r) => r.to_json(),
            RecordRef::Se(r) => r.to_json(),
            RecordRef::Ser(r) => r.to_json(),
        }
    }

    pub fn to_xml(&self) -> String {
        match self {
            RecordRef::Jur(r) => r.to_xml(),
            RecordRef::Se(r) => r.to_xml(),
            RecordRef::Ser(r) => r.to_xml(),
        }
    }
}

/// A batch of records decoded from one request body, grouped by family.
///
/// `UsageRecord` and `JobUsageRecord` roots share identical shape but are
/// kept in separate lists so [`Bundle::record_count`] and iteration order
/// match how a probe submitted them.
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    pub usage_records: Vec<JobUsageRecord>,
    pub job_usage_records: Vec<JobUsageRecord>,
    pub storage_elements: Vec<StorageElement>,
    pub storage_element_records: Vec<StorageElementRecord>,
    pub other_records: Vec<UnknownRecord>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// File a parsed record into the appropriate list.
    pub fn add_record(&mut self, record: Record) {
        match record {
            Record::Jur(j) if j.from_usage_record_tag => self.usage_records.push(j),
            Record::Jur(j) => self.job_usage_records.push(j),
            Record::Se(s) => self.storage_elements.push(s),
            Record::Ser(s) => self.storage_element_records.push(s),
            Record::Unknown(u) => self.other_records.push(u),
        }
    }

    /// Total records filed, across every list including `other_records`.
    pub fn record_count(&self) -> usize {
        self.usage_records.len()
            + self.job_usage_records.len()
            + self.storage_elements.len()
            + self.storage_element_records.len()
            + self.other_records.len()
    }

    /// Publishable records, in `UsageRecords ++ JobUsageRecords ++
    /// StorageElements ++ StorageElementRecords` order. `other_records`
    /// (unclassifiable roots) are never yielded here — callers must
    /// account for them separately when tallying error counts.
    pub fn records(&self) -> impl Iterator<Item = RecordRef<'_>> {
        self.usage_records
            .iter()
            .map(RecordRef::Jur)
            .chain(self.job_usage_records.iter().map(RecordRef::Jur))
            .chain(self.storage_elements.iter().map(RecordRef::Se))
            .chain(self.storage_element_records.iter().map(RecordRef::Ser))
    }
}
