// SPDX-License-Identifier: MIT OR Apache-2.0
//! Parsing, canonical-JSON flattening, and bundling for the three usage
//! record families a probe can submit: `JobUsageRecord` (and the
//! equivalent `UsageRecord` root), `StorageElement`, and
//! `StorageElementRecord`.

mod bundle;
mod common;
mod envelope;
mod record;
mod xmltree;
mod xmlwrite;

use gracc_error::GraccError;

pub use bundle::{Bundle, RecordRef};
pub use common::{FieldEntry, OriginInfo};
pub use record::{
    parse_record, CpuDurationEntry, JobIdentity, JobUsageRecord, Record, RecordIdentity,
    ResourceEntry, StorageElement, StorageElementRecord, TimeDurationEntry, TimeInstantEntry,
    UnknownRecord, UserIdentity, WallDurationEntry,
};
pub use xmltree::XmlNode;

/// Parse a `multiupdate` XML envelope into a [`Bundle`], one record per
/// direct child element of the envelope's root.
///
/// The first child that fails to parse (ill-formed XML, not invalid UTF-8)
/// aborts the whole envelope with that child's [`GraccError`], per the
/// same "first failing record aborts the bundle" rule `update` follows.
pub fn parse_envelope(raw: &[u8]) -> Result<Bundle, GraccError> {
    let mut out = Bundle::new();
    for child in envelope::split_envelope(raw)? {
        out.add_record(parse_record(&child)?);
    }
    Ok(out)
}
