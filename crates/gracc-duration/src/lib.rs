//! ISO-8601 duration parsing for grid accounting records.
//!
//! Record fields such as `WallDuration` and `CpuDuration` carry durations in
//! ISO-8601 form (`P1Y2M3DT4H5M6S`, `PT20.0S`, `P3W`, …). Downstream
//! consumers of the canonical JSON index on seconds as a float, so this
//! crate's only public operation converts a duration string straight to
//! seconds rather than producing an intermediate duration type.
//!
//! Conversion conventions (fixed, not calendar-aware): `1Y=365d`, `1M=30d`,
//! `1W=7d`, `1D=24h`. A string that does not match the ISO-8601 grammar
//! yields `0.0` rather than an error — callers that need to distinguish
//! "absent" from "zero" should check the input before calling.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use regex::Regex;
use std::sync::OnceLock;

const DAY_SECONDS: f64 = 24.0 * 3600.0;
const WEEK_SECONDS: f64 = 7.0 * DAY_SECONDS;
const MONTH_SECONDS: f64 = 30.0 * DAY_SECONDS;
const YEAR_SECONDS: f64 = 365.0 * DAY_SECONDS;

fn week_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^P(?:(?P<weeks>\d+)W)$").expect("valid regex"))
}

fn full_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^P(?:(?P<years>\d+)Y)?(?:(?P<months>\d+)M)?(?:(?P<days>\d+)D)?(?:T(?:(?P<hours>\d+)H)?(?:(?P<minutes>\d+)M)?(?:(?P<seconds>[\d.]+)S)?)?$",
        )
        .expect("valid regex")
    })
}

/// Convert an ISO-8601 duration string to seconds.
///
/// Returns `0.0` if `dur` does not match the ISO-8601 duration grammar
/// (including the empty string), per spec: a parse failure is not an error
/// at this layer.
///
/// # Examples
///
/// ```
/// use gracc_duration::to_seconds;
/// assert_eq!(to_seconds("PT20.0S"), 20.0);
/// assert_eq!(to_seconds("PT23M15.0S"), 1395.0);
/// assert_eq!(to_seconds("bad"), 0.0);
/// ```
pub fn to_seconds(dur: &str) -> f64 {
    if let Some(caps) = week_re().captures(dur) {
        let weeks: f64 = caps["weeks"].parse().unwrap_or(0.0);
        return weeks * WEEK_SECONDS;
    }

    let Some(caps) = full_re().captures(dur) else {
        return 0.0;
    };

    // A bare "P" (no components at all) matches the grammar but carries no
    // duration; Go's vendored parser treats it the same as any other parse,
    // yielding zero, so no special case is needed here.
    let years = field(&caps, "years");
    let months = field(&caps, "months");
    let days = field(&caps, "days");
    let hours = field(&caps, "hours");
    let minutes = field(&caps, "minutes");
    let seconds = field(&caps, "seconds");

    years * YEAR_SECONDS
        + months * MONTH_SECONDS
        + days * DAY_SECONDS
        + hours * 3600.0
        + minutes * 60.0
        + seconds
}

fn field(caps: &regex::Captures<'_>, name: &str) -> f64 {
    caps.name(name)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0)
}
