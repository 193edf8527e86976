//! Timestamp normalization shared by the HTTP North and HTTP South
//! plugins, per `spec.md` §6.
//!
//! User timestamps are normalized to UTC with six-digit fractional seconds
//! and a `+00` suffix. Any `±HH:MM` offset is replaced with `+00` without
//! conversion — the caller is expected to already emit UTC.

use chrono::{DateTime, SecondsFormat, Utc};

/// Formats `ts` as `YYYY-MM-DDTHH:MM:SS.ffffff+00`.
pub fn normalize_timestamp(ts: DateTime<Utc>) -> String {
    let formatted = ts.to_rfc3339_opts(SecondsFormat::Micros, true);
    // `to_rfc3339_opts` with `use_z = true` emits a trailing "Z"; replace it
    // with the FogLAMP-style "+00" offset suffix.
    match formatted.strip_suffix('Z') {
        Some(prefix) => format!("{prefix}+00"),
        None => formatted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_with_micros_and_plus_zero_suffix() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(normalize_timestamp(ts), "2024-03-01T12:30:00.000000+00");
    }
}
