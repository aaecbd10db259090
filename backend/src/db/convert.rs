//! Row mapping helpers shared by the SQLx repositories.
//!
//! Timestamps are stored as epoch milliseconds (BIGINT), calendar days
//! as ISO-8601 text, so the same SQL runs on every `Any` backend.

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::quality::Quality;
use crate::time::{from_ms, to_ms};

const DATE_FMT: &str = "%Y-%m-%d";

pub fn date_to_text(d: NaiveDate) -> String {
    d.format(DATE_FMT).to_string()
}

pub fn text_to_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FMT).with_context(|| format!("invalid date: {s}"))
}

pub fn opt_ts_to_ms(ts: Option<DateTime<Utc>>) -> Option<i64> {
    ts.map(to_ms)
}

pub fn opt_ms_to_ts(ms: Option<i64>) -> anyhow::Result<Option<DateTime<Utc>>> {
    ms.map(from_ms).transpose()
}

pub fn parse_uuid(s: &str, what: &'static str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(s).with_context(|| format!("invalid {what}: {s}"))
}

pub fn quality_to_column(q: Option<Quality>) -> Option<i64> {
    q.map(|q| i64::from(q.value()))
}

pub fn quality_from_column(v: Option<i64>) -> anyhow::Result<Option<Quality>> {
    v.map(|v| Quality::try_from(v).map_err(|e| anyhow!("{e}")))
        .transpose()
}

/* =========================
Numeric safety helpers
========================= */

pub fn i64_to_u32(v: i64) -> anyhow::Result<u32> {
    u32::try_from(v).map_err(|_| anyhow!("out of range for u32: {v}"))
}

pub fn i64_to_u64(v: i64) -> anyhow::Result<u64> {
    u64::try_from(v).map_err(|_| anyhow!("negative i64 where u64 expected: {v}"))
}

pub fn u64_to_i64(v: u64) -> anyhow::Result<i64> {
    i64::try_from(v).map_err(|_| anyhow!("u64 too large for i64: {v}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_round_trip_as_iso_text() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 9).unwrap();
        assert_eq!(date_to_text(d), "2024-01-09");
        assert_eq!(text_to_date("2024-01-09").unwrap(), d);
        assert!(text_to_date("09/01/2024").is_err());
    }

    #[test]
    fn iso_text_orders_like_dates() {
        let a = date_to_text(NaiveDate::from_ymd_opt(2024, 1, 9).unwrap());
        let b = date_to_text(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert!(a < b);
    }

    #[test]
    fn out_of_range_quality_column_is_an_error() {
        assert!(quality_from_column(Some(9)).is_err());
        assert_eq!(quality_from_column(None).unwrap(), None);
        assert_eq!(quality_from_column(Some(4)).unwrap().unwrap().value(), 4);
    }

    #[test]
    fn numeric_conversions_reject_out_of_range() {
        assert!(i64_to_u32(-1).is_err());
        assert!(i64_to_u32(i64::from(u32::MAX) + 1).is_err());
        assert!(i64_to_u64(-5).is_err());
        assert!(u64_to_i64(u64::MAX).is_err());
        assert_eq!(u64_to_i64(7).unwrap(), 7);
    }
}
