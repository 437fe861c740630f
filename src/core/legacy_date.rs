//! Purpose: Convert calendar timestamps to and from the remote API's legacy date tokens.
//! Exports: `encode_legacy`, `encode_edm_minutes`, `encode_iso`, `decode`, `parse`, `parse_legacy`, `serde`.
//! Role: Shared by the dynamic view (read coercion) and the entity writer (emission).
//! Invariants: Tokens look like `/Date(<ms>)/` with an optional `+HHMM`/`-HHMM` suffix.
//! Invariants: The offset suffix is accepted on read and ignored; writes never emit one.
//! Invariants: Timestamps are naive and interpreted as UTC; no ambient locale or zone is read.
use crate::core::error::{Error, ErrorKind};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

const LEGACY_PREFIX: &str = "/Date(";
const LEGACY_SUFFIX: &str = ")/";

/// Milliseconds since the Unix epoch, truncated toward negative infinity.
pub fn to_unix_millis(value: PrimitiveDateTime) -> i64 {
    let nanos = value.assume_utc().unix_timestamp_nanos();
    nanos.div_euclid(1_000_000) as i64
}

pub fn from_unix_millis(millis: i64) -> Option<PrimitiveDateTime> {
    let utc = OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()?;
    Some(PrimitiveDateTime::new(utc.date(), utc.time()))
}

/// `/Date(<ms>)/`, never with an offset suffix.
pub fn encode_legacy(value: PrimitiveDateTime) -> String {
    format!("{LEGACY_PREFIX}{}{LEGACY_SUFFIX}", to_unix_millis(value))
}

/// Minute-precision form used when entity fields are written (`yyyy-MM-ddTHH:mm`).
pub fn encode_edm_minutes(value: PrimitiveDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}",
        value.year(),
        u8::from(value.month()),
        value.day(),
        value.hour(),
        value.minute()
    )
}

/// ISO-8601 without offset; milliseconds only when non-zero.
pub fn encode_iso(value: PrimitiveDateTime) -> String {
    let mut out = format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
        value.year(),
        u8::from(value.month()),
        value.day(),
        value.hour(),
        value.minute(),
        value.second()
    );
    let millis = value.millisecond();
    if millis != 0 {
        out.push_str(&format!(".{millis:03}"));
    }
    out
}

/// Parses only the legacy token form.
pub fn parse_legacy(text: &str) -> Option<PrimitiveDateTime> {
    let inner = text
        .strip_prefix(LEGACY_PREFIX)?
        .strip_suffix(LEGACY_SUFFIX)?;
    let (millis, offset) = split_offset(inner);
    if let Some(offset) = offset {
        if offset.len() != 5 || !offset[1..].bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }
    let digits = millis.strip_prefix('-').unwrap_or(millis);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let millis: i64 = millis.parse().ok()?;
    from_unix_millis(millis)
}

/// Parses ISO-8601 forms first, then the legacy token form.
pub fn parse(text: &str) -> Option<PrimitiveDateTime> {
    parse_iso(text).or_else(|| parse_legacy(text))
}

pub fn decode(text: &str) -> Result<PrimitiveDateTime, Error> {
    parse(text).ok_or_else(|| {
        Error::new(ErrorKind::Conversion)
            .with_message(format!("invalid date value: {text}"))
            .with_hint("expected /Date(<milliseconds>)/ or an ISO-8601 timestamp")
    })
}

fn parse_iso(text: &str) -> Option<PrimitiveDateTime> {
    if let Ok(zoned) = OffsetDateTime::parse(text, &Rfc3339) {
        let utc = zoned.to_offset(UtcOffset::UTC);
        return Some(PrimitiveDateTime::new(utc.date(), utc.time()));
    }
    let naive = text.strip_suffix('Z').unwrap_or(text);
    PrimitiveDateTime::parse(
        naive,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    )
    .or_else(|_| {
        PrimitiveDateTime::parse(
            naive,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        )
    })
    .or_else(|_| {
        PrimitiveDateTime::parse(naive, format_description!("[year]-[month]-[day]T[hour]:[minute]"))
    })
    .ok()
    .or_else(|| {
        Date::parse(naive, format_description!("[year]-[month]-[day]"))
            .ok()
            .map(Date::midnight)
    })
}

fn split_offset(inner: &str) -> (&str, Option<&str>) {
    let start = usize::from(inner.starts_with('-'));
    match inner[start..].find(['+', '-']) {
        Some(pos) => {
            let split = start + pos;
            (&inner[..split], Some(&inner[split..]))
        }
        None => (inner, None),
    }
}

/// Serde adapters for `#[serde(with = "...")]` on timestamp fields.
///
/// Reads accept legacy tokens and ISO-8601; writes produce legacy tokens.
pub mod serde {
    use super::{encode_legacy, parse};
    use ::serde::de::Error as _;
    use ::serde::{Deserialize, Deserializer, Serializer};
    use std::borrow::Cow;
    use time::PrimitiveDateTime;

    pub fn serialize<S>(value: &PrimitiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&encode_legacy(*value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<PrimitiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = Cow::<'de, str>::deserialize(deserializer)?;
        parse(&text).ok_or_else(|| D::Error::custom(format!("invalid date value: {text}")))
    }

    pub mod option {
        use super::super::{encode_legacy, parse};
        use ::serde::de::Error as _;
        use ::serde::{Deserialize, Deserializer, Serializer};
        use std::borrow::Cow;
        use time::PrimitiveDateTime;

        pub fn serialize<S>(
            value: &Option<PrimitiveDateTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(value) => serializer.serialize_str(&encode_legacy(*value)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<PrimitiveDateTime>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let text = Option::<Cow<'de, str>>::deserialize(deserializer)?;
            match text {
                None => Ok(None),
                Some(text) => parse(&text)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid date value: {text}"))),
            }
        }
    }
}
