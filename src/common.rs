//! Literal parsing and keyword tables shared by all schema elements.
//!
//! Integers accept the `0x` (hex) and leading-`0` (octal) prefixes, booleans accept
//! `true`/`false`/`1`/`0`, floats additionally accept `nan`, `inf` and `-inf`.

use crate::parser;

/// Deprecation sentinel: "not deprecated yet".
pub const NOT_YET_DEPRECATED: u32 = u32::MAX;

/// Longest encoding of a variable length integer.
pub const MAX_VAR_LENGTH: usize = 10;

pub const BITS_IN_BYTE: usize = 8;

pub fn is_valid_name(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Dot-qualified name with an optional `@Schema.` prefix.
pub fn is_valid_ref_name(value: &str) -> bool {
    parser::parse_external_ref(value).is_ok()
}

/// Wide parse covering the whole `i64` and `u64` domains.
pub fn parse_i128(value: &str) -> Option<i128> {
    let s = value.trim();
    let (negative, digits) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    if digits.is_empty() || digits.starts_with(&['+', '-'][..]) {
        return None;
    }
    let (radix, body) = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        (16, hex)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };
    // `from_str_radix` tolerates a sign; only the leading one is part of the literal.
    if body.starts_with(&['+', '-'][..]) {
        return None;
    }
    let magnitude = u64::from_str_radix(body, radix).ok()?;
    let magnitude = i128::from(magnitude);
    let v = if negative { -magnitude } else { magnitude };
    if v < i128::from(i64::MIN) {
        return None;
    }
    Some(v)
}

pub fn parse_int(value: &str) -> Option<i64> {
    parse_i128(value).and_then(|v| i64::try_from(v).ok())
}

pub fn parse_uint(value: &str) -> Option<u64> {
    parse_i128(value).and_then(|v| u64::try_from(v).ok())
}

pub fn parse_unsigned(value: &str) -> Option<u32> {
    parse_i128(value).and_then(|v| u32::try_from(v).ok())
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Float literal; `nan`, `inf`, `+inf` and `-inf` are accepted case-insensitively.
pub fn parse_double(value: &str) -> Option<f64> {
    let s = value.trim();
    match s.to_ascii_lowercase().as_str() {
        "nan" => return Some(f64::NAN),
        "inf" | "+inf" => return Some(f64::INFINITY),
        "-inf" => return Some(f64::NEG_INFINITY),
        _ => {}
    }
    if let Some(v) = parse_i128(s) {
        return Some(v as f64);
    }
    let lower = s.to_ascii_lowercase();
    if lower.contains("inf") || lower.contains("nan") {
        return None;
    }
    s.parse::<f64>().ok()
}

/// Saturating length addition where `usize::MAX` means unbounded.
pub fn add_to_length(len: usize, extra: usize) -> usize {
    len.saturating_add(extra)
}

pub fn mul_length(len: usize, count: usize) -> usize {
    len.saturating_mul(count)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

impl Endian {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "little" => Some(Endian::Little),
            "big" => Some(Endian::Big),
            _ => None,
        }
    }
}

/// Meaning attached to a field beyond its storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SemanticType {
    #[default]
    None,
    Version,
    MessageId,
    Length,
}

impl SemanticType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "" | "none" => Some(SemanticType::None),
            "version" => Some(SemanticType::Version),
            "messageId" => Some(SemanticType::MessageId),
            "length" => Some(SemanticType::Length),
            _ => None,
        }
    }
}

/// Generator override policy for one piece of generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverrideType {
    #[default]
    Any,
    Replace,
    Extend,
    None,
}

impl OverrideType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "" | "any" => Some(OverrideType::Any),
            "replace" => Some(OverrideType::Replace),
            "extend" => Some(OverrideType::Extend),
            "none" => Some(OverrideType::None),
            _ => None,
        }
    }
}

/// Physical units a numeric field may be tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Units {
    #[default]
    Unknown,
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Nanometers,
    Micrometers,
    Millimeters,
    Centimeters,
    Meters,
    Kilometers,
    NanometersPerSecond,
    MicrometersPerSecond,
    MillimetersPerSecond,
    CentimetersPerSecond,
    MetersPerSecond,
    KilometersPerSecond,
    KilometersPerHour,
    Hertz,
    KiloHertz,
    MegaHertz,
    GigaHertz,
    Degrees,
    Radians,
    Nanoamps,
    Microamps,
    Milliamps,
    Amps,
    Kiloamps,
    Nanovolts,
    Microvolts,
    Millivolts,
    Volts,
    Kilovolts,
    Bytes,
    Kilobytes,
    Megabytes,
    Gigabytes,
    Terabytes,
}

impl Units {
    pub fn parse(value: &str) -> Option<Self> {
        let v = value.trim().to_ascii_lowercase();
        let base = |stem: &str| {
            [stem.to_string(), format!("{stem}s")]
                .iter()
                .any(|s| *s == v)
        };
        let length = |stem: &str| {
            base(&format!("{stem}meter")) || base(&format!("{stem}metre"))
        };
        let speed = |short: &str, stem: &str, unit: &str| {
            v == format!("{short}/s")
                || v == format!("{short}ps")
                || [format!("{stem}meter"), format!("{stem}metre")]
                    .iter()
                    .any(|s| v == format!("{s}/{unit}") || v == format!("{s}s/{unit}"))
        };
        let units = match v.as_str() {
            "" => Units::Unknown,
            "ns" => Units::Nanoseconds,
            "us" => Units::Microseconds,
            "ms" => Units::Milliseconds,
            "s" | "sec" | "secs" => Units::Seconds,
            "min" | "mins" => Units::Minutes,
            "h" => Units::Hours,
            "d" => Units::Days,
            "w" => Units::Weeks,
            "nm" => Units::Nanometers,
            "um" => Units::Micrometers,
            "mm" => Units::Millimeters,
            "cm" => Units::Centimeters,
            "m" => Units::Meters,
            "km" => Units::Kilometers,
            "kps" | "km/s" | "kmps" => Units::KilometersPerSecond,
            "km/h" | "kmph" | "kph" => Units::KilometersPerHour,
            "hz" | "hertz" => Units::Hertz,
            "khz" | "kilohertz" => Units::KiloHertz,
            "mhz" | "megahertz" => Units::MegaHertz,
            "ghz" | "gigahertz" => Units::GigaHertz,
            "deg" => Units::Degrees,
            "rad" => Units::Radians,
            "na" => Units::Nanoamps,
            "ua" => Units::Microamps,
            "ma" => Units::Milliamps,
            "a" => Units::Amps,
            "ka" => Units::Kiloamps,
            "nv" => Units::Nanovolts,
            "uv" => Units::Microvolts,
            "mv" => Units::Millivolts,
            "v" => Units::Volts,
            "kv" => Units::Kilovolts,
            "b" => Units::Bytes,
            "kb" => Units::Kilobytes,
            "mb" => Units::Megabytes,
            "gb" => Units::Gigabytes,
            "tb" => Units::Terabytes,
            _ if base("nanosec") || base("nanosecond") => Units::Nanoseconds,
            _ if base("microsec") || base("microsecond") => Units::Microseconds,
            _ if base("millisec") || base("millisecond") => Units::Milliseconds,
            _ if base("second") => Units::Seconds,
            _ if base("minute") => Units::Minutes,
            _ if base("hour") => Units::Hours,
            _ if base("day") => Units::Days,
            _ if base("week") => Units::Weeks,
            _ if speed("nm", "nano", "second") => Units::NanometersPerSecond,
            _ if speed("um", "micro", "second") => Units::MicrometersPerSecond,
            _ if speed("mm", "milli", "second") => Units::MillimetersPerSecond,
            _ if speed("cm", "centi", "second") => Units::CentimetersPerSecond,
            _ if speed("m", "", "second") => Units::MetersPerSecond,
            _ if speed("km", "kilo", "second") => Units::KilometersPerSecond,
            _ if speed("km", "kilo", "hour") => Units::KilometersPerHour,
            _ if length("nano") => Units::Nanometers,
            _ if length("micro") => Units::Micrometers,
            _ if length("milli") => Units::Millimeters,
            _ if length("centi") => Units::Centimeters,
            _ if length("kilo") => Units::Kilometers,
            _ if length("") => Units::Meters,
            _ if base("degree") => Units::Degrees,
            _ if base("radian") => Units::Radians,
            _ if base("nanoamp") || base("nanoampere") => Units::Nanoamps,
            _ if base("microamp") || base("microampere") => Units::Microamps,
            _ if base("milliamp") || base("milliampere") => Units::Milliamps,
            _ if base("kiloamp") || base("kiloampere") => Units::Kiloamps,
            _ if base("amp") || base("ampere") => Units::Amps,
            _ if base("nanovolt") => Units::Nanovolts,
            _ if base("microvolt") => Units::Microvolts,
            _ if base("millivolt") => Units::Millivolts,
            _ if base("kilovolt") => Units::Kilovolts,
            _ if base("volt") => Units::Volts,
            _ if base("kilobyte") => Units::Kilobytes,
            _ if base("megabyte") => Units::Megabytes,
            _ if base("gigabyte") => Units::Gigabytes,
            _ if base("terabyte") => Units::Terabytes,
            _ if base("byte") => Units::Bytes,
            _ => return None,
        };
        Some(units)
    }
}
