//! `<int>`: fixed or variable length integers, plus the storage helpers `<enum>` and `<set>` share.

use crate::common::{self, Endian, Units, MAX_VAR_LENGTH};
use crate::context::Feature;
use crate::error::{Result, SchemaError};
use crate::parser;
use crate::range::{self, MergePolicy, NumericOrFp, RangeInterval, ValidRanges};

use super::{FieldCommon, FieldParser};

pub(super) const PROPS: &[&str] = &[
    "type",
    "endian",
    "length",
    "bitLength",
    "scaling",
    "serOffset",
    "defaultValue",
    "defaultValidValue",
    "validRange",
    "validValue",
    "validMin",
    "validMax",
    "validCheckVersion",
    "units",
    "displayDecimals",
    "displayOffset",
    "signExt",
    "displaySpecials",
    "availableLengthLimit",
    "nonUniqueSpecialsAllowed",
];

pub(super) const CHILDREN: &[&str] = &["special"];

const VALID_PROPS: &[&str] = &["validRange", "validValue", "validMin", "validMax"];

/// Storage type of integral kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntType {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Intvar,
    Uintvar,
}

impl IntType {
    pub fn parse(value: &str) -> Option<IntType> {
        let ty = match value.trim() {
            "int8" => IntType::Int8,
            "uint8" => IntType::Uint8,
            "int16" => IntType::Int16,
            "uint16" => IntType::Uint16,
            "int32" => IntType::Int32,
            "uint32" => IntType::Uint32,
            "int64" => IntType::Int64,
            "uint64" => IntType::Uint64,
            "intvar" => IntType::Intvar,
            "uintvar" => IntType::Uintvar,
            _ => return None,
        };
        Some(ty)
    }

    pub fn max_length(self) -> usize {
        match self {
            IntType::Int8 | IntType::Uint8 => 1,
            IntType::Int16 | IntType::Uint16 => 2,
            IntType::Int32 | IntType::Uint32 => 4,
            IntType::Int64 | IntType::Uint64 => 8,
            IntType::Intvar | IntType::Uintvar => MAX_VAR_LENGTH,
        }
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            IntType::Uint8 | IntType::Uint16 | IntType::Uint32 | IntType::Uint64 | IntType::Uintvar
        )
    }

    /// Values may exceed `i64::MAX`.
    pub fn is_big_unsigned(self) -> bool {
        matches!(self, IntType::Uint64 | IntType::Uintvar)
    }

    pub fn is_var(self) -> bool {
        matches!(self, IntType::Intvar | IntType::Uintvar)
    }
}

/// Range bound keeping values above `i64::MAX` unsigned.
pub(super) fn to_numeric(v: i128) -> NumericOrFp {
    match i64::try_from(v) {
        Ok(s) => NumericOrFp::Signed(s),
        Err(_) => NumericOrFp::Unsigned(u64::try_from(v.max(0)).unwrap_or(u64::MAX)),
    }
}

/// Inclusive value range of `ty` serialized in `length` bytes (or `bit_length` bits).
pub(super) fn type_bounds(ty: IntType, length: usize, bit_length: usize) -> (i128, i128) {
    let bits = if bit_length != 0 {
        bit_length
    } else if ty.is_var() {
        length * 7
    } else {
        length * common::BITS_IN_BYTE
    };
    let bits = bits.clamp(1, 64) as u32;
    if ty.is_unsigned() {
        (0, (1i128 << bits) - 1)
    } else {
        let half = 1i128 << (bits - 1);
        (-half, half - 1)
    }
}

/// Literal integer accepted by `ty`.
pub(super) fn parse_literal(ty: IntType, value: &str) -> Option<i128> {
    let v = common::parse_i128(value)?;
    if !ty.is_big_unsigned() && v > i128::from(i64::MAX) {
        return None;
    }
    Some(v)
}

pub(super) fn parse_int_type(
    p: &FieldParser<'_>,
    current: Option<IntType>,
    allowed: impl Fn(IntType) -> bool,
) -> Result<IntType> {
    let Some(v) = p.prop("type")? else {
        return match current {
            Some(ty) => Ok(ty),
            None => p.required("type").map(|_| IntType::Int8),
        };
    };
    let ty = IntType::parse(v)
        .filter(|t| allowed(*t))
        .ok_or_else(|| p.unexpected("type", v))?;
    if let Some(prev) = current {
        if p.reused && prev != ty {
            return Err(SchemaError::ReuseInvariantViolation(format!(
                "{}: type of a reused field cannot be changed ({:?} -> {:?})",
                p.loc(),
                prev,
                ty
            )));
        }
    }
    Ok(ty)
}

pub(super) fn parse_endian(p: &FieldParser<'_>, current: Endian) -> Result<Endian> {
    match p.prop("endian")? {
        Some(v) => Endian::parse(v).ok_or_else(|| p.unexpected("endian", v)),
        None if p.reused => Ok(current),
        None => Ok(p.env.ctx.endian),
    }
}

/// Serialization length; `current` is kept when reused with an unchanged type.
pub(super) fn parse_length(p: &FieldParser<'_>, ty: IntType, current: usize) -> Result<usize> {
    let Some(len) = p.usize_prop("length")? else {
        if p.reused && current != 0 {
            return Ok(current);
        }
        return Ok(ty.max_length());
    };
    if len == 0 || ty.max_length() < len {
        return Err(p.invalid(format!(
            "length {} is not applicable to type {:?} (max {})",
            len,
            ty,
            ty.max_length()
        )));
    }
    Ok(len)
}

/// `bitLength` is only meaningful inside a `<bitfield>`.
pub(super) fn parse_bit_length(
    p: &FieldParser<'_>,
    var_length: bool,
    length: usize,
    current: usize,
) -> Result<usize> {
    let max_bits = length * common::BITS_IN_BYTE;
    if !p.parent.is_bitfield() {
        if p.props.contains("bitLength") {
            p.warn("Property \"bitLength\" is only applicable to <bitfield> members, ignored.");
        }
        return Ok(0);
    }
    if var_length {
        return Err(p.invalid("bitfield member cannot have variable length type"));
    }
    let Some(bits) = p.usize_prop("bitLength")? else {
        return Ok(if current != 0 { current } else { max_bits });
    };
    if bits == 0 {
        return Err(p.unexpected("bitLength", "0"));
    }
    if max_bits < bits {
        return Err(SchemaError::BitLengthExceeded(format!(
            "{}: bitLength {} exceeds the {} bits available to the type",
            p.loc(),
            bits,
            max_bits
        )));
    }
    Ok(bits)
}

/// Named special value.
#[derive(Debug, Clone, PartialEq)]
pub struct Special {
    pub name: String,
    pub value: i128,
    pub since_version: u32,
    pub deprecated_since: u32,
    pub description: String,
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct IntField {
    pub ty: Option<IntType>,
    pub endian: Endian,
    pub length: usize,
    pub bit_length: usize,
    /// Numerator and denominator.
    pub scaling: (i64, i64),
    pub ser_offset: i64,
    /// Smallest and largest values representable after `serOffset`.
    pub min_value: i128,
    pub max_value: i128,
    pub default_value: i128,
    pub specials: Vec<Special>,
    pub non_unique_specials_allowed: bool,
    pub valid_check_version: bool,
    pub valid_ranges: ValidRanges,
    declared_ranges: Vec<RangeInterval>,
    pub units: Units,
    pub display_decimals: usize,
    pub display_offset: f64,
    pub sign_ext: bool,
    pub display_specials: bool,
    pub available_length_limit: bool,
}

impl Default for IntField {
    fn default() -> Self {
        IntField {
            ty: None,
            endian: Endian::Little,
            length: 0,
            bit_length: 0,
            scaling: (1, 1),
            ser_offset: 0,
            min_value: 0,
            max_value: 0,
            default_value: 0,
            specials: Vec::new(),
            non_unique_specials_allowed: false,
            valid_check_version: false,
            valid_ranges: ValidRanges::default(),
            declared_ranges: Vec::new(),
            units: Units::Unknown,
            display_decimals: 0,
            display_offset: 0.0,
            sign_ext: true,
            display_specials: true,
            available_length_limit: false,
        }
    }
}

impl IntField {
    pub(super) fn parse(&mut self, p: &FieldParser<'_>, common: &mut FieldCommon) -> Result<()> {
        let ty = parse_int_type(p, self.ty, |_| true)?;
        let keep_length = self.ty == Some(ty);
        self.ty = Some(ty);
        self.endian = parse_endian(p, self.endian)?;
        self.length = parse_length(p, ty, if keep_length { self.length } else { 0 })?;
        self.bit_length = parse_bit_length(p, ty.is_var(), self.length, self.bit_length)?;
        self.parse_scaling(p)?;
        if let Some(v) = p.prop("serOffset")? {
            self.ser_offset = common::parse_int(v).ok_or_else(|| p.unexpected("serOffset", v))?;
        }

        let (lo, hi) = type_bounds(ty, self.length, self.bit_length);
        let offset = i128::from(self.ser_offset);
        self.min_value = lo - offset;
        self.max_value = hi - offset;
        if self.default_value < self.min_value || self.max_value < self.default_value {
            self.default_value = self.min_value.max(0).min(self.max_value);
        }

        if let Some(v) = p.bool_prop("nonUniqueSpecialsAllowed")? {
            if p.env.ctx.supports(Feature::NonUniqueSpecials) {
                self.non_unique_specials_allowed = v;
            } else {
                p.warn("Property \"nonUniqueSpecialsAllowed\" is not supported for this DSL version, ignored.");
            }
        }
        self.parse_specials(p, common)?;

        if let Some(v) = p.prop("defaultValue")? {
            self.default_value = self.parse_default(p, "defaultValue", v)?;
        }
        if let Some(v) = p.bool_prop("validCheckVersion")? {
            self.valid_check_version = v;
        }
        self.parse_valid_ranges(p, common)?;

        if let Some(v) = p.prop("units")? {
            self.units = Units::parse(v).ok_or_else(|| p.unexpected("units", v))?;
        }
        if let Some(v) = p.usize_prop("displayDecimals")? {
            self.display_decimals = v;
        }
        if let Some(v) = p.prop("displayOffset")? {
            self.display_offset =
                common::parse_double(v).ok_or_else(|| p.unexpected("displayOffset", v))?;
        }
        if let Some(v) = p.bool_prop("signExt")? {
            self.sign_ext = v;
        }
        if p.props.contains("displaySpecials") && p.env.ctx.property_deprecated("displaySpecials") {
            p.warn("Property \"displaySpecials\" is deprecated.");
        }
        if let Some(v) = p.bool_prop("displaySpecials")? {
            self.display_specials = v;
        }
        if p.gated("availableLengthLimit") {
            self.available_length_limit = p.bool_prop("availableLengthLimit")?.unwrap_or(false);
        }
        Ok(())
    }

    fn parse_scaling(&mut self, p: &FieldParser<'_>) -> Result<()> {
        let Some(v) = p.prop("scaling")? else {
            return Ok(());
        };
        let (num, den) = v.split_once('/').unwrap_or((v, "1"));
        match (common::parse_int(num), common::parse_int(den)) {
            (Some(n), Some(d)) if n != 0 && d != 0 => {
                self.scaling = (n, d);
                Ok(())
            }
            _ => Err(p.unexpected("scaling", v)),
        }
    }

    fn parse_specials(&mut self, p: &FieldParser<'_>, common: &FieldCommon) -> Result<()> {
        for elem in p.node.children_named("special") {
            let props = elem.props(&[])?;
            let name = props.required(elem, "name")?;
            if !common::is_valid_name(name) {
                return Err(p.unexpected("name", name));
            }
            if self.special(name).is_some() {
                return Err(SchemaError::DuplicateMemberName(format!(
                    "{}: special \"{}\" defined more than once",
                    elem.loc(),
                    name
                )));
            }
            let raw = props.required(elem, "val")?;
            let value = self
                .parse_value(p, raw)
                .ok_or_else(|| p.unexpected("val", raw))?;
            if value < self.min_value || self.max_value < value {
                return Err(p.invalid(format!(
                    "special \"{}\" value ({}) is out of the type range",
                    name, value
                )));
            }
            if !self.non_unique_specials_allowed {
                if let Some(other) = self.specials.iter().find(|s| s.value == value) {
                    return Err(p.invalid(format!(
                        "special \"{}\" has the same value as \"{}\"",
                        name, other.name
                    )));
                }
            }
            let (since_version, deprecated_since) = p.element_versions(elem, common)?;
            self.specials.push(Special {
                name: name.to_string(),
                value,
                since_version,
                deprecated_since,
                description: props.get("description").unwrap_or_default().to_string(),
                display_name: props.get("displayName").unwrap_or_default().to_string(),
            });
        }
        Ok(())
    }

    fn parse_default(&self, p: &FieldParser<'_>, prop: &str, v: &str) -> Result<i128> {
        let value = self.parse_value(p, v).ok_or_else(|| p.unexpected(prop, v))?;
        if self.special(v).is_none() && (value < self.min_value || self.max_value < value) {
            return Err(p.invalid(format!(
                "{} ({}) is out of the range [{}, {}]",
                prop, value, self.min_value, self.max_value
            )));
        }
        Ok(value)
    }

    fn range_from(&self, p: &FieldParser<'_>, prop: &str, raw: &str) -> Result<RangeInterval> {
        let value = |s: &str| -> Result<i128> {
            let v = self.parse_value(p, s).ok_or_else(|| p.unexpected(prop, raw))?;
            if v < self.min_value || self.max_value < v {
                return Err(p.invalid(format!(
                    "{} bound ({}) is out of the range [{}, {}]",
                    prop, v, self.min_value, self.max_value
                )));
            }
            Ok(v)
        };
        let (min, max) = match prop {
            "validRange" => {
                let (a, b) = parser::parse_range(raw).map_err(|_| p.unexpected(prop, raw))?;
                (value(&a)?, value(&b)?)
            }
            "validValue" => {
                let v = value(raw)?;
                (v, v)
            }
            "validMin" => (value(raw)?, self.max_value),
            _ => (self.min_value, value(raw)?),
        };
        Ok(RangeInterval::new(to_numeric(min), to_numeric(max)))
    }

    fn parse_valid_ranges(&mut self, p: &FieldParser<'_>, common: &FieldCommon) -> Result<()> {
        let mut ranges = self.declared_ranges.clone();
        for (name, value) in &p.node.attrs {
            if VALID_PROPS.contains(&name.as_str()) {
                ranges.push(self.range_from(p, name, value)?);
            }
        }
        for elem in p.node.children.iter().filter(|c| VALID_PROPS.contains(&c.name.as_str())) {
            let raw = elem.value()?;
            let (since, deprecated) = p.element_versions(elem, common)?;
            ranges.push(self.range_from(p, &elem.name, &raw)?.with_versions(since, deprecated));
        }
        if p.gated("defaultValidValue") {
            let raw = p.required("defaultValidValue")?;
            let v = self.parse_default(p, "defaultValidValue", raw)?;
            self.default_value = v;
            ranges.push(RangeInterval::value(to_numeric(v)));
        }

        self.declared_ranges = ranges.clone();
        if ranges.is_empty() {
            ranges.push(RangeInterval::new(
                to_numeric(self.min_value),
                to_numeric(self.max_value),
            ));
        }
        self.valid_ranges = range::merge(ranges, MergePolicy::integral(self.valid_check_version));
        Ok(())
    }

    /// Literal or special name, without external lookups.
    pub fn str_to_value(&self, value: &str) -> Option<i128> {
        if let Some(s) = self.special(value) {
            return Some(s.value);
        }
        parse_literal(self.ty.unwrap_or(IntType::Int64), value)
    }

    fn parse_value(&self, p: &FieldParser<'_>, value: &str) -> Option<i128> {
        self.str_to_value(value).or_else(|| {
            if !p.env.ctx.supports(Feature::ValueReference) || !common::is_valid_ref_name(value) {
                return None;
            }
            p.env.registry.str_to_numeric(&p.env.ctx.name, value)
        })
    }

    pub fn special(&self, name: &str) -> Option<&Special> {
        self.specials.iter().find(|s| s.name == name)
    }

    pub fn min_length(&self) -> usize {
        match self.ty {
            Some(ty) if ty.is_var() => 1,
            _ => self.length,
        }
    }

    pub fn str_to_numeric(&self, path: &str) -> Option<i128> {
        if path.is_empty() {
            return Some(self.default_value);
        }
        self.special(path).map(|s| s.value)
    }

    pub fn str_to_fp(&self, path: &str) -> Option<f64> {
        let (num, den) = self.scaling;
        self.str_to_numeric(path)
            .map(|v| v as f64 * num as f64 / den as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_per_type() {
        assert_eq!(type_bounds(IntType::Uint8, 1, 0), (0, 255));
        assert_eq!(type_bounds(IntType::Int16, 2, 0), (-32768, 32767));
        assert_eq!(type_bounds(IntType::Uint64, 8, 0), (0, i128::from(u64::MAX)));
        assert_eq!(
            type_bounds(IntType::Int64, 8, 0),
            (i128::from(i64::MIN), i128::from(i64::MAX))
        );
        assert_eq!(type_bounds(IntType::Uint32, 4, 3), (0, 7));
        assert_eq!(type_bounds(IntType::Uintvar, 2, 0), (0, (1 << 14) - 1));
    }

    #[test]
    fn big_unsigned_literals() {
        assert_eq!(
            parse_literal(IntType::Uint64, "0xffffffffffffffff"),
            Some(i128::from(u64::MAX))
        );
        assert_eq!(parse_literal(IntType::Int64, "0xffffffffffffffff"), None);
        assert_eq!(
            to_numeric(i128::from(u64::MAX)),
            NumericOrFp::Unsigned(u64::MAX)
        );
        assert_eq!(to_numeric(-1), NumericOrFp::Signed(-1));
    }
}
