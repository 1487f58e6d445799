//! `<set>`: named bits of an unsigned integer.

use crate::common::{self, Endian};
use crate::error::{Result, SchemaError};

use super::int::{self, IntType};
use super::{FieldCommon, FieldParser};

pub(super) const PROPS: &[&str] = &[
    "type",
    "endian",
    "length",
    "bitLength",
    "nonUniqueAllowed",
    "defaultValue",
    "reservedValue",
    "validCheckVersion",
    "availableLengthLimit",
];

pub(super) const CHILDREN: &[&str] = &["bit"];

#[derive(Debug, Clone, PartialEq)]
pub struct SetBit {
    pub name: String,
    pub idx: usize,
    pub default_value: bool,
    pub reserved_value: bool,
    pub reserved: bool,
    pub since_version: u32,
    pub deprecated_since: u32,
    pub description: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct SetField {
    pub ty: Option<IntType>,
    pub endian: Endian,
    pub length: usize,
    pub bit_length: usize,
    pub non_unique_allowed: bool,
    pub default_value: bool,
    pub reserved_value: bool,
    pub valid_check_version: bool,
    pub available_length_limit: bool,
    pub bits: Vec<SetBit>,
}

impl SetField {
    pub(super) fn parse(&mut self, p: &FieldParser<'_>, common: &mut FieldCommon) -> Result<()> {
        if p.props.contains("type") {
            let ty = int::parse_int_type(p, self.ty, |t| t.is_unsigned() && !t.is_var())?;
            let keep_length = self.ty == Some(ty);
            self.ty = Some(ty);
            self.length = int::parse_length(p, ty, if keep_length { self.length } else { 0 })?;
        } else {
            self.length = self.parse_untyped_length(p)?;
        }
        self.bit_length = int::parse_bit_length(p, false, self.length, self.bit_length)?;
        self.endian = int::parse_endian(p, self.endian)?;

        let flags: [(&str, &mut bool); 4] = [
            ("nonUniqueAllowed", &mut self.non_unique_allowed),
            ("defaultValue", &mut self.default_value),
            ("reservedValue", &mut self.reserved_value),
            ("validCheckVersion", &mut self.valid_check_version),
        ];
        for (prop, slot) in flags {
            if let Some(v) = p.bool_prop(prop)? {
                *slot = v;
            }
        }
        if p.gated("availableLengthLimit") {
            self.available_length_limit = p.bool_prop("availableLengthLimit")?.unwrap_or(false);
        }
        self.parse_bits(p, common)
    }

    /// Length when no `type` is given: explicit `length`, reused value, or derived from `bitLength`.
    fn parse_untyped_length(&self, p: &FieldParser<'_>) -> Result<usize> {
        if let Some(len) = p.usize_prop("length")? {
            if !(1..=IntType::Uint64.max_length()).contains(&len) {
                return Err(p.unexpected("length", &len.to_string()));
            }
            return Ok(len);
        }
        if self.length != 0 {
            return Ok(self.length);
        }
        if p.parent.is_bitfield() {
            if let Some(bits) = p.usize_prop("bitLength")? {
                return Ok(bits.div_ceil(common::BITS_IN_BYTE).max(1));
            }
        }
        Err(SchemaError::MissingProperty(format!(
            "{}: <set> requires either \"type\" or \"length\" property",
            p.loc()
        )))
    }

    fn capacity(&self) -> usize {
        if self.bit_length != 0 {
            self.bit_length
        } else {
            self.length * common::BITS_IN_BYTE
        }
    }

    fn parse_bits(&mut self, p: &FieldParser<'_>, common: &FieldCommon) -> Result<()> {
        for elem in p.node.children_named("bit") {
            let props = elem.props(&[])?;
            let name = props.required(elem, "name")?;
            if !common::is_valid_name(name) {
                return Err(p.unexpected("name", name));
            }
            if self.bit(name).is_some() {
                return Err(SchemaError::DuplicateMemberName(format!(
                    "{}: bit \"{}\" defined more than once",
                    elem.loc(),
                    name
                )));
            }
            let raw = props.required(elem, "idx")?;
            let idx = common::parse_uint(raw)
                .and_then(|v| usize::try_from(v).ok())
                .ok_or_else(|| p.unexpected("idx", raw))?;
            if self.capacity() <= idx {
                return Err(p.invalid(format!(
                    "bit \"{}\" index {} exceeds the {} available bits",
                    name,
                    idx,
                    self.capacity()
                )));
            }
            if !self.non_unique_allowed {
                if let Some(other) = self.bits.iter().find(|b| b.idx == idx) {
                    return Err(p.invalid(format!(
                        "bit \"{}\" uses the same index as \"{}\" (nonUniqueAllowed is not set)",
                        name, other.name
                    )));
                }
            }
            let flag = |prop: &str, default: bool| -> Result<bool> {
                match props.single(elem, prop)? {
                    None => Ok(default),
                    Some(v) => common::parse_bool(v).ok_or_else(|| p.unexpected(prop, v)),
                }
            };
            let (since_version, deprecated_since) = p.element_versions(elem, common)?;
            self.bits.push(SetBit {
                name: name.to_string(),
                idx,
                default_value: flag("defaultValue", self.default_value)?,
                reserved_value: flag("reservedValue", self.reserved_value)?,
                reserved: flag("reserved", false)?,
                since_version,
                deprecated_since,
                description: props.get("description").unwrap_or_default().to_string(),
                display_name: props.get("displayName").unwrap_or_default().to_string(),
            });
        }
        Ok(())
    }

    pub fn bit(&self, name: &str) -> Option<&SetBit> {
        self.bits.iter().find(|b| b.name == name)
    }

    pub fn str_to_bool(&self, path: &str) -> Option<bool> {
        if path.is_empty() {
            return Some(self.default_value);
        }
        self.bit(path).map(|b| b.default_value)
    }
}
