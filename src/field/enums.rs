//! `<enum>`: integral storage restricted to named values.

use crate::common::{self, Endian};
use crate::context::Feature;
use crate::error::{Result, SchemaError};
use crate::range::{self, MergePolicy, RangeInterval, ValidRanges};

use super::int::{self, IntType};
use super::{FieldCommon, FieldParser};

pub(super) const PROPS: &[&str] = &[
    "type",
    "endian",
    "length",
    "bitLength",
    "nonUniqueAllowed",
    "validCheckVersion",
    "defaultValue",
    "hexAssign",
    "availableLengthLimit",
];

pub(super) const CHILDREN: &[&str] = &["validValue"];

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub name: String,
    pub value: i128,
    pub since_version: u32,
    pub deprecated_since: u32,
    pub description: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct EnumField {
    pub ty: Option<IntType>,
    pub endian: Endian,
    pub length: usize,
    pub bit_length: usize,
    pub non_unique_allowed: bool,
    pub valid_check_version: bool,
    pub hex_assign: bool,
    pub available_length_limit: bool,
    pub min_value: i128,
    pub max_value: i128,
    pub values: Vec<EnumValue>,
    pub default_value: i128,
    /// One interval per run of consecutive values sharing a version window.
    pub valid_ranges: ValidRanges,
}

impl EnumField {
    pub(super) fn parse(&mut self, p: &FieldParser<'_>, common: &mut FieldCommon) -> Result<()> {
        let ty = int::parse_int_type(p, self.ty, |_| true)?;
        let keep_length = self.ty == Some(ty);
        self.ty = Some(ty);
        self.endian = int::parse_endian(p, self.endian)?;
        self.length = int::parse_length(p, ty, if keep_length { self.length } else { 0 })?;
        self.bit_length = int::parse_bit_length(p, ty.is_var(), self.length, self.bit_length)?;
        if let Some(v) = p.bool_prop("nonUniqueAllowed")? {
            self.non_unique_allowed = v;
        }
        if let Some(v) = p.bool_prop("validCheckVersion")? {
            self.valid_check_version = v;
        }
        let (lo, hi) = int::type_bounds(ty, self.length, self.bit_length);
        self.min_value = lo;
        self.max_value = hi;

        self.parse_values(p, common)?;
        if self.values.is_empty() {
            return Err(SchemaError::InvalidStructure(format!(
                "{}: <enum> \"{}\" must define at least one <validValue>",
                p.loc(),
                common.name
            )));
        }

        if let Some(v) = p.prop("defaultValue")? {
            let value = self.parse_value(p, v).ok_or_else(|| p.unexpected("defaultValue", v))?;
            if value < self.min_value || self.max_value < value {
                return Err(p.invalid(format!("defaultValue ({}) is out of the type range", value)));
            }
            self.default_value = value;
        }
        if let Some(v) = p.bool_prop("hexAssign")? {
            if v && !ty.is_unsigned() {
                return Err(p.invalid("property \"hexAssign\" is applicable only to unsigned types"));
            }
            self.hex_assign = v;
        }
        if p.gated("availableLengthLimit") {
            self.available_length_limit = p.bool_prop("availableLengthLimit")?.unwrap_or(false);
        }

        let ranges = self
            .values
            .iter()
            .map(|v| {
                RangeInterval::value(int::to_numeric(v.value))
                    .with_versions(v.since_version, v.deprecated_since)
            })
            .collect();
        self.valid_ranges = range::merge(ranges, MergePolicy::integral(self.valid_check_version));
        Ok(())
    }

    fn parse_values(&mut self, p: &FieldParser<'_>, common: &FieldCommon) -> Result<()> {
        for elem in p.node.children_named("validValue") {
            let props = elem.props(&[])?;
            let name = props.required(elem, "name")?;
            if !common::is_valid_name(name) {
                return Err(p.unexpected("name", name));
            }
            if self.value(name).is_some() {
                return Err(SchemaError::DuplicateMemberName(format!(
                    "{}: value \"{}\" defined more than once",
                    elem.loc(),
                    name
                )));
            }
            let raw = props.required(elem, "val")?;
            let value = self.parse_value(p, raw).ok_or_else(|| p.unexpected("val", raw))?;
            if value < self.min_value || self.max_value < value {
                return Err(p.invalid(format!(
                    "value \"{}\" ({}) is out of the type range",
                    name, value
                )));
            }
            if !self.non_unique_allowed {
                if let Some(other) = self.values.iter().find(|v| v.value == value) {
                    return Err(p.invalid(format!(
                        "value \"{}\" has the same numeric value as \"{}\" (nonUniqueAllowed is not set)",
                        name, other.name
                    )));
                }
            }
            let (since_version, deprecated_since) = p.element_versions(elem, common)?;
            self.values.push(EnumValue {
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

    /// Value name or literal.
    pub fn str_to_value(&self, value: &str) -> Option<i128> {
        if let Some(v) = self.value(value) {
            return Some(v.value);
        }
        int::parse_literal(self.ty.unwrap_or(IntType::Int64), value)
    }

    fn parse_value(&self, p: &FieldParser<'_>, value: &str) -> Option<i128> {
        self.str_to_value(value).or_else(|| {
            if !p.env.ctx.supports(Feature::ValueReference) || !common::is_valid_ref_name(value) {
                return None;
            }
            p.env.registry.str_to_numeric(&p.env.ctx.name, value)
        })
    }

    pub fn value(&self, name: &str) -> Option<&EnumValue> {
        self.values.iter().find(|v| v.name == name)
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
        self.value(path).map(|v| v.value)
    }

    /// Whether `value` is a declared value, at `version` when given and version checks are on.
    pub fn is_valid_value(&self, value: i128, version: Option<u32>) -> bool {
        let version = version.filter(|_| self.valid_check_version);
        self.valid_ranges.contains(int::to_numeric(value), version)
    }
}
