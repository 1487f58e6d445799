//! `<float>`: IEEE 754 single or double precision values.

use crate::common::{self, Endian, Units};
use crate::context::Feature;
use crate::error::{Result, SchemaError};
use crate::parser;
use crate::range::{self, MergeMode, MergePolicy, NumericOrFp, RangeInterval, ValidRanges};

use super::{FieldCommon, FieldParser};

pub(super) const PROPS: &[&str] = &[
    "type",
    "endian",
    "defaultValue",
    "defaultValidValue",
    "validRange",
    "validValue",
    "validMin",
    "validMax",
    "validFullRange",
    "validCheckVersion",
    "units",
    "displayDecimals",
    "displaySpecials",
    "nonUniqueSpecialsAllowed",
];

pub(super) const CHILDREN: &[&str] = &["special"];

const VALID_PROPS: &[&str] = &["validRange", "validValue", "validMin", "validMax"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatType {
    Float,
    Double,
}

impl FloatType {
    pub fn parse(value: &str) -> Option<FloatType> {
        match value.trim() {
            "float" => Some(FloatType::Float),
            "double" => Some(FloatType::Double),
            _ => None,
        }
    }

    pub fn length(self) -> usize {
        match self {
            FloatType::Float => 4,
            FloatType::Double => 8,
        }
    }

    fn max(self) -> f64 {
        match self {
            FloatType::Float => f64::from(f32::MAX),
            FloatType::Double => f64::MAX,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FloatSpecial {
    pub name: String,
    pub value: f64,
    pub since_version: u32,
    pub deprecated_since: u32,
    pub description: String,
    pub display_name: String,
}

fn same_value(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

#[derive(Debug, Clone)]
pub struct FloatField {
    pub ty: Option<FloatType>,
    pub endian: Endian,
    pub default_value: f64,
    pub specials: Vec<FloatSpecial>,
    pub non_unique_specials_allowed: bool,
    pub valid_check_version: bool,
    pub valid_full_range: bool,
    /// Empty when no restriction is declared.
    pub valid_ranges: ValidRanges,
    declared_ranges: Vec<RangeInterval>,
    pub units: Units,
    pub display_decimals: usize,
    pub display_specials: bool,
}

impl Default for FloatField {
    fn default() -> Self {
        FloatField {
            ty: None,
            endian: Endian::Little,
            default_value: 0.0,
            specials: Vec::new(),
            non_unique_specials_allowed: false,
            valid_check_version: false,
            valid_full_range: false,
            valid_ranges: ValidRanges::default(),
            declared_ranges: Vec::new(),
            units: Units::Unknown,
            display_decimals: 0,
            display_specials: true,
        }
    }
}

impl FloatField {
    pub(super) fn parse(&mut self, p: &FieldParser<'_>, common: &mut FieldCommon) -> Result<()> {
        let ty = match p.prop("type")? {
            Some(v) => FloatType::parse(v).ok_or_else(|| p.unexpected("type", v))?,
            None => match self.ty {
                Some(ty) => ty,
                None => return p.required("type").map(|_| ()),
            },
        };
        if let Some(prev) = self.ty {
            if p.reused && prev != ty {
                return Err(SchemaError::ReuseInvariantViolation(format!(
                    "{}: type of a reused field cannot be changed ({:?} -> {:?})",
                    p.loc(),
                    prev,
                    ty
                )));
            }
        }
        self.ty = Some(ty);
        self.endian = super::int::parse_endian(p, self.endian)?;

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
        self.parse_valid_ranges(p, common, ty)?;

        if let Some(v) = p.prop("units")? {
            self.units = Units::parse(v).ok_or_else(|| p.unexpected("units", v))?;
        }
        if let Some(v) = p.usize_prop("displayDecimals")? {
            self.display_decimals = v;
        }
        if p.props.contains("displaySpecials") && p.env.ctx.property_deprecated("displaySpecials") {
            p.warn("Property \"displaySpecials\" is deprecated.");
        }
        if let Some(v) = p.bool_prop("displaySpecials")? {
            self.display_specials = v;
        }
        Ok(())
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
            let value = self.parse_value(p, raw).ok_or_else(|| p.unexpected("val", raw))?;
            if !self.non_unique_specials_allowed {
                if let Some(other) = self.specials.iter().find(|s| same_value(s.value, value)) {
                    return Err(p.invalid(format!(
                        "special \"{}\" has the same value as \"{}\"",
                        name, other.name
                    )));
                }
            }
            let (since_version, deprecated_since) = p.element_versions(elem, common)?;
            self.specials.push(FloatSpecial {
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

    fn parse_default(&self, p: &FieldParser<'_>, prop: &str, v: &str) -> Result<f64> {
        self.parse_value(p, v).ok_or_else(|| p.unexpected(prop, v))
    }

    fn range_from(&self, p: &FieldParser<'_>, prop: &str, raw: &str, ty: FloatType) -> Result<RangeInterval> {
        let value = |s: &str| self.parse_value(p, s).ok_or_else(|| p.unexpected(prop, raw));
        let (min, max) = match prop {
            "validRange" => {
                let (a, b) = parser::parse_range(raw).map_err(|_| p.unexpected(prop, raw))?;
                (value(&a)?, value(&b)?)
            }
            "validValue" => {
                let v = value(raw)?;
                (v, v)
            }
            "validMin" => (value(raw)?, ty.max()),
            _ => (-ty.max(), value(raw)?),
        };
        Ok(RangeInterval::new(NumericOrFp::Fp(min), NumericOrFp::Fp(max)))
    }

    fn parse_valid_ranges(&mut self, p: &FieldParser<'_>, common: &FieldCommon, ty: FloatType) -> Result<()> {
        let mut ranges = self.declared_ranges.clone();
        for (name, value) in &p.node.attrs {
            if VALID_PROPS.contains(&name.as_str()) {
                ranges.push(self.range_from(p, name, value, ty)?);
            }
        }
        for elem in p.node.children.iter().filter(|c| VALID_PROPS.contains(&c.name.as_str())) {
            let raw = elem.value()?;
            let (since, deprecated) = p.element_versions(elem, common)?;
            ranges.push(self.range_from(p, &elem.name, &raw, ty)?.with_versions(since, deprecated));
        }
        if let Some(full) = p.bool_prop("validFullRange")? {
            self.valid_full_range = full;
        }
        if self.valid_full_range {
            ranges.push(RangeInterval::new(
                NumericOrFp::Fp(-ty.max()),
                NumericOrFp::Fp(ty.max()),
            ));
        }
        if p.gated("defaultValidValue") {
            let raw = p.required("defaultValidValue")?;
            let v = self.parse_default(p, "defaultValidValue", raw)?;
            self.default_value = v;
            ranges.push(RangeInterval::value(NumericOrFp::Fp(v)));
        }

        if range::has_intersecting(&ranges) {
            p.warn(format!(
                "Some valid values ranges of \"{}\" are intersecting.",
                common.name
            ));
        }
        self.declared_ranges = ranges.clone();
        let policy = MergePolicy {
            mode: MergeMode::FloatingPoint,
            version_aware: self.valid_check_version,
        };
        self.valid_ranges = range::merge(ranges, policy);
        Ok(())
    }

    /// Special name or float literal.
    pub fn str_to_value(&self, value: &str) -> Option<f64> {
        if let Some(s) = self.special(value) {
            return Some(s.value);
        }
        common::parse_double(value)
    }

    fn parse_value(&self, p: &FieldParser<'_>, value: &str) -> Option<f64> {
        self.str_to_value(value).or_else(|| {
            if !p.env.ctx.supports(Feature::ValueReference) || !common::is_valid_ref_name(value) {
                return None;
            }
            p.env.registry.str_to_fp(&p.env.ctx.name, value)
        })
    }

    pub fn special(&self, name: &str) -> Option<&FloatSpecial> {
        self.specials.iter().find(|s| s.name == name)
    }

    pub fn length(&self) -> usize {
        self.ty.map_or(0, FloatType::length)
    }

    pub fn str_to_fp(&self, path: &str) -> Option<f64> {
        if path.is_empty() {
            return Some(self.default_value);
        }
        self.special(path).map(|s| s.value)
    }
}
