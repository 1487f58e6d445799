//! `<data>`: raw bytes with a fixed length or a length prefix.

use crate::context::Feature;
use crate::error::{Result, SchemaError};

use super::string::{self, LengthStrategy};
use super::{FieldCommon, FieldParser, Kind, Prefix};

pub(super) const PROPS: &[&str] = &[
    "length",
    "lengthPrefix",
    "defaultValue",
    "validValue",
    "defaultValidValue",
];

pub(super) const CHILDREN: &[&str] = &[];

/// Hex byte string; whitespace between digits is ignored.
pub(crate) fn parse_hex(value: &str) -> Option<Vec<u8>> {
    let digits: Vec<u8> = value
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        return None;
    }
    digits
        .chunks(2)
        .map(|pair| {
            let text = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(text, 16).ok()
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataValidValue {
    pub value: Vec<u8>,
    pub since_version: u32,
    pub deprecated_since: u32,
}

#[derive(Debug, Clone, Default)]
pub struct DataField {
    pub default_value: Vec<u8>,
    pub length: usize,
    pub prefix: Option<Prefix>,
    pub valid_values: Vec<DataValidValue>,
}

impl DataField {
    fn strategy(&self) -> LengthStrategy {
        if self.length != 0 {
            LengthStrategy::Fixed
        } else if self.prefix.is_some() {
            LengthStrategy::Prefix
        } else {
            LengthStrategy::Unbounded
        }
    }

    pub(super) fn parse(&mut self, p: &FieldParser<'_>, common: &mut FieldCommon) -> Result<()> {
        let before = self.strategy();
        let fixed = string::parse_fixed_length(p)?;
        let prefix = p.parse_prefix("lengthPrefix", p.member_parent(Kind::Data, common), true)?;
        match (fixed, prefix) {
            (Some(_), Some(_)) => return Err(string::conflicting(p, &["length", "lengthPrefix"])),
            (Some(len), None) => {
                self.length = len;
                self.prefix = None;
                string::strategy_changed(p, before, self.strategy())?;
            }
            (None, Some(prefix)) => {
                self.length = 0;
                self.prefix = Some(prefix);
                string::strategy_changed(p, before, self.strategy())?;
            }
            (None, None) => {}
        }

        if let Some(v) = p.prop("defaultValue")? {
            self.default_value = self.parse_value(p, "defaultValue", v)?;
        }
        self.parse_valid_values(p, common)
    }

    /// Hex bytes, or `^ns.Field` naming another data field's default.
    fn parse_value(&self, p: &FieldParser<'_>, prop: &str, raw: &str) -> Result<Vec<u8>> {
        let value = match raw.strip_prefix('^') {
            Some(reference) => p
                .env
                .registry
                .str_to_data(&p.env.ctx.name, reference)
                .ok_or_else(|| {
                    SchemaError::InvalidReference(format!(
                        "{}: referenced data \"{}\" is not defined",
                        p.loc(),
                        reference
                    ))
                })?,
            None => parse_hex(raw).ok_or_else(|| p.unexpected(prop, raw))?,
        };
        if self.length != 0 && self.length < value.len() {
            return Err(p.invalid(format!(
                "{} is longer than the fixed length {}",
                prop, self.length
            )));
        }
        Ok(value)
    }

    fn parse_valid_values(&mut self, p: &FieldParser<'_>, common: &FieldCommon) -> Result<()> {
        let sources = string::valid_value_sources(p, common)?;
        if sources.is_empty() && !p.props.contains("defaultValidValue") {
            return Ok(());
        }
        if !p.env.ctx.supports(Feature::ValidValueInStringData) {
            p.warn(format!(
                "Valid values of <data> are not supported for DSL version {}, ignored.",
                p.env.ctx.dsl_version
            ));
            return Ok(());
        }
        for (raw, since_version, deprecated_since, _) in sources {
            let value = self.parse_value(p, "validValue", &raw)?;
            self.valid_values.push(DataValidValue {
                value,
                since_version,
                deprecated_since,
            });
        }
        if let Some(raw) = p.prop("defaultValidValue")? {
            let value = self.parse_value(p, "defaultValidValue", raw)?;
            self.default_value = value.clone();
            self.valid_values.push(DataValidValue {
                value,
                since_version: common.since_version,
                deprecated_since: common.deprecated_since,
            });
        }
        self.valid_values.sort_by(|a, b| a.value.cmp(&b.value));
        Ok(())
    }

    pub fn min_length(&self) -> usize {
        match self.strategy() {
            LengthStrategy::Fixed => self.length,
            LengthStrategy::Prefix => self.prefix.as_ref().map_or(0, Prefix::min_length),
            _ => 0,
        }
    }

    pub fn max_length(&self) -> usize {
        match self.strategy() {
            LengthStrategy::Fixed => self.length,
            LengthStrategy::Prefix => string::prefixed_max_length(self.prefix.as_ref()),
            _ => usize::MAX,
        }
    }
}
