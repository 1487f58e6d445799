//! `<string>`: text with a fixed length, a length prefix or a zero terminator.

use crate::common;
use crate::context::Feature;
use crate::error::{Result, SchemaError};
use crate::xml::XmlNode;

use super::{FieldCommon, FieldParser, Kind, Prefix};

pub(super) const PROPS: &[&str] = &[
    "encoding",
    "length",
    "lengthPrefix",
    "zeroTermSuffix",
    "defaultValue",
    "validValue",
    "defaultValidValue",
];

pub(super) const CHILDREN: &[&str] = &[];

/// How the serialized length of a sequence is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum LengthStrategy {
    Unbounded,
    Fixed,
    Prefix,
    ZeroTerm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringValidValue {
    pub value: String,
    pub since_version: u32,
    pub deprecated_since: u32,
}

#[derive(Debug, Clone, Default)]
pub struct StringField {
    pub encoding: String,
    pub default_value: String,
    pub length: usize,
    pub prefix: Option<Prefix>,
    pub zero_term: bool,
    pub valid_values: Vec<StringValidValue>,
}

/// `length` property; zero is meaningless.
pub(super) fn parse_fixed_length(p: &FieldParser<'_>) -> Result<Option<usize>> {
    match p.usize_prop("length")? {
        Some(0) => Err(p.unexpected("length", "0")),
        other => Ok(other),
    }
}

pub(super) fn conflicting(p: &FieldParser<'_>, props: &[&str]) -> SchemaError {
    SchemaError::ConflictingLengthSpec(format!(
        "{}: only one of {} may be specified",
        p.loc(),
        props
            .iter()
            .map(|s| format!("\"{}\"", s))
            .collect::<Vec<_>>()
            .join(", ")
    ))
}

pub(super) fn strategy_changed(p: &FieldParser<'_>, before: LengthStrategy, after: LengthStrategy) -> Result<()> {
    if p.reused && before != after {
        return Err(SchemaError::ReuseInvariantViolation(format!(
            "{}: length determination of a reused field cannot change ({:?} -> {:?})",
            p.loc(),
            before,
            after
        )));
    }
    Ok(())
}

/// `validValue` attributes and elements, with versions for the element form.
pub(super) fn valid_value_sources<'n>(
    p: &'n FieldParser<'_>,
    common: &FieldCommon,
) -> Result<Vec<(String, u32, u32, &'n XmlNode)>> {
    let mut out = Vec::new();
    for (name, value) in &p.node.attrs {
        if name == "validValue" {
            out.push((value.clone(), common.since_version, common.deprecated_since, p.node));
        }
    }
    for elem in p.node.children_named("validValue") {
        let (since, deprecated) = p.element_versions(elem, common)?;
        out.push((elem.value()?, since, deprecated, elem));
    }
    Ok(out)
}

impl StringField {
    fn strategy(&self) -> LengthStrategy {
        if self.length != 0 {
            LengthStrategy::Fixed
        } else if self.prefix.is_some() {
            LengthStrategy::Prefix
        } else if self.zero_term {
            LengthStrategy::ZeroTerm
        } else {
            LengthStrategy::Unbounded
        }
    }

    pub(super) fn parse(&mut self, p: &FieldParser<'_>, common: &mut FieldCommon) -> Result<()> {
        if let Some(v) = p.prop("encoding")? {
            self.encoding = v.to_string();
        }

        let before = self.strategy();
        let fixed = parse_fixed_length(p)?;
        let prefix = p.parse_prefix("lengthPrefix", p.member_parent(Kind::String, common), true)?;
        let zero_term = p.bool_prop("zeroTermSuffix")?.unwrap_or(false);
        let declared = usize::from(fixed.is_some()) + usize::from(prefix.is_some()) + usize::from(zero_term);
        if declared > 1 {
            return Err(conflicting(p, &["length", "lengthPrefix", "zeroTermSuffix"]));
        }
        if declared == 1 {
            self.length = fixed.unwrap_or(0);
            self.prefix = prefix;
            self.zero_term = zero_term;
            strategy_changed(p, before, self.strategy())?;
        }

        if let Some(v) = p.prop("defaultValue")? {
            self.default_value = self.parse_value(p, v)?;
        }
        self.parse_valid_values(p, common)?;
        Ok(())
    }

    /// Literal text, or `^ns.Field` naming another string's default.
    fn parse_value(&self, p: &FieldParser<'_>, raw: &str) -> Result<String> {
        let value = match raw.strip_prefix('^') {
            Some(reference) => p
                .env
                .registry
                .str_to_string(&p.env.ctx.name, reference)
                .ok_or_else(|| {
                    SchemaError::InvalidReference(format!(
                        "{}: referenced string \"{}\" is not defined",
                        p.loc(),
                        reference
                    ))
                })?,
            None => raw.to_string(),
        };
        if self.length != 0 && self.length < value.len() {
            return Err(p.invalid(format!(
                "value \"{}\" is longer than the fixed length {}",
                value, self.length
            )));
        }
        Ok(value)
    }

    fn parse_valid_values(&mut self, p: &FieldParser<'_>, common: &FieldCommon) -> Result<()> {
        let sources = valid_value_sources(p, common)?;
        let has_default_valid = p.props.contains("defaultValidValue");
        if sources.is_empty() && !has_default_valid {
            return Ok(());
        }
        if !p.env.ctx.supports(Feature::ValidValueInStringData) {
            p.warn(format!(
                "Valid values of <string> are not supported for DSL version {}, ignored.",
                p.env.ctx.dsl_version
            ));
            return Ok(());
        }
        for (raw, since_version, deprecated_since, _) in sources {
            let value = self.parse_value(p, &raw)?;
            self.valid_values.push(StringValidValue {
                value,
                since_version,
                deprecated_since,
            });
        }
        if let Some(raw) = p.prop("defaultValidValue")? {
            let value = self.parse_value(p, raw)?;
            self.default_value = value.clone();
            self.valid_values.push(StringValidValue {
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
            LengthStrategy::ZeroTerm => 1,
            LengthStrategy::Prefix => self.prefix.as_ref().map_or(0, Prefix::min_length),
            LengthStrategy::Unbounded => 0,
        }
    }

    pub fn max_length(&self) -> usize {
        match self.strategy() {
            LengthStrategy::Fixed => self.length,
            LengthStrategy::Prefix => prefixed_max_length(self.prefix.as_ref()),
            _ => usize::MAX,
        }
    }
}

/// Prefix length plus the largest length the prefix can announce.
pub(super) fn prefixed_max_length(prefix: Option<&Prefix>) -> usize {
    match prefix.and_then(|p| p.max_value().map(|v| (p.max_length(), v))) {
        Some((len, max)) => common::add_to_length(len, usize::try_from(max).unwrap_or(usize::MAX)),
        None => usize::MAX,
    }
}
