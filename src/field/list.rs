//! `<list>`: repeated elements with a fixed count, a count or length prefix, or a terminator.

use crate::common;
use crate::context::Parent;
use crate::error::{Result, SchemaError};
use crate::reference::{self, RefKind};

use super::string::conflicting;
use super::{Field, FieldCommon, FieldParser, FieldSlot, Kind, Prefix};

pub(super) const PROPS: &[&str] = &[
    "element",
    "count",
    "countPrefix",
    "lengthPrefix",
    "elemLengthPrefix",
    "elemFixedLength",
    "termSuffix",
];

pub(super) const CHILDREN: &[&str] = &[];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Unbounded,
    Count,
    CountPrefix,
    LengthPrefix,
    TermSuffix,
}

#[derive(Debug, Clone, Default)]
pub struct ListField {
    pub element: Option<FieldSlot>,
    pub count: usize,
    pub count_prefix: Option<Prefix>,
    pub length_prefix: Option<Prefix>,
    pub elem_length_prefix: Option<Prefix>,
    pub elem_fixed_length: bool,
    pub term_suffix: Option<Prefix>,
}

impl ListField {
    fn strategy(&self) -> Strategy {
        if self.count != 0 {
            Strategy::Count
        } else if self.count_prefix.is_some() {
            Strategy::CountPrefix
        } else if self.length_prefix.is_some() {
            Strategy::LengthPrefix
        } else if self.term_suffix.is_some() {
            Strategy::TermSuffix
        } else {
            Strategy::Unbounded
        }
    }

    pub fn element(&self) -> Option<&Field> {
        self.element.as_ref().map(FieldSlot::field)
    }

    pub(super) fn parse(&mut self, p: &FieldParser<'_>, common: &mut FieldCommon) -> Result<()> {
        let parent = p.member_parent(Kind::List, common);
        if let Some(element) = p.parse_wrapped("element", parent)? {
            self.element = Some(element);
        }
        if self.element.is_none() {
            return Err(SchemaError::MissingProperty(format!(
                "{}: list element hasn't been provided",
                p.loc()
            )));
        }

        let before = self.strategy();
        let count = match p.usize_prop("count")? {
            Some(0) => return Err(p.unexpected("count", "0")),
            other => other,
        };
        let count_prefix = p.parse_prefix("countPrefix", parent, true)?;
        let length_prefix = p.parse_prefix("lengthPrefix", parent, true)?;
        let term_suffix = self.parse_term_suffix(p, parent)?;
        let declared = usize::from(count.is_some())
            + usize::from(count_prefix.is_some())
            + usize::from(length_prefix.is_some())
            + usize::from(term_suffix.is_some());
        if declared > 1 {
            return Err(conflicting(
                p,
                &["count", "countPrefix", "lengthPrefix", "termSuffix"],
            ));
        }
        if declared == 1 {
            self.count = count.unwrap_or(0);
            self.count_prefix = count_prefix;
            self.length_prefix = length_prefix;
            self.term_suffix = term_suffix;
            let after = self.strategy();
            if p.reused && before != after {
                return Err(SchemaError::ReuseInvariantViolation(format!(
                    "{}: length determination of a reused list cannot change ({:?} -> {:?})",
                    p.loc(),
                    before,
                    after
                )));
            }
        }

        if let Some(fixed) = p.bool_prop("elemFixedLength")? {
            self.elem_fixed_length = fixed;
        }
        if self.elem_fixed_length {
            if let Some(elem) = self.element() {
                if elem.min_length() != elem.max_length() {
                    return Err(p.invalid(
                        "\"elemFixedLength\" cannot be true when the list element has variable length",
                    ));
                }
            }
        }
        if let Some(prefix) = p.parse_prefix("elemLengthPrefix", parent, true)? {
            self.elem_length_prefix = Some(prefix);
        }
        if self
            .elem_length_prefix
            .as_ref()
            .is_some_and(|prefix| prefix.detached().is_some())
            && !self.elem_fixed_length
        {
            return Err(p.invalid(
                "a detached element length prefix requires \"elemFixedLength\" to be set",
            ));
        }
        Ok(())
    }

    /// Any field may terminate the list; DSL versions before 5 ignore it.
    fn parse_term_suffix(&self, p: &FieldParser<'_>, parent: Parent) -> Result<Option<Prefix>> {
        let declared = p.props.contains("termSuffix") || p.node.child("termSuffix").is_some();
        if !declared {
            return Ok(None);
        }
        if !p.env.ctx.property_supported("termSuffix") {
            p.warn(format!(
                "Property \"termSuffix\" is not supported for DSL version {}, ignored.",
                p.env.ctx.dsl_version
            ));
            return Ok(None);
        }
        if p.prop("termSuffix")?.is_some_and(|v| v.starts_with('$')) {
            return p.parse_prefix("termSuffix", parent, true);
        }
        Ok(p.parse_slot("termSuffix", parent)?.map(Prefix::Field))
    }

    /// Detached prefixes and terminator must name siblings.
    pub(super) fn verify_siblings(&self, siblings: &[Field], loc: &str) -> Result<()> {
        super::parse::verify_detached(self.count_prefix.as_ref(), siblings, loc)?;
        super::parse::verify_detached(self.length_prefix.as_ref(), siblings, loc)?;
        super::parse::verify_detached(self.elem_length_prefix.as_ref(), siblings, loc)?;
        if let Some(name) = self.term_suffix.as_ref().and_then(Prefix::detached) {
            if reference::resolve(siblings, name).kind != RefKind::Field {
                return Err(SchemaError::InvalidReference(format!(
                    "{}: detached terminator \"${}\" does not name a sibling field",
                    loc, name
                )));
            }
        }
        Ok(())
    }

    fn elem_extra(&self, length: fn(&Field) -> usize) -> usize {
        self.elem_length_prefix
            .as_ref()
            .and_then(Prefix::field)
            .map_or(0, length)
    }

    pub fn min_length(&self) -> usize {
        match self.strategy() {
            Strategy::Count => {
                let mut extra = self.elem_extra(Field::min_length);
                if !self.elem_fixed_length {
                    extra = common::mul_length(extra, self.count);
                }
                let elem = self.element().map_or(0, Field::min_length);
                common::add_to_length(common::mul_length(elem, self.count), extra)
            }
            Strategy::CountPrefix => self.count_prefix.as_ref().map_or(0, Prefix::min_length),
            Strategy::LengthPrefix => self.length_prefix.as_ref().map_or(0, Prefix::min_length),
            Strategy::TermSuffix => self.term_suffix.as_ref().map_or(0, Prefix::min_length),
            Strategy::Unbounded => 0,
        }
    }

    pub fn max_length(&self) -> usize {
        let mut extra = self.elem_extra(Field::max_length);
        let elem = self.element().map_or(0, Field::max_length);
        match self.strategy() {
            Strategy::Count => {
                if !self.elem_fixed_length {
                    extra = common::mul_length(extra, self.count);
                }
                common::add_to_length(common::mul_length(elem, self.count), extra)
            }
            Strategy::CountPrefix => {
                let Some(prefix) = self.count_prefix.as_ref() else {
                    return usize::MAX;
                };
                let Some(count) = prefix.max_value() else {
                    return usize::MAX;
                };
                let count = usize::try_from(count).unwrap_or(usize::MAX);
                let mut result = common::mul_length(elem, count);
                result = common::add_to_length(result, prefix.max_length());
                if !self.elem_fixed_length {
                    extra = common::mul_length(extra, count);
                }
                common::add_to_length(result, extra)
            }
            Strategy::LengthPrefix => super::string::prefixed_max_length(self.length_prefix.as_ref()),
            _ => usize::MAX,
        }
    }
}
