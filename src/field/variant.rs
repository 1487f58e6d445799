//! `<variant>`: exactly one of several members is present.

use crate::common;
use crate::error::{Result, SchemaError};
use crate::reuse;

use super::parse::check_unique_names;
use super::{Field, FieldCommon, FieldParser, Kind};

pub(super) const PROPS: &[&str] = &["defaultMember", "displayIdxReadOnlyHidden"];

pub(super) const CHILDREN: &[&str] = &["members", "replace"];

#[derive(Debug, Clone, Default)]
pub struct VariantField {
    pub members: Vec<Field>,
    /// Index of the member selected by default; `None` selects nothing.
    pub default_member: Option<usize>,
}

impl VariantField {
    pub(super) fn parse(&mut self, p: &FieldParser<'_>, common: &mut FieldCommon) -> Result<()> {
        if p.reused {
            reuse::adopt_members(&mut self.members, common.since_version);
        }
        let declared = p.parse_members(Kind::Variant, common)?;
        self.members.extend(declared);
        let replacements = p.parse_replace(Kind::Variant, common)?;
        reuse::replace_members(&mut self.members, replacements, &p.loc())?;

        if self.members.is_empty() {
            return Err(SchemaError::InvalidStructure(format!(
                "{}: <variant> \"{}\" must contain member fields",
                p.loc(),
                common.name
            )));
        }
        check_unique_names(&self.members, &p.loc())?;
        if !self
            .members
            .iter()
            .any(|m| m.common.since_version == common.since_version)
        {
            return Err(SchemaError::InvalidVersion(format!(
                "{}: at least one member must have the same sinceVersion ({}) as the variant",
                p.loc(),
                common.since_version
            )));
        }

        self.parse_default_member(p)?;
        if p.props.contains("displayIdxReadOnlyHidden") {
            p.warn("Property \"displayIdxReadOnlyHidden\" is deprecated.");
        }
        Ok(())
    }

    /// Member name, index, or a value reference; a negative index clears the default.
    fn parse_default_member(&mut self, p: &FieldParser<'_>) -> Result<()> {
        let Some(raw) = p.prop("defaultMember")?.filter(|v| !v.is_empty()) else {
            return Ok(());
        };
        if common::is_valid_name(raw) {
            let idx = self
                .members
                .iter()
                .position(|m| m.name() == raw)
                .ok_or_else(|| p.unexpected("defaultMember", raw))?;
            self.default_member = Some(idx);
            return Ok(());
        }
        let value = if common::is_valid_ref_name(raw) {
            p.env.registry.str_to_numeric(&p.env.ctx.name, raw)
        } else {
            common::parse_i128(raw)
        }
        .ok_or_else(|| p.unexpected("defaultMember", raw))?;
        if value < 0 {
            self.default_member = None;
            return Ok(());
        }
        let idx = usize::try_from(value)
            .ok()
            .filter(|&i| i < self.members.len())
            .ok_or_else(|| p.unexpected("defaultMember", raw))?;
        self.default_member = Some(idx);
        Ok(())
    }

    pub fn min_length(&self) -> usize {
        0
    }

    /// Largest member; unbounded as soon as one member is.
    pub fn max_length(&self) -> usize {
        self.members
            .iter()
            .map(Field::max_length)
            .max()
            .unwrap_or(0)
    }
}
