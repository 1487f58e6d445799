//! `<bitfield>`: integral members packed into whole bytes.

use crate::common::{self, Endian};
use crate::cond::Cond;
use crate::context::Feature;
use crate::error::{Result, SchemaError};
use crate::reuse;

use super::parse::check_unique_names;
use super::{Field, FieldCommon, FieldKind, FieldParser, Kind};

pub(super) const PROPS: &[&str] = &["endian", "validCond", "copyValidCondFrom"];

pub(super) const CHILDREN: &[&str] = &["members", "replace"];

const MAX_BITS: usize = 64;

#[derive(Debug, Clone, Default)]
pub struct BitfieldField {
    pub endian: Endian,
    pub members: Vec<Field>,
    pub valid_cond: Option<Cond>,
}

impl BitfieldField {
    pub(super) fn parse(&mut self, p: &FieldParser<'_>, common: &mut FieldCommon) -> Result<()> {
        self.endian = super::int::parse_endian(p, self.endian)?;

        let declared = p.parse_members(Kind::Bitfield, common)?;
        if p.reused {
            reuse::check_no_new_members(Kind::Bitfield, declared.len(), &p.loc())?;
            for m in self.members.iter_mut() {
                m.common.since_version = common.since_version;
                m.common.deprecated_since = common.deprecated_since;
            }
        } else {
            self.members = declared;
        }
        let replacements = p.parse_replace(Kind::Bitfield, common)?;
        reuse::replace_members(&mut self.members, replacements, &p.loc())?;

        if self.members.is_empty() {
            return Err(SchemaError::InvalidStructure(format!(
                "{}: <bitfield> \"{}\" must have members",
                p.loc(),
                common.name
            )));
        }
        check_unique_names(&self.members, &p.loc())?;

        for m in &self.members {
            if !matches!(m.dereferenced().kind(), Kind::Int | Kind::Enum | Kind::Set) {
                return Err(SchemaError::InvalidStructure(format!(
                    "line {}: <{}> cannot be a member of <bitfield>",
                    m.common.line,
                    m.kind()
                )));
            }
            if m.common.since_version != common.since_version
                || m.common.deprecated_since != common.deprecated_since
            {
                return Err(SchemaError::InvalidVersion(format!(
                    "line {}: bitfield member \"{}\" cannot change sinceVersion or deprecated",
                    m.common.line,
                    m.name()
                )));
            }
        }

        let bits = self.total_bits();
        if bits == 0 || MAX_BITS < bits || bits % common::BITS_IN_BYTE != 0 {
            return Err(SchemaError::BitLengthExceeded(format!(
                "{}: total bit length of members ({}) must be a non-zero multiple of 8 not exceeding {}",
                p.loc(),
                bits,
                MAX_BITS
            )));
        }

        self.valid_cond = parse_valid_cond(p, &self.members, self.valid_cond.take())?;
        Ok(())
    }

    pub fn total_bits(&self) -> usize {
        self.members.iter().map(Field::bit_length).sum()
    }

    pub fn length(&self) -> usize {
        self.total_bits() / common::BITS_IN_BYTE
    }
}

/// `validCond` / `copyValidCondFrom` of a composite, verified against its members.
pub(super) fn parse_valid_cond(
    p: &FieldParser<'_>,
    members: &[Field],
    current: Option<Cond>,
) -> Result<Option<Cond>> {
    let declared = p.props.contains("validCond")
        || p.props.contains("copyValidCondFrom")
        || p.node.child("validCond").is_some();
    if !declared {
        return Ok(current);
    }
    if !p.env.ctx.supports(Feature::ValidCondInComposite) {
        p.warn(format!(
            "Validity conditions of composite fields are not supported for DSL version {}, ignored.",
            p.env.ctx.dsl_version
        ));
        return Ok(current);
    }

    let mut cond = p.parse_cond("validCond", false)?;
    if let Some(source) = p.prop("copyValidCondFrom")? {
        if cond.is_some() {
            return Err(p.invalid(
                "properties \"validCond\" and \"copyValidCondFrom\" cannot be used together",
            ));
        }
        let handle = p.env.registry.find(&p.env.ctx.name, source).ok_or_else(|| {
            SchemaError::InvalidReference(format!(
                "{}: field \"{}\" referenced by \"copyValidCondFrom\" is not defined",
                p.loc(),
                source
            ))
        })?;
        let copied = match &handle.field().kind {
            FieldKind::Bitfield(f) => f.valid_cond.clone(),
            FieldKind::Bundle(f) => f.valid_cond.clone(),
            _ => None,
        };
        cond = Some(copied.ok_or_else(|| {
            SchemaError::InvalidReference(format!(
                "{}: field \"{}\" has no validity condition to copy",
                p.loc(),
                source
            ))
        })?);
    }

    if let Some(c) = &cond {
        c.verify(members, &p.env, &p.loc())?;
    }
    Ok(cond.or(current))
}
