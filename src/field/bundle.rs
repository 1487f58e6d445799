//! `<bundle>`: a sequence of members serialized back to back.

use crate::common::{self, SemanticType};
use crate::cond::Cond;
use crate::context::Feature;
use crate::error::{Result, SchemaError};
use crate::reference::{self, RefKind};
use crate::reuse;

use super::bitfield::parse_valid_cond;
use super::parse::check_unique_names;
use super::{Field, FieldCommon, FieldParser, Kind};

pub(super) const PROPS: &[&str] = &["validCond", "copyValidCondFrom", "reuseAliases"];

pub(super) const CHILDREN: &[&str] = &["members", "replace", "alias"];

/// Alternative name of a (possibly nested) member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub name: String,
    /// Member path without the leading `$`.
    pub field: String,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct BundleField {
    pub members: Vec<Field>,
    pub aliases: Vec<Alias>,
    pub valid_cond: Option<Cond>,
}

impl BundleField {
    pub(super) fn parse(&mut self, p: &FieldParser<'_>, common: &mut FieldCommon) -> Result<()> {
        let declared = p.parse_members(Kind::Bundle, common)?;
        if p.reused {
            reuse::check_no_new_members(Kind::Bundle, declared.len(), &p.loc())?;
            reuse::adopt_members(&mut self.members, common.since_version);
        } else {
            self.members = declared;
        }
        let replacements = p.parse_replace(Kind::Bundle, common)?;
        reuse::replace_members(&mut self.members, replacements, &p.loc())?;

        if self.members.is_empty() {
            return Err(SchemaError::InvalidStructure(format!(
                "{}: <bundle> \"{}\" must have members",
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
                "{}: at least one member must have the same sinceVersion ({}) as the bundle",
                p.loc(),
                common.since_version
            )));
        }
        let length_members = self
            .members
            .iter()
            .filter(|m| m.semantic_type() == SemanticType::Length)
            .count();
        if length_members > 1 {
            return Err(p.invalid("only one member may have semanticType=\"length\""));
        }

        for m in &self.members {
            m.verify_siblings(&self.members, &p.env)?;
        }

        if let Some(false) = p.bool_prop("reuseAliases")? {
            self.aliases.clear();
        }
        self.parse_aliases(p)?;
        self.valid_cond = parse_valid_cond(p, &self.members, self.valid_cond.take())?;
        Ok(())
    }

    fn parse_aliases(&mut self, p: &FieldParser<'_>) -> Result<()> {
        for elem in p.node.children_named("alias") {
            if !p.env.ctx.supports(Feature::Alias) {
                return Err(SchemaError::UnsupportedFeature(format!(
                    "{}: <alias> is not supported for DSL version {}",
                    elem.loc(),
                    p.env.ctx.dsl_version
                )));
            }
            let props = elem.props(&["description"])?;
            let name = props.required(elem, "name")?;
            if !common::is_valid_name(name) {
                return Err(p.unexpected("name", name));
            }
            if self.members.iter().any(|m| m.name() == name)
                || self.aliases.iter().any(|a| a.name == name)
            {
                return Err(SchemaError::DuplicateMemberName(format!(
                    "{}: alias \"{}\" clashes with another member or alias",
                    elem.loc(),
                    name
                )));
            }
            let field = props.required(elem, "field")?;
            let path = field.strip_prefix('$').ok_or_else(|| p.unexpected("field", field))?;
            let info = reference::resolve(&self.members, path);
            if info.kind != RefKind::Field {
                return Err(SchemaError::InvalidReference(format!(
                    "{}: alias \"{}\" refers to unknown member \"{}\"",
                    elem.loc(),
                    name,
                    field
                )));
            }
            self.aliases.push(Alias {
                name: name.to_string(),
                field: path.to_string(),
                description: props.get("description").unwrap_or_default().to_string(),
            });
        }
        Ok(())
    }

    pub fn min_length(&self) -> usize {
        self.members
            .iter()
            .fold(0, |sum, m| common::add_to_length(sum, m.min_length()))
    }

    /// Unbounded when a member carries the length of the bundle.
    pub fn max_length(&self) -> usize {
        if self
            .members
            .iter()
            .any(|m| m.semantic_type() == SemanticType::Length)
        {
            return usize::MAX;
        }
        self.members
            .iter()
            .fold(0, |sum, m| common::add_to_length(sum, m.max_length()))
    }
}
