//! `<optional>`: a field whose presence depends on a mode or an existence condition.

use crate::cond::Cond;
use crate::error::{Result, SchemaError};
use crate::reference::RefDescriptor;

use super::{Field, FieldCommon, FieldParser, FieldSlot, Kind};

pub(super) const PROPS: &[&str] = &[
    "defaultMode",
    "displayExtModeCtrl",
    "missingOnReadFail",
    "missingOnInvalid",
    "field",
    "cond",
];

pub(super) const CHILDREN: &[&str] = &["and", "or"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OptionalMode {
    #[default]
    Tentative,
    Missing,
    Exists,
}

impl OptionalMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tent" | "tentative" | "t" => Some(OptionalMode::Tentative),
            "miss" | "missing" | "m" => Some(OptionalMode::Missing),
            "exists" | "exist" | "e" => Some(OptionalMode::Exists),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OptionalField {
    pub inner: Option<FieldSlot>,
    pub mode: OptionalMode,
    pub cond: Option<Cond>,
    pub missing_on_read_fail: bool,
    pub missing_on_invalid: bool,
}

impl OptionalField {
    pub fn field(&self) -> Option<&Field> {
        self.inner.as_ref().map(FieldSlot::field)
    }

    pub(super) fn parse(&mut self, p: &FieldParser<'_>, common: &mut FieldCommon) -> Result<()> {
        if let Some(v) = p.prop("defaultMode")? {
            self.mode = OptionalMode::parse(v).ok_or_else(|| p.unexpected("defaultMode", v))?;
        }
        if p.props.contains("displayExtModeCtrl") && p.env.ctx.property_deprecated("displayExtModeCtrl") {
            p.warn("Property \"displayExtModeCtrl\" is deprecated.");
        }
        for (prop, slot) in [
            ("missingOnReadFail", &mut self.missing_on_read_fail),
            ("missingOnInvalid", &mut self.missing_on_invalid),
        ] {
            if p.gated(prop) {
                *slot = p.bool_prop(prop)?.unwrap_or(false);
            }
        }

        let parent = p.member_parent(Kind::Optional, common);
        if let Some(inner) = p.parse_wrapped("field", parent)? {
            self.inner = Some(inner);
        }
        if self.inner.is_none() {
            return Err(SchemaError::MissingProperty(format!(
                "{}: the optional field itself hasn't been provided",
                p.loc()
            )));
        }

        if let Some(cond) = p.parse_cond("cond", true)? {
            if !p.parent.is_bundle_or_message() {
                p.warn("Existence conditions only apply to members of <bundle> and <message>.");
            }
            self.cond = Some(cond);
        }
        Ok(())
    }

    /// Strips the leading segment, which must name the wrapped field.
    fn strip_inner<'p>(&self, path: &'p str) -> Option<(&Field, &'p str)> {
        let field = self.field()?;
        let (first, rest) = path.split_once('.').unwrap_or((path, ""));
        (first == field.name()).then_some((field, rest))
    }

    pub(super) fn inner_value<T>(&self, path: &str, get: impl Fn(&Field, &str) -> Option<T>) -> Option<T> {
        if path.is_empty() {
            return None;
        }
        let (field, rest) = self.strip_inner(path)?;
        get(field, rest)
    }

    pub(super) fn process_inner_ref(&self, path: &str) -> RefDescriptor<'_> {
        match self.strip_inner(path) {
            Some((field, rest)) => field.process_inner_ref(rest),
            None => RefDescriptor::invalid(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_aliases() {
        assert_eq!(OptionalMode::parse("t"), Some(OptionalMode::Tentative));
        assert_eq!(OptionalMode::parse("Missing"), Some(OptionalMode::Missing));
        assert_eq!(OptionalMode::parse("exist"), Some(OptionalMode::Exists));
        assert_eq!(OptionalMode::parse("maybe"), None);
    }
}
