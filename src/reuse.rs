//! ReuseEngine: copy-then-override inheritance between fields, interfaces and messages.
//!
//! A reusing element starts as a deep copy of its source and then applies its own properties on
//! top. What may change afterwards is limited: the kind, integral types and length strategies are
//! fixed, bundles and bitfields cannot grow, and members can only be swapped by name through
//! `<replace>`.

use crate::common::NOT_YET_DEPRECATED;
use crate::error::{Result, SchemaError};
use crate::field::{Field, FieldCommon, Kind};

/// Start `target` as a copy of `source`, keeping its own source line.
///
/// The name is never inherited; the reusing element must declare its own.
pub fn reuse(target: &mut Field, source: &Field) -> Result<()> {
    if target.kind() != source.kind() {
        return Err(SchemaError::ReuseKindMismatch(format!(
            "line {}: cannot reuse <{}> \"{}\" as <{}>",
            target.common.line,
            source.kind(),
            source.name(),
            target.kind()
        )));
    }
    let line = target.common.line;
    *target = source.clone();

    let common = &mut target.common;
    common.name.clear();
    common.line = line;
    common.since_version = 0;
    common.deprecated_since = NOT_YET_DEPRECATED;
    common.removed = false;
    common.copy_code_from = None;
    common.reused_from = None;
    tracing::debug!(line, source = source.name(), "field reused");
    Ok(())
}

/// `reuseCode="true"`: generated code is copied from the reused field.
pub fn reuse_code(common: &mut FieldCommon, source: &str) {
    common.copy_code_from = Some(source.to_string());
}

/// Reused bundles and bitfields keep their member list; new members are rejected.
pub fn check_no_new_members(kind: Kind, added: usize, loc: &str) -> Result<()> {
    if added == 0 {
        return Ok(());
    }
    Err(SchemaError::ReuseInvariantViolation(format!(
        "{}: cannot add {} member(s) to a reused <{}>, use <replace> to override existing ones",
        loc, added, kind
    )))
}

/// Inherited members: drop those removed by `since_version`, lift the rest into the new window.
pub fn adopt_members(members: &mut Vec<Field>, since_version: u32) {
    members.retain(|m| !(m.is_deprecated_removed() && m.common.deprecated_since <= since_version));
    for m in members.iter_mut() {
        m.common.since_version = m.common.since_version.max(since_version);
    }
}

/// Swap members by name; every replacement must name an existing member and keep its
/// `sinceVersion`/`deprecated` window.
pub fn replace_members(members: &mut [Field], replacements: Vec<Field>, loc: &str) -> Result<()> {
    for replacement in replacements {
        let Some(slot) = members.iter_mut().find(|m| m.name() == replacement.name()) else {
            return Err(SchemaError::ReuseInvariantViolation(format!(
                "{}: cannot find reused member \"{}\" to replace (line {})",
                loc,
                replacement.name(),
                replacement.common.line
            )));
        };
        let (old, new) = (&slot.common, &replacement.common);
        if old.since_version != new.since_version || old.deprecated_since != new.deprecated_since {
            return Err(SchemaError::ReuseInvariantViolation(format!(
                "{}: replacing member \"{}\" cannot change its version window ([{}, {}) -> [{}, {})) (line {})",
                loc,
                replacement.name(),
                old.since_version,
                old.deprecated_since,
                new.since_version,
                new.deprecated_since,
                new.line
            )));
        }
        *slot = replacement;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(name: &str, since_version: u32) -> Field {
        let mut f = Field::blank(Kind::Int, 1);
        f.common.name = name.to_string();
        f.common.since_version = since_version;
        f
    }

    #[test]
    fn replace_keeps_version_window() {
        let mut members = vec![int("a", 0), int("b", 2)];
        replace_members(&mut members, vec![int("b", 2)], "line 1").expect("replace");

        let err = replace_members(&mut members, vec![int("a", 1)], "line 1").unwrap_err();
        assert!(matches!(err, SchemaError::ReuseInvariantViolation(_)));
        assert_eq!(members[0].common.since_version, 0);
    }

    #[test]
    fn no_new_members_accepts_zero() {
        assert!(check_no_new_members(Kind::Bundle, 0, "line 1").is_ok());
        let err = check_no_new_members(Kind::Bundle, 2, "line 1").unwrap_err();
        assert!(matches!(err, SchemaError::ReuseInvariantViolation(_)));
    }
}
