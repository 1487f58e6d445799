//! Resolution of dotted dereference paths into typed descriptors.
//!
//! A path names a field among a list of siblings (`$a.b`) or among the fields of every declared
//! interface (`%a.b`). Each segment is consumed by the field it names, so a path may descend into
//! bundle members, through references and optional wrappers, and end on an inner named value
//! (enum value, set bit, special). A `#` modifier requests the size of the target and `?` its
//! existence; the target kind decides whether it accepts such a request.

use std::fmt;

use crate::field::Field;
use crate::parser;
use crate::schema::Interface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// `$`: fields of the enclosing composite or message.
    Sibling,
    /// `%`: fields of the declared interfaces.
    Interface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefMode {
    Value,
    Size,
    Exists,
}

/// A scoped dereference operand, e.g. `$a.b#`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deref {
    pub scope: Scope,
    pub mode: RefMode,
    pub path: String,
}

impl Deref {
    pub fn parse(text: &str) -> Result<Deref, String> {
        parser::parse_deref(text)
    }

    /// Path text with the modifier reattached, as accepted by [`resolve`].
    pub fn member_path(&self) -> String {
        match self.mode {
            RefMode::Value => self.path.clone(),
            RefMode::Size => format!("{}#", self.path),
            RefMode::Exists => format!("{}?", self.path),
        }
    }
}

impl fmt::Display for Deref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = match self.scope {
            Scope::Sibling => '$',
            Scope::Interface => '%',
        };
        write!(f, "{}{}", scope, self.member_path())
    }
}

/// What a resolved path designates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Field,
    InnerValue,
    Size,
    Exists,
    Invalid,
}

/// Result of resolving a path.
#[derive(Debug, Clone)]
pub struct RefDescriptor<'a> {
    pub field: Option<&'a Field>,
    pub value_name: Option<String>,
    pub kind: RefKind,
}

impl<'a> RefDescriptor<'a> {
    pub fn invalid() -> Self {
        RefDescriptor {
            field: None,
            value_name: None,
            kind: RefKind::Invalid,
        }
    }

    pub fn field(field: &'a Field) -> Self {
        RefDescriptor {
            field: Some(field),
            value_name: None,
            kind: RefKind::Field,
        }
    }

    pub fn inner_value(field: &'a Field, name: &str) -> Self {
        RefDescriptor {
            field: Some(field),
            value_name: Some(name.to_string()),
            kind: RefKind::InnerValue,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.kind != RefKind::Invalid && self.field.is_some()
    }
}

/// Resolve `path` (optionally carrying a `#`/`?` modifier) against `fields`.
pub fn resolve<'a>(fields: &'a [Field], path: &str) -> RefDescriptor<'a> {
    match parser::parse_ref_path(path) {
        Ok((mode, path)) => resolve_with_mode(fields, &path, mode),
        Err(_) => RefDescriptor::invalid(),
    }
}

/// Resolve a modifier-free dotted path; used by composites for their inner references.
pub(crate) fn resolve_members<'a>(fields: &'a [Field], path: &str) -> RefDescriptor<'a> {
    resolve_with_mode(fields, path, RefMode::Value)
}

fn resolve_with_mode<'a>(fields: &'a [Field], path: &str, mode: RefMode) -> RefDescriptor<'a> {
    let (first, rest) = path.split_once('.').unwrap_or((path, ""));
    let Some(field) = fields.iter().find(|f| f.name() == first) else {
        return RefDescriptor::invalid();
    };
    let info = field.process_inner_ref(rest);
    apply_mode(info, mode)
}

fn apply_mode(info: RefDescriptor<'_>, mode: RefMode) -> RefDescriptor<'_> {
    let requested = match mode {
        RefMode::Value => return info,
        RefMode::Size => RefKind::Size,
        RefMode::Exists => RefKind::Exists,
    };
    match info.field {
        Some(field) if info.kind == RefKind::Field && field.is_valid_ref_type(requested) => {
            RefDescriptor {
                field: Some(field),
                value_name: None,
                kind: requested,
            }
        }
        _ => RefDescriptor::invalid(),
    }
}

/// Resolve `path` against every interface; all successful matches are returned.
pub fn resolve_interfaces<'a>(interfaces: &'a [Interface], path: &str) -> Vec<RefDescriptor<'a>> {
    interfaces
        .iter()
        .map(|iface| resolve(&iface.fields, path))
        .filter(RefDescriptor::is_valid)
        .collect()
}

/// Resolve a scoped operand. Sibling scope yields at most one match.
pub fn resolve_deref<'a>(
    deref: &Deref,
    siblings: &'a [Field],
    interfaces: &'a [Interface],
) -> Vec<RefDescriptor<'a>> {
    let path = deref.member_path();
    match deref.scope {
        Scope::Sibling => {
            let info = resolve(siblings, &path);
            if info.is_valid() {
                vec![info]
            } else {
                Vec::new()
            }
        }
        Scope::Interface => resolve_interfaces(interfaces, &path),
    }
}
