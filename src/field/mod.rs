//! FieldModel: the closed set of field kinds.
//!
//! A [`Field`] is the common attribute block ([`FieldCommon`]) plus one kind payload
//! ([`FieldKind`]). Every query the generator or the reference machinery needs is answered here
//! with an exhaustive match over the kinds; kind specifics live in the submodules.
//!
//! ## Construction
//!
//! [`Field::create`] builds a field from its XML element: optional reuse of a previously
//! registered field, the common properties, the kind properties, then semantic type, name and
//! `validateMinLength` checks. Children (members, element, wrapped field) are built before the
//! parent inspects them.

mod bitfield;
mod bundle;
mod data;
mod enums;
mod float;
mod int;
mod list;
mod optional;
mod parse;
mod ref_field;
mod set;
mod string;
mod variant;

use std::fmt;

use crate::common::{self, OverrideType, SemanticType, NOT_YET_DEPRECATED};
use crate::context::{Feature, Parent, ParseEnv};
use crate::error::{Result, SchemaError};
use crate::range::ValidRanges;
use crate::reference::{self, RefDescriptor, RefKind};
use crate::registry::FieldHandle;
use crate::xml::XmlNode;

pub use bitfield::BitfieldField;
pub use bundle::{Alias, BundleField};
pub use data::DataField;
pub use enums::{EnumField, EnumValue};
pub use float::{FloatField, FloatSpecial, FloatType};
pub use int::{IntField, IntType, Special};
pub use list::ListField;
pub use optional::{OptionalField, OptionalMode};
pub use ref_field::RefField;
pub use set::{SetBit, SetField};
pub use string::{StringField, StringValidValue};
pub use variant::VariantField;

pub(crate) use parse::FieldParser;

/// Field kind, one per DSL element tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Int,
    Float,
    Enum,
    Set,
    Bitfield,
    Bundle,
    String,
    Data,
    List,
    Ref,
    Optional,
    Variant,
}

impl Kind {
    pub const ALL: [Kind; 12] = [
        Kind::Int,
        Kind::Float,
        Kind::Enum,
        Kind::Set,
        Kind::Bitfield,
        Kind::Bundle,
        Kind::String,
        Kind::Data,
        Kind::List,
        Kind::Ref,
        Kind::Optional,
        Kind::Variant,
    ];

    pub fn from_tag(tag: &str) -> Option<Kind> {
        Kind::ALL.iter().copied().find(|k| k.tag() == tag)
    }

    pub fn tag(self) -> &'static str {
        match self {
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::Enum => "enum",
            Kind::Set => "set",
            Kind::Bitfield => "bitfield",
            Kind::Bundle => "bundle",
            Kind::String => "string",
            Kind::Data => "data",
            Kind::List => "list",
            Kind::Ref => "ref",
            Kind::Optional => "optional",
            Kind::Variant => "variant",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Generator override policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overrides {
    pub value: OverrideType,
    pub read: OverrideType,
    pub write: OverrideType,
    pub refresh: OverrideType,
    pub length: OverrideType,
    pub valid: OverrideType,
    pub name: OverrideType,
}

/// Attributes shared by every kind.
#[derive(Debug, Clone)]
pub struct FieldCommon {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub semantic_type: SemanticType,
    pub since_version: u32,
    pub deprecated_since: u32,
    pub removed: bool,
    pub pseudo: bool,
    pub fixed_value: bool,
    pub customizable: bool,
    pub fail_on_invalid: bool,
    pub force_gen: bool,
    pub display_read_only: bool,
    pub display_hidden: bool,
    pub overrides: Overrides,
    pub copy_code_from: Option<String>,
    pub reused_from: Option<String>,
    pub validate_min_length: Option<usize>,
    pub line: usize,
}

impl Default for FieldCommon {
    fn default() -> Self {
        FieldCommon {
            name: String::new(),
            display_name: String::new(),
            description: String::new(),
            semantic_type: SemanticType::None,
            since_version: 0,
            deprecated_since: NOT_YET_DEPRECATED,
            removed: false,
            pseudo: false,
            fixed_value: false,
            customizable: false,
            fail_on_invalid: false,
            force_gen: false,
            display_read_only: false,
            display_hidden: false,
            overrides: Overrides::default(),
            copy_code_from: None,
            reused_from: None,
            validate_min_length: None,
            line: 0,
        }
    }
}

/// Kind payloads.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Int(IntField),
    Float(FloatField),
    Enum(EnumField),
    Set(SetField),
    Bitfield(BitfieldField),
    Bundle(BundleField),
    String(StringField),
    Data(DataField),
    List(ListField),
    Ref(RefField),
    Optional(OptionalField),
    Variant(VariantField),
}

impl FieldKind {
    fn blank(kind: Kind) -> FieldKind {
        match kind {
            Kind::Int => FieldKind::Int(IntField::default()),
            Kind::Float => FieldKind::Float(FloatField::default()),
            Kind::Enum => FieldKind::Enum(EnumField::default()),
            Kind::Set => FieldKind::Set(SetField::default()),
            Kind::Bitfield => FieldKind::Bitfield(BitfieldField::default()),
            Kind::Bundle => FieldKind::Bundle(BundleField::default()),
            Kind::String => FieldKind::String(StringField::default()),
            Kind::Data => FieldKind::Data(DataField::default()),
            Kind::List => FieldKind::List(ListField::default()),
            Kind::Ref => FieldKind::Ref(RefField::default()),
            Kind::Optional => FieldKind::Optional(OptionalField::default()),
            Kind::Variant => FieldKind::Variant(VariantField::default()),
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            FieldKind::Int(_) => Kind::Int,
            FieldKind::Float(_) => Kind::Float,
            FieldKind::Enum(_) => Kind::Enum,
            FieldKind::Set(_) => Kind::Set,
            FieldKind::Bitfield(_) => Kind::Bitfield,
            FieldKind::Bundle(_) => Kind::Bundle,
            FieldKind::String(_) => Kind::String,
            FieldKind::Data(_) => Kind::Data,
            FieldKind::List(_) => Kind::List,
            FieldKind::Ref(_) => Kind::Ref,
            FieldKind::Optional(_) => Kind::Optional,
            FieldKind::Variant(_) => Kind::Variant,
        }
    }
}

/// A child field owned inline or a link to a registered field.
#[derive(Debug, Clone)]
pub enum FieldSlot {
    Inline(Box<Field>),
    External(FieldHandle),
}

impl FieldSlot {
    pub fn field(&self) -> &Field {
        match self {
            FieldSlot::Inline(f) => f,
            FieldSlot::External(h) => h.field(),
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, FieldSlot::External(_))
    }
}

/// Length, count or terminator prefix of a sequence field.
#[derive(Debug, Clone)]
pub enum Prefix {
    Field(FieldSlot),
    /// `$name`: a sibling of the sequence field, resolved once siblings exist.
    Detached(String),
}

impl Prefix {
    pub fn field(&self) -> Option<&Field> {
        match self {
            Prefix::Field(slot) => Some(slot.field()),
            Prefix::Detached(_) => None,
        }
    }

    pub fn detached(&self) -> Option<&str> {
        match self {
            Prefix::Detached(name) => Some(name),
            Prefix::Field(_) => None,
        }
    }

    fn min_length(&self) -> usize {
        self.field().map_or(0, Field::min_length)
    }

    fn max_length(&self) -> usize {
        self.field().map_or(0, Field::max_length)
    }

    /// Largest value the prefix can carry, when it is an integer.
    fn max_value(&self) -> Option<u64> {
        let int = self.field()?.as_int()?;
        u64::try_from(int.max_value.max(0)).ok()
    }
}

/// A constructed field.
#[derive(Debug, Clone)]
pub struct Field {
    pub common: FieldCommon,
    pub kind: FieldKind,
}

impl Field {
    pub(crate) fn blank(kind: Kind, line: usize) -> Field {
        Field {
            common: FieldCommon {
                line,
                ..FieldCommon::default()
            },
            kind: FieldKind::blank(kind),
        }
    }

    /// Build a field of kind `tag` from `node`.
    pub fn create(tag: &str, node: &XmlNode, env: ParseEnv<'_>, parent: Parent) -> Result<Field> {
        let kind = Kind::from_tag(tag).ok_or_else(|| {
            SchemaError::UnknownFieldKind(format!("{}: unknown field kind \"{}\"", node.loc(), tag))
        })?;
        parse::build(kind, node, env, parent)
    }

    /// Build a field whose kind is the element name.
    pub fn from_node(node: &XmlNode, env: ParseEnv<'_>, parent: Parent) -> Result<Field> {
        Field::create(&node.name, node, env, parent)
    }

    pub fn kind(&self) -> Kind {
        self.kind.kind()
    }

    pub fn name(&self) -> &str {
        &self.common.name
    }

    pub fn semantic_type(&self) -> common::SemanticType {
        self.common.semantic_type
    }

    pub fn is_deprecated_removed(&self) -> bool {
        self.common.removed && self.common.deprecated_since < NOT_YET_DEPRECATED
    }

    pub fn as_int(&self) -> Option<&IntField> {
        match &self.kind {
            FieldKind::Int(f) => Some(f),
            FieldKind::Ref(r) => r.target().and_then(Field::as_int),
            _ => None,
        }
    }

    /// Follows `ref` chains down to the first non-ref field.
    pub fn dereferenced(&self) -> &Field {
        match &self.kind {
            FieldKind::Ref(r) => r.target().map_or(self, Field::dereferenced),
            _ => self,
        }
    }

    pub fn min_length(&self) -> usize {
        match &self.kind {
            FieldKind::Int(f) => f.min_length(),
            FieldKind::Float(f) => f.length(),
            FieldKind::Enum(f) => f.min_length(),
            FieldKind::Set(f) => f.length,
            FieldKind::Bitfield(f) => f.length(),
            FieldKind::Bundle(f) => f.min_length(),
            FieldKind::String(f) => f.min_length(),
            FieldKind::Data(f) => f.min_length(),
            FieldKind::List(f) => f.min_length(),
            FieldKind::Ref(f) => f.target().map_or(0, Field::min_length),
            FieldKind::Optional(_) => 0,
            FieldKind::Variant(f) => f.min_length(),
        }
    }

    /// `usize::MAX` when unbounded.
    pub fn max_length(&self) -> usize {
        match &self.kind {
            FieldKind::Int(f) => f.length,
            FieldKind::Float(f) => f.length(),
            FieldKind::Enum(f) => f.length,
            FieldKind::Set(f) => f.length,
            FieldKind::Bitfield(f) => f.length(),
            FieldKind::Bundle(f) => f.max_length(),
            FieldKind::String(f) => f.max_length(),
            FieldKind::Data(f) => f.max_length(),
            FieldKind::List(f) => f.max_length(),
            FieldKind::Ref(f) => f.target().map_or(0, Field::max_length),
            FieldKind::Optional(f) => f.field().map_or(0, Field::max_length),
            FieldKind::Variant(f) => f.max_length(),
        }
    }

    /// Width in bits; for bitfield members the declared `bitLength`.
    pub fn bit_length(&self) -> usize {
        let explicit = match &self.kind {
            FieldKind::Int(f) => f.bit_length,
            FieldKind::Enum(f) => f.bit_length,
            FieldKind::Set(f) => f.bit_length,
            FieldKind::Bitfield(f) => f.total_bits(),
            FieldKind::Ref(f) => {
                if f.bit_length != 0 {
                    f.bit_length
                } else {
                    f.target().map_or(0, Field::bit_length)
                }
            }
            _ => 0,
        };
        if explicit != 0 {
            return explicit;
        }
        common::mul_length(self.max_length(), common::BITS_IN_BYTE)
    }

    /// Direct members of composite kinds; empty for everything else.
    pub fn members(&self) -> &[Field] {
        match &self.kind {
            FieldKind::Bitfield(f) => &f.members,
            FieldKind::Bundle(f) => &f.members,
            FieldKind::Variant(f) => &f.members,
            _ => &[],
        }
    }

    pub fn valid_ranges(&self) -> Option<&ValidRanges> {
        match &self.kind {
            FieldKind::Int(f) => Some(&f.valid_ranges),
            FieldKind::Float(f) => Some(&f.valid_ranges),
            FieldKind::Enum(f) => Some(&f.valid_ranges),
            FieldKind::Ref(f) => f.target().and_then(Field::valid_ranges),
            _ => None,
        }
    }

    /// Whether a literal (or an inner value name) may be compared against this field.
    pub fn is_comparable_to_value(&self, value: &str) -> bool {
        if matches!(
            self.common.semantic_type,
            SemanticType::Version | SemanticType::Length
        ) && common::parse_i128(value).is_none()
            && self.str_to_numeric(value).is_none()
        {
            return false;
        }
        match &self.kind {
            FieldKind::Int(f) => f.str_to_value(value).is_some(),
            FieldKind::Float(f) => f.str_to_value(value).is_some(),
            FieldKind::Enum(f) => f.str_to_value(value).is_some(),
            FieldKind::Set(_) => common::parse_i128(value).is_some_and(|v| v >= 0),
            FieldKind::String(_) => !value.starts_with('^'),
            FieldKind::Data(_) => !value.starts_with('^') && data::parse_hex(value).is_some(),
            FieldKind::Ref(f) => f.target().is_some_and(|t| t.is_comparable_to_value(value)),
            FieldKind::Optional(f) => f.field().is_some_and(|t| t.is_comparable_to_value(value)),
            _ => false,
        }
    }

    /// Kind compatibility of two fields in a comparison; `ref`s compare as their targets.
    pub fn is_comparable_to_field(&self, other: &Field) -> bool {
        let this = self.dereferenced();
        let other = other.dereferenced();
        if let FieldKind::Optional(opt) = &this.kind {
            return opt.field().is_some_and(|f| f.is_comparable_to_field(other));
        }
        if let FieldKind::Optional(opt) = &other.kind {
            return opt.field().is_some_and(|f| this.is_comparable_to_field(f));
        }
        match (this.kind(), other.kind()) {
            (a, b) if a == b => !matches!(a, Kind::Bundle | Kind::Bitfield | Kind::List | Kind::Variant),
            (Kind::Int, Kind::Enum) | (Kind::Enum, Kind::Int) => true,
            (Kind::Float, Kind::Int) | (Kind::Float, Kind::Enum) => true,
            _ => false,
        }
    }

    fn member_value<T>(&self, path: &str, get: impl Fn(&Field, &str) -> Option<T>) -> Option<T> {
        let (first, rest) = path.split_once('.').unwrap_or((path, ""));
        let member = self.members().iter().find(|m| m.name() == first)?;
        get(member, rest)
    }

    /// Numeric value designated by `path` (empty: the default value).
    pub fn str_to_numeric(&self, path: &str) -> Option<i128> {
        if !path.is_empty() && !self.members().is_empty() {
            return self.member_value(path, Field::str_to_numeric);
        }
        match &self.kind {
            FieldKind::Int(f) => f.str_to_numeric(path),
            FieldKind::Enum(f) => f.str_to_numeric(path),
            FieldKind::Set(f) => f.str_to_bool(path).map(i128::from),
            FieldKind::Float(f) => {
                let v = f.str_to_fp(path)?;
                (v.is_finite() && v.fract() == 0.0).then_some(v as i128)
            }
            FieldKind::Ref(f) => f.target()?.str_to_numeric(path),
            FieldKind::Optional(f) => f.inner_value(path, Field::str_to_numeric),
            _ => None,
        }
    }

    pub fn str_to_fp(&self, path: &str) -> Option<f64> {
        if !path.is_empty() && !self.members().is_empty() {
            return self.member_value(path, Field::str_to_fp);
        }
        match &self.kind {
            FieldKind::Float(f) => f.str_to_fp(path),
            FieldKind::Int(f) => f.str_to_fp(path),
            FieldKind::Enum(f) => f.str_to_numeric(path).map(|v| v as f64),
            FieldKind::Ref(f) => f.target()?.str_to_fp(path),
            FieldKind::Optional(f) => f.inner_value(path, Field::str_to_fp),
            _ => None,
        }
    }

    pub fn str_to_bool(&self, path: &str) -> Option<bool> {
        if !path.is_empty() && !self.members().is_empty() {
            return self.member_value(path, Field::str_to_bool);
        }
        match &self.kind {
            FieldKind::Set(f) => f.str_to_bool(path),
            FieldKind::Int(_) | FieldKind::Enum(_) => self.str_to_numeric(path).map(|v| v != 0),
            FieldKind::Ref(f) => f.target()?.str_to_bool(path),
            FieldKind::Optional(f) => f.inner_value(path, Field::str_to_bool),
            _ => None,
        }
    }

    pub fn str_to_string(&self, path: &str) -> Option<String> {
        if !path.is_empty() && !self.members().is_empty() {
            return self.member_value(path, Field::str_to_string);
        }
        match &self.kind {
            FieldKind::String(f) if path.is_empty() => Some(f.default_value.clone()),
            FieldKind::Ref(f) => f.target()?.str_to_string(path),
            FieldKind::Optional(f) => f.inner_value(path, Field::str_to_string),
            _ => None,
        }
    }

    pub fn str_to_data(&self, path: &str) -> Option<Vec<u8>> {
        if !path.is_empty() && !self.members().is_empty() {
            return self.member_value(path, Field::str_to_data);
        }
        match &self.kind {
            FieldKind::Data(f) if path.is_empty() => Some(f.default_value.clone()),
            FieldKind::Ref(f) => f.target()?.str_to_data(path),
            FieldKind::Optional(f) => f.inner_value(path, Field::str_to_data),
            _ => None,
        }
    }

    /// Resolve the remainder of a dotted path once this field has been selected.
    pub fn process_inner_ref(&self, path: &str) -> RefDescriptor<'_> {
        if path.is_empty() {
            return RefDescriptor::field(self);
        }
        if !self.members().is_empty() {
            return reference::resolve_members(self.members(), path);
        }
        match &self.kind {
            FieldKind::Int(f) if f.special(path).is_some() => RefDescriptor::inner_value(self, path),
            FieldKind::Float(f) if f.special(path).is_some() => {
                RefDescriptor::inner_value(self, path)
            }
            FieldKind::Enum(f) if f.value(path).is_some() => RefDescriptor::inner_value(self, path),
            FieldKind::Set(f) if f.bit(path).is_some() => RefDescriptor::inner_value(self, path),
            FieldKind::Ref(f) => match f.target() {
                Some(target) => target.process_inner_ref(path),
                None => RefDescriptor::invalid(),
            },
            FieldKind::Optional(f) => f.process_inner_ref(path),
            _ => RefDescriptor::invalid(),
        }
    }

    /// Whether this field accepts being the endpoint of a `kind` resolution.
    pub fn is_valid_ref_type(&self, kind: RefKind) -> bool {
        match kind {
            RefKind::Invalid => return false,
            RefKind::Field => return true,
            RefKind::Exists
                if self.common.since_version > 0
                    || self.common.deprecated_since < NOT_YET_DEPRECATED =>
            {
                return true
            }
            _ => {}
        }
        match &self.kind {
            FieldKind::Int(_) | FieldKind::Float(_) | FieldKind::Enum(_) | FieldKind::Set(_) => {
                kind == RefKind::InnerValue
            }
            FieldKind::String(_) | FieldKind::Data(_) | FieldKind::List(_) => kind == RefKind::Size,
            FieldKind::Optional(_) => kind == RefKind::Exists,
            FieldKind::Ref(f) => f.target().is_some_and(|t| t.is_valid_ref_type(kind)),
            _ => false,
        }
    }

    /// Checks that need the fields declared next to this one.
    pub fn verify_siblings(&self, siblings: &[Field], env: &ParseEnv<'_>) -> Result<()> {
        let loc = format!("line {}", self.common.line);
        match &self.kind {
            FieldKind::String(f) => parse::verify_detached(f.prefix.as_ref(), siblings, &loc),
            FieldKind::Data(f) => parse::verify_detached(f.prefix.as_ref(), siblings, &loc),
            FieldKind::List(f) => f.verify_siblings(siblings, &loc),
            FieldKind::Optional(f) => match &f.cond {
                Some(cond) => cond.verify(siblings, env, &loc),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    fn semantic_type_allowed(&self, ty: SemanticType, env: &ParseEnv<'_>) -> bool {
        let non_int_length = env.ctx.supports(Feature::NonIntSemanticLength);
        match (&self.kind, ty) {
            (_, SemanticType::None) => true,
            (FieldKind::Int(_), SemanticType::Version) => true,
            (FieldKind::Int(_), SemanticType::Length) => env.ctx.supports(Feature::SemanticTypeLength),
            (FieldKind::Enum(_), SemanticType::MessageId) => true,
            (FieldKind::Ref(f), _) => f.target().is_some_and(|t| t.semantic_type_allowed(ty, env)),
            (
                FieldKind::Bundle(_) | FieldKind::Variant(_) | FieldKind::Optional(_),
                SemanticType::Length,
            ) => non_int_length,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for kind in Kind::ALL {
            assert_eq!(Kind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(Kind::from_tag("frame"), None);
    }
}
