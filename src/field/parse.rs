//! Property access and the construction steps shared by all kinds.

use std::fmt;

use crate::common::{self, OverrideType, SemanticType, NOT_YET_DEPRECATED};
use crate::cond::Cond;
use crate::context::{Feature, Parent, ParseEnv};
use crate::error::{Result, SchemaError};
use crate::reference::{self, RefKind};
use crate::reuse;
use crate::xml::{Props, XmlNode};

use super::{
    bitfield, bundle, data, enums, float, int, list, optional, ref_field, set, string, variant,
};
use super::{Field, FieldCommon, FieldKind, FieldSlot, Kind, Prefix};

const COMMON_PROPS: &[&str] = &[
    "name",
    "displayName",
    "description",
    "sinceVersion",
    "deprecated",
    "removed",
    "semanticType",
    "reuse",
    "reuseCode",
    "pseudo",
    "fixedValue",
    "customizable",
    "failOnInvalid",
    "forceGen",
    "displayReadOnly",
    "displayHidden",
    "copyCodeFrom",
    "validateMinLength",
    "valueOverride",
    "readOverride",
    "writeOverride",
    "refreshOverride",
    "lengthOverride",
    "validOverride",
    "nameOverride",
];

fn kind_props(kind: Kind) -> &'static [&'static str] {
    match kind {
        Kind::Int => int::PROPS,
        Kind::Float => float::PROPS,
        Kind::Enum => enums::PROPS,
        Kind::Set => set::PROPS,
        Kind::Bitfield => bitfield::PROPS,
        Kind::Bundle => bundle::PROPS,
        Kind::String => string::PROPS,
        Kind::Data => data::PROPS,
        Kind::List => list::PROPS,
        Kind::Ref => ref_field::PROPS,
        Kind::Optional => optional::PROPS,
        Kind::Variant => variant::PROPS,
    }
}

fn kind_children(kind: Kind) -> &'static [&'static str] {
    match kind {
        Kind::Int => int::CHILDREN,
        Kind::Float => float::CHILDREN,
        Kind::Enum => enums::CHILDREN,
        Kind::Set => set::CHILDREN,
        Kind::Bitfield => bitfield::CHILDREN,
        Kind::Bundle => bundle::CHILDREN,
        Kind::String => string::CHILDREN,
        Kind::Data => data::CHILDREN,
        Kind::List => list::CHILDREN,
        Kind::Ref => ref_field::CHILDREN,
        Kind::Optional => optional::CHILDREN,
        Kind::Variant => variant::CHILDREN,
    }
}

/// Kinds whose element may directly contain field elements.
fn accepts_field_children(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::Bitfield | Kind::Bundle | Kind::Variant | Kind::Optional | Kind::List
    )
}

pub(super) fn build(kind: Kind, node: &XmlNode, env: ParseEnv<'_>, parent: Parent) -> Result<Field> {
    let child_props: Vec<&str> = COMMON_PROPS
        .iter()
        .chain(kind_props(kind).iter())
        .copied()
        .collect();
    let props = node.props(&child_props)?;

    let mut field = Field::blank(kind, node.line);
    let reuse_ref = props.single(node, "reuse")?.map(str::to_string);
    if let Some(ext) = &reuse_ref {
        let source = env.registry.find(&env.ctx.name, ext).ok_or_else(|| {
            SchemaError::InvalidReference(format!(
                "{}: the field \"{}\" to reuse hasn't been recorded yet",
                node.loc(),
                ext
            ))
        })?;
        reuse::reuse(&mut field, source.field())?;
        field.common.reused_from = Some(ext.clone());
    }

    let p = FieldParser {
        node,
        env,
        parent,
        props,
        reused: reuse_ref.is_some(),
    };
    p.parse_common(&mut field.common)?;

    let Field { common, kind: state } = &mut field;
    match state {
        FieldKind::Int(f) => f.parse(&p, common)?,
        FieldKind::Float(f) => f.parse(&p, common)?,
        FieldKind::Enum(f) => f.parse(&p, common)?,
        FieldKind::Set(f) => f.parse(&p, common)?,
        FieldKind::Bitfield(f) => f.parse(&p, common)?,
        FieldKind::Bundle(f) => f.parse(&p, common)?,
        FieldKind::String(f) => f.parse(&p, common)?,
        FieldKind::Data(f) => f.parse(&p, common)?,
        FieldKind::List(f) => f.parse(&p, common)?,
        FieldKind::Ref(f) => f.parse(&p, common)?,
        FieldKind::Optional(f) => f.parse(&p, common)?,
        FieldKind::Variant(f) => f.parse(&p, common)?,
    }

    p.verify_semantic_type(&field)?;
    p.verify_name(&field)?;
    p.check_min_length(&field)?;
    p.warn_unknown(kind);
    env.diag.debug(node, format!("{} \"{}\" built", kind, field.name()));
    Ok(field)
}

/// Element being built together with its environment and merged properties.
pub(crate) struct FieldParser<'a> {
    pub node: &'a XmlNode,
    pub env: ParseEnv<'a>,
    pub parent: Parent,
    pub props: Props,
    /// The field started as a copy of another one.
    pub reused: bool,
}

impl<'a> FieldParser<'a> {
    pub fn loc(&self) -> String {
        self.node.loc()
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.env.warn(self.node, message);
    }

    pub fn prop(&self, name: &str) -> Result<Option<&str>> {
        self.props.single(self.node, name)
    }

    pub fn required(&self, name: &str) -> Result<&str> {
        self.props.required(self.node, name)
    }

    pub fn unexpected(&self, name: &str, value: &str) -> SchemaError {
        SchemaError::InvalidProperty(format!(
            "{}: property \"{}\" has unexpected value ({})",
            self.loc(),
            name,
            value
        ))
    }

    pub fn invalid(&self, message: impl fmt::Display) -> SchemaError {
        SchemaError::InvalidProperty(format!("{}: {}", self.loc(), message))
    }

    pub fn bool_prop(&self, name: &str) -> Result<Option<bool>> {
        match self.prop(name)? {
            None => Ok(None),
            Some(v) => common::parse_bool(v)
                .map(Some)
                .ok_or_else(|| self.unexpected(name, v)),
        }
    }

    pub fn usize_prop(&self, name: &str) -> Result<Option<usize>> {
        match self.prop(name)? {
            None => Ok(None),
            Some(v) => common::parse_uint(v)
                .and_then(|n| usize::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| self.unexpected(name, v)),
        }
    }

    /// Whether a DSL-versioned property is present and usable; warns when it is ignored.
    pub fn gated(&self, name: &str) -> bool {
        if !self.props.contains(name) {
            return false;
        }
        if !self.env.ctx.property_supported(name) {
            self.warn(format!(
                "Property \"{}\" is not supported for DSL version {}, ignored.",
                name, self.env.ctx.dsl_version
            ));
            return false;
        }
        true
    }

    fn warn_deprecated(&self, name: &str) {
        if self.props.contains(name) && self.env.ctx.property_deprecated(name) {
            self.warn(format!("Property \"{}\" is deprecated.", name));
        }
    }

    /// Window for children of the field being built.
    pub fn member_parent(&self, kind: Kind, common: &FieldCommon) -> Parent {
        Parent::field(kind, common.since_version, common.deprecated_since)
    }

    /// `sinceVersion`/`deprecated` of an inner element (special, value, bit) within the field window.
    pub fn element_versions(&self, elem: &XmlNode, common: &FieldCommon) -> Result<(u32, u32)> {
        let props = elem.props(&[])?;
        self.env
            .ctx
            .read_versions(elem, &props, common.since_version, common.deprecated_since)
    }

    fn parse_common(&self, common: &mut FieldCommon) -> Result<()> {
        if let Some(name) = self.prop("name")? {
            common.name = name.to_string();
        }
        if let Some(v) = self.prop("displayName")? {
            common.display_name = v.to_string();
        }
        if let Some(v) = self.prop("description")? {
            common.description = v.to_string();
        }

        if self.parent.is_versioned() {
            let (since, deprecated) = self.env.ctx.read_versions(
                self.node,
                &self.props,
                self.parent.since_version,
                self.parent.deprecated_since,
            )?;
            common.since_version = since;
            common.deprecated_since = deprecated;
        } else {
            for prop in ["sinceVersion", "deprecated", "removed"] {
                if self.props.contains(prop) {
                    self.warn(format!(
                        "Property \"{}\" is not applicable to a global field, ignored.",
                        prop
                    ));
                }
            }
        }

        if self.parent.is_versioned() {
            if let Some(removed) = self.bool_prop("removed")? {
                if removed && common.deprecated_since == NOT_YET_DEPRECATED {
                    self.warn("Property \"removed\" is ignored for a field that is not deprecated.");
                } else {
                    common.removed = removed;
                }
            }
        }

        if let Some(v) = self.prop("semanticType")? {
            common.semantic_type =
                SemanticType::parse(v).ok_or_else(|| self.unexpected("semanticType", v))?;
        }

        let flags: [(&str, &mut bool); 4] = [
            ("pseudo", &mut common.pseudo),
            ("customizable", &mut common.customizable),
            ("failOnInvalid", &mut common.fail_on_invalid),
            ("forceGen", &mut common.force_gen),
        ];
        for (prop, slot) in flags {
            if let Some(v) = self.bool_prop(prop)? {
                *slot = v;
            }
        }
        if self.gated("fixedValue") {
            common.fixed_value = self.bool_prop("fixedValue")?.unwrap_or(false);
        }
        for (prop, slot) in [
            ("displayReadOnly", &mut common.display_read_only),
            ("displayHidden", &mut common.display_hidden),
        ] {
            self.warn_deprecated(prop);
            if let Some(v) = self.bool_prop(prop)? {
                *slot = v;
            }
        }

        let o = &mut common.overrides;
        let overrides: [(&str, &mut OverrideType); 7] = [
            ("valueOverride", &mut o.value),
            ("readOverride", &mut o.read),
            ("writeOverride", &mut o.write),
            ("refreshOverride", &mut o.refresh),
            ("lengthOverride", &mut o.length),
            ("validOverride", &mut o.valid),
            ("nameOverride", &mut o.name),
        ];
        for (prop, slot) in overrides {
            if !self.gated(prop) {
                continue;
            }
            let v = self.required(prop)?;
            *slot = OverrideType::parse(v).ok_or_else(|| self.unexpected(prop, v))?;
        }

        let copy_from = if self.gated("copyCodeFrom") {
            let v = self.required("copyCodeFrom")?;
            if self.env.registry.find(&self.env.ctx.name, v).is_none() {
                return Err(SchemaError::InvalidReference(format!(
                    "{}: field \"{}\" referenced by \"copyCodeFrom\" is not defined",
                    self.loc(),
                    v
                )));
            }
            Some(v.to_string())
        } else {
            None
        };

        if self.gated("reuseCode") && self.bool_prop("reuseCode")?.unwrap_or(false) {
            if copy_from.is_some() {
                return Err(self.invalid(
                    "properties \"reuseCode\" and \"copyCodeFrom\" cannot be used together",
                ));
            }
            match common.reused_from.clone() {
                Some(source) => reuse::reuse_code(common, &source),
                None => self.warn("Property \"reuseCode\" is ignored without \"reuse\"."),
            }
        }
        if copy_from.is_some() {
            common.copy_code_from = copy_from;
        }

        if self.gated("validateMinLength") {
            common.validate_min_length = self.usize_prop("validateMinLength")?;
        }
        Ok(())
    }

    fn verify_semantic_type(&self, field: &Field) -> Result<()> {
        let ty = field.common.semantic_type;
        if field.semantic_type_allowed(ty, &self.env) {
            return Ok(());
        }
        Err(self.invalid(format!(
            "semantic type {:?} is not applicable to <{}> field",
            ty,
            field.kind()
        )))
    }

    fn verify_name(&self, field: &Field) -> Result<()> {
        let name = field.name();
        if name.is_empty() {
            return Err(SchemaError::MissingProperty(format!(
                "{}: missing value for mandatory property \"name\" for \"{}\" element",
                self.loc(),
                self.node.name
            )));
        }
        if !common::is_valid_name(name) {
            return Err(self.unexpected("name", name));
        }
        Ok(())
    }

    fn check_min_length(&self, field: &Field) -> Result<()> {
        let Some(expected) = field.common.validate_min_length else {
            return Ok(());
        };
        let actual = field.min_length();
        if expected != actual {
            return Err(self.invalid(format!(
                "invalid minimal length, expected {}, actual {}",
                expected, actual
            )));
        }
        Ok(())
    }

    fn warn_unknown(&self, kind: Kind) {
        let known: Vec<&str> = COMMON_PROPS
            .iter()
            .chain(kind_props(kind).iter())
            .copied()
            .collect();
        for attr in self.node.unknown_attrs(&known) {
            self.warn(format!("Unknown attribute \"{}\" of <{}>.", attr, self.node.name));
        }
        let children: Vec<&str> = known
            .iter()
            .chain(kind_children(kind).iter())
            .copied()
            .collect();
        for child in self.node.unknown_children(&children) {
            if accepts_field_children(kind) && Kind::from_tag(&child.name).is_some() {
                continue;
            }
            self.env.diag.warn(
                child,
                format!("Unknown element <{}> inside <{}>.", child.name, self.node.name),
            );
        }
    }

    /// Members declared under `<members>` or directly as field elements, but not both.
    pub fn parse_members(&self, kind: Kind, common: &FieldCommon) -> Result<Vec<Field>> {
        let parent = self.member_parent(kind, common);
        let groups: Vec<&XmlNode> = self.node.children_named("members").collect();
        let direct: Vec<&XmlNode> = self
            .node
            .children
            .iter()
            .filter(|c| Kind::from_tag(&c.name).is_some())
            .collect();
        let nodes: Vec<&XmlNode> = match groups.as_slice() {
            [] => direct,
            [group] => {
                if !direct.is_empty() {
                    return Err(SchemaError::InvalidStructure(format!(
                        "{}: members must be listed either inside <members> or directly, not both",
                        self.loc()
                    )));
                }
                group.children.iter().collect()
            }
            _ => {
                return Err(SchemaError::InvalidStructure(format!(
                    "{}: only one <members> element is allowed",
                    self.loc()
                )))
            }
        };
        nodes
            .into_iter()
            .map(|n| Field::from_node(n, self.env, parent))
            .collect()
    }

    /// Fields of the `<replace>` element, if present and supported.
    pub fn parse_replace(&self, kind: Kind, common: &FieldCommon) -> Result<Vec<Field>> {
        let replaces: Vec<&XmlNode> = self.node.children_named("replace").collect();
        let elem = match replaces.as_slice() {
            [] => return Ok(Vec::new()),
            [elem] => *elem,
            _ => {
                return Err(SchemaError::InvalidStructure(format!(
                    "{}: only one <replace> element is allowed",
                    self.loc()
                )))
            }
        };
        if !self.env.ctx.supports(Feature::MemberReplace) {
            self.env.diag.warn(
                elem,
                format!(
                    "<replace> is not supported for DSL version {}, ignored.",
                    self.env.ctx.dsl_version
                ),
            );
            return Ok(Vec::new());
        }
        let parent = self.member_parent(kind, common);
        elem.children
            .iter()
            .map(|n| Field::from_node(n, self.env, parent))
            .collect()
    }

    fn external(&self, prop: &str, ext: &str) -> Result<FieldSlot> {
        self.env
            .registry
            .find(&self.env.ctx.name, ext)
            .map(FieldSlot::External)
            .ok_or_else(|| {
                SchemaError::InvalidReference(format!(
                    "{}: field \"{}\" referenced by \"{}\" is not defined",
                    self.loc(),
                    ext,
                    prop
                ))
            })
    }

    /// A child field given as an external reference or as the single field inside `<name>`.
    pub fn parse_slot(&self, name: &str, parent: Parent) -> Result<Option<FieldSlot>> {
        let elems: Vec<&XmlNode> = self
            .node
            .children_named(name)
            .filter(|c| !c.children.is_empty())
            .collect();
        match (self.prop(name)?, elems.as_slice()) {
            (None, []) => Ok(None),
            (Some(ext), []) => self.external(name, ext).map(Some),
            (None, [elem]) => {
                let [inner] = elem.children.as_slice() else {
                    return Err(SchemaError::InvalidStructure(format!(
                        "{}: <{}> must contain exactly one field",
                        elem.loc(),
                        name
                    )));
                };
                let field = Field::from_node(inner, self.env, parent)?;
                Ok(Some(FieldSlot::Inline(Box::new(field))))
            }
            _ => Err(SchemaError::DuplicateProperty(format!(
                "{}: too many definitions of \"{}\"",
                self.loc(),
                name
            ))),
        }
    }

    /// Like [`FieldParser::parse_slot`], also accepting one field element as the only child.
    pub fn parse_wrapped(&self, name: &str, parent: Parent) -> Result<Option<FieldSlot>> {
        let direct: Vec<&XmlNode> = self
            .node
            .children
            .iter()
            .filter(|c| Kind::from_tag(&c.name).is_some())
            .collect();
        let slot = self.parse_slot(name, parent)?;
        match (slot, direct.as_slice()) {
            (slot, []) => Ok(slot),
            (None, [elem]) if self.node.children.len() == 1 => {
                let field = Field::from_node(elem, self.env, parent)?;
                Ok(Some(FieldSlot::Inline(Box::new(field))))
            }
            (None, [_]) => Err(SchemaError::InvalidStructure(format!(
                "{}: the field must be wrapped in <{}> when other property elements are present",
                self.loc(),
                name
            ))),
            _ => Err(SchemaError::InvalidStructure(format!(
                "{}: only a single <{}> definition is allowed",
                self.loc(),
                name
            ))),
        }
    }

    /// Like [`FieldParser::parse_slot`] but `$sibling` names a detached prefix.
    pub fn parse_prefix(&self, name: &str, parent: Parent, allow_detached: bool) -> Result<Option<Prefix>> {
        if let Some(sibling) = self.prop(name)?.and_then(|v| v.strip_prefix('$')) {
            if !allow_detached {
                return Err(self.unexpected(name, &format!("${}", sibling)));
            }
            if !self.parent.is_bundle_or_message() {
                return Err(SchemaError::InvalidStructure(format!(
                    "{}: detached \"{}\" is only allowed for members of a <bundle> or <message>",
                    self.loc(),
                    name
                )));
            }
            if crate::parser::parse_ref_path(sibling).is_err() {
                return Err(self.unexpected(name, sibling));
            }
            return Ok(Some(Prefix::Detached(sibling.to_string())));
        }
        let prefix = self.parse_slot(name, parent)?.map(Prefix::Field);
        if let Some(field) = prefix.as_ref().and_then(Prefix::field) {
            let target = field.dereferenced();
            if target.kind() != Kind::Int && field.semantic_type() != SemanticType::Length {
                return Err(self.invalid(format!(
                    "\"{}\" must be an <int> field or have semanticType=\"length\"",
                    name
                )));
            }
        }
        Ok(prefix)
    }

    /// Condition given as `prop` text, a `<prop>` element wrapping one condition element, or
    /// (with `direct_lists`) `<and>`/`<or>` children; at most one of those.
    pub fn parse_cond(&self, prop: &str, direct_lists: bool) -> Result<Option<Cond>> {
        let mut found = Vec::new();
        if let Some(text) = self.prop(prop)? {
            found.push(Cond::parse(text, &self.loc())?);
        }
        for elem in self.node.children_named(prop).filter(|c| !c.children.is_empty()) {
            let [inner] = elem.children.as_slice() else {
                return Err(SchemaError::InvalidCondition(format!(
                    "{}: <{}> must contain a single condition",
                    elem.loc(),
                    prop
                )));
            };
            found.push(Cond::from_node(inner)?);
        }
        if direct_lists {
            for elem in self.node.children.iter().filter(|c| c.name == "and" || c.name == "or") {
                found.push(Cond::from_node(elem)?);
            }
        }
        if found.len() > 1 {
            return Err(SchemaError::InvalidCondition(format!(
                "{}: only a single condition is allowed",
                self.loc()
            )));
        }
        Ok(found.pop())
    }
}

/// Member names must be unique within their parent.
pub(crate) fn check_unique_names(members: &[Field], loc: &str) -> Result<()> {
    for (i, m) in members.iter().enumerate() {
        if members[..i].iter().any(|other| other.name() == m.name()) {
            return Err(SchemaError::DuplicateMemberName(format!(
                "{}: member \"{}\" defined more than once (line {})",
                loc,
                m.name(),
                m.common.line
            )));
        }
    }
    Ok(())
}

/// A detached prefix must name an integral (or length) sibling.
pub(super) fn verify_detached(prefix: Option<&Prefix>, siblings: &[Field], loc: &str) -> Result<()> {
    let Some(name) = prefix.and_then(Prefix::detached) else {
        return Ok(());
    };
    let info = reference::resolve(siblings, name);
    match info.field {
        Some(field) if info.kind == RefKind::Field => {
            if field.dereferenced().kind() == Kind::Int
                || field.semantic_type() == SemanticType::Length
            {
                Ok(())
            } else {
                Err(SchemaError::InvalidReference(format!(
                    "{}: detached prefix \"${}\" must be an <int> field or have semanticType=\"length\"",
                    loc, name
                )))
            }
        }
        _ => Err(SchemaError::InvalidReference(format!(
            "{}: detached prefix \"${}\" does not name a sibling field",
            loc, name
        ))),
    }
}
