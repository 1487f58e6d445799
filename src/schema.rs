//! Protocol containers: schemas, namespaces, interfaces and messages.
//!
//! A [`Protocol`] loads schema documents one after another. Each document is processed in three
//! passes (namespace fields, then interfaces, then messages) so that messages can refer to every
//! field and interface regardless of where they appear in the file.

use std::path::Path;

use crate::common::{self, Endian, NOT_YET_DEPRECATED};
use crate::context::{Diagnostics, Feature, Parent, ParseEnv, SchemaContext};
use crate::error::{Result, SchemaError};
use crate::field::{Field, FieldKind, Kind};
use crate::registry::{ExternalRef, FieldRegistry};
use crate::reuse;
use crate::xml::{self, XmlNode};

const SCHEMA_PROPS: &[&str] = &[
    "name",
    "id",
    "dslVersion",
    "version",
    "endian",
    "nonUniqueMsgIdAllowed",
    "description",
];

const INTERFACE_PROPS: &[&str] = &["name", "description", "reuse", "copyFieldsFrom"];

const MESSAGE_PROPS: &[&str] = &[
    "name",
    "id",
    "displayName",
    "description",
    "sinceVersion",
    "deprecated",
    "removed",
    "reuse",
    "reuseCode",
    "copyFieldsFrom",
    "validateMinLength",
];

fn qualify(ns: &str, name: &str) -> String {
    if ns.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", ns, name)
    }
}

/// Named group of fields messages may refer to with `%` conditions.
#[derive(Debug, Clone, Default)]
pub struct Interface {
    pub name: String,
    /// Name including the enclosing namespaces.
    pub qualified_name: String,
    pub description: String,
    pub fields: Vec<Field>,
    pub reused_from: Option<String>,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub name: String,
    pub qualified_name: String,
    pub display_name: String,
    pub description: String,
    pub id: i128,
    pub since_version: u32,
    pub deprecated_since: u32,
    pub removed: bool,
    pub fields: Vec<Field>,
    pub reused_from: Option<String>,
    pub copy_code_from: Option<String>,
    pub line: usize,
}

impl Message {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn min_length(&self) -> usize {
        self.fields
            .iter()
            .fold(0, |sum, f| common::add_to_length(sum, f.min_length()))
    }

    pub fn max_length(&self) -> usize {
        self.fields
            .iter()
            .fold(0, |sum, f| common::add_to_length(sum, f.max_length()))
    }
}

/// One loaded schema document.
#[derive(Debug, Clone)]
pub struct Schema {
    pub ctx: SchemaContext,
    pub interfaces: Vec<Interface>,
    pub messages: Vec<Message>,
    /// Qualified names of the namespaces declared in the document.
    pub namespaces: Vec<String>,
}

impl Schema {
    pub fn name(&self) -> &str {
        &self.ctx.name
    }

    pub fn message(&self, qualified_name: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.qualified_name == qualified_name)
    }

    pub fn interface(&self, qualified_name: &str) -> Option<&Interface> {
        self.interfaces
            .iter()
            .find(|i| i.qualified_name == qualified_name)
    }
}

/// Elements of one document grouped by pass, each with its namespace.
#[derive(Default)]
struct Layout<'a> {
    fields: Vec<(String, &'a XmlNode)>,
    interfaces: Vec<(String, &'a XmlNode)>,
    messages: Vec<(String, &'a XmlNode)>,
    namespaces: Vec<String>,
}

fn collect<'a>(node: &'a XmlNode, ns: &str, out: &mut Layout<'a>, diag: &Diagnostics) -> Result<()> {
    for child in &node.children {
        match child.name.as_str() {
            "fields" => out
                .fields
                .extend(child.children.iter().map(|f| (ns.to_string(), f))),
            "interface" => out.interfaces.push((ns.to_string(), child)),
            "interfaces" => out.interfaces.extend(
                child
                    .children_named("interface")
                    .map(|i| (ns.to_string(), i)),
            ),
            "message" => out.messages.push((ns.to_string(), child)),
            "messages" => out
                .messages
                .extend(child.children_named("message").map(|m| (ns.to_string(), m))),
            "ns" => {
                let props = child.props(&["description"])?;
                let name = props.required(child, "name")?;
                if !common::is_valid_name(name) {
                    return Err(SchemaError::InvalidProperty(format!(
                        "{}: invalid namespace name \"{}\"",
                        child.loc(),
                        name
                    )));
                }
                let nested = qualify(ns, name);
                if !out.namespaces.contains(&nested) {
                    out.namespaces.push(nested.clone());
                }
                collect(child, &nested, out, diag)?;
            }
            "description" | "name" => {}
            "frame" | "frames" | "platform" | "platforms" => {
                diag.debug(child, format!("<{}> is not processed", child.name));
            }
            other => diag.warn(child, format!("Unknown element <{}>, ignored.", other)),
        }
    }
    Ok(())
}

fn read_context(root: &XmlNode, diag: &Diagnostics) -> Result<SchemaContext> {
    if root.name != "schema" {
        return Err(SchemaError::InvalidStructure(format!(
            "{}: root element must be <schema>, found <{}>",
            root.loc(),
            root.name
        )));
    }
    let props = root.props(&["description"])?;
    let name = props.required(root, "name")?;
    if !common::is_valid_name(name) {
        return Err(SchemaError::InvalidProperty(format!(
            "{}: invalid schema name \"{}\"",
            root.loc(),
            name
        )));
    }
    let unsigned = |prop: &str| -> Result<u32> {
        match props.single(root, prop)? {
            None => Ok(0),
            Some(v) => common::parse_unsigned(v).ok_or_else(|| {
                SchemaError::InvalidProperty(format!(
                    "{}: property \"{}\" has unexpected value ({})",
                    root.loc(),
                    prop,
                    v
                ))
            }),
        }
    };
    let mut ctx = SchemaContext::new(name, unsigned("dslVersion")?, unsigned("version")?);
    if let Some(v) = props.single(root, "endian")? {
        ctx.endian = Endian::parse(v).ok_or_else(|| {
            SchemaError::InvalidProperty(format!("{}: unknown endian \"{}\"", root.loc(), v))
        })?;
    }
    if let Some(v) = props.single(root, "nonUniqueMsgIdAllowed")? {
        ctx.non_unique_msg_id_allowed = common::parse_bool(v).ok_or_else(|| {
            SchemaError::InvalidProperty(format!(
                "{}: property \"nonUniqueMsgIdAllowed\" has unexpected value ({})",
                root.loc(),
                v
            ))
        })?;
    }
    ctx.description = props.get("description").unwrap_or_default().to_string();
    for attr in root.unknown_attrs(SCHEMA_PROPS) {
        diag.warn(root, format!("Unknown attribute \"{}\" of <schema>.", attr));
    }
    Ok(ctx)
}

/// Fields given under `<fields>` or directly as field elements, but not both.
fn field_nodes(node: &XmlNode) -> Result<Vec<&XmlNode>> {
    let direct: Vec<&XmlNode> = node
        .children
        .iter()
        .filter(|c| Kind::from_tag(&c.name).is_some())
        .collect();
    let groups: Vec<&XmlNode> = node.children_named("fields").collect();
    match groups.as_slice() {
        [] => Ok(direct),
        [group] if direct.is_empty() => Ok(group.children.iter().collect()),
        _ => Err(SchemaError::InvalidStructure(format!(
            "{}: fields of <{}> must be listed either inside a single <fields> or directly",
            node.loc(),
            node.name
        ))),
    }
}

fn check_unique(fields: &[Field], node: &XmlNode) -> Result<()> {
    for (i, f) in fields.iter().enumerate() {
        if fields[..i].iter().any(|other| other.name() == f.name()) {
            return Err(SchemaError::DuplicateMemberName(format!(
                "{}: field \"{}\" defined more than once in <{}>",
                node.loc(),
                f.name(),
                node.name
            )));
        }
    }
    Ok(())
}

fn verify_all(fields: &[Field], env: &ParseEnv<'_>) -> Result<()> {
    for f in fields {
        f.verify_siblings(fields, env)?;
    }
    Ok(())
}

/// The set of loaded schemas with their shared field registry and diagnostics.
#[derive(Debug, Default)]
pub struct Protocol {
    schemas: Vec<Schema>,
    registry: FieldRegistry,
    diagnostics: Diagnostics,
}

impl Protocol {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a single document into a fresh protocol.
    pub fn parse_str(src: &str) -> Result<Protocol> {
        let mut protocol = Protocol::new();
        protocol.load_str(src)?;
        Ok(protocol)
    }

    pub fn parse_file(path: impl AsRef<Path>) -> Result<Protocol> {
        let mut protocol = Protocol::new();
        protocol.load_file(path)?;
        Ok(protocol)
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let src = std::fs::read_to_string(path.as_ref())?;
        tracing::info!(path = %path.as_ref().display(), "loading schema");
        self.load_str(&src)
    }

    /// Load one more schema document; errors are also recorded as diagnostics.
    pub fn load_str(&mut self, src: &str) -> Result<()> {
        let result = self.load_document(src);
        if let Err(err) = &result {
            self.diagnostics.error(err);
        }
        result
    }

    fn load_document(&mut self, src: &str) -> Result<()> {
        let root = xml::parse_document(src)?;
        let ctx = read_context(&root, &self.diagnostics)?;
        if !self.schemas.is_empty() && !ctx.supports(Feature::MultiSchema) {
            return Err(SchemaError::UnsupportedFeature(format!(
                "{}: multiple schemas are not supported for DSL version {}",
                root.loc(),
                ctx.dsl_version
            )));
        }
        if self.schema(&ctx.name).is_some() {
            return Err(SchemaError::InvalidStructure(format!(
                "{}: schema \"{}\" has already been loaded",
                root.loc(),
                ctx.name
            )));
        }

        let mut layout = Layout::default();
        collect(&root, "", &mut layout, &self.diagnostics)?;

        self.load_fields(&ctx, &layout.fields)?;
        let interfaces = self.load_interfaces(&ctx, &layout.interfaces)?;
        let messages = self.load_messages(&ctx, &interfaces, &layout.messages)?;
        self.diagnostics.info(format!(
            "schema \"{}\": {} fields, {} interfaces, {} messages",
            ctx.name,
            self.registry.fields_of(&ctx.name).count(),
            interfaces.len(),
            messages.len()
        ));
        self.schemas.push(Schema {
            ctx,
            interfaces,
            messages,
            namespaces: layout.namespaces,
        });
        Ok(())
    }

    /// Namespace level fields; independent fields keep being processed after a failure.
    fn load_fields(&mut self, ctx: &SchemaContext, nodes: &[(String, &XmlNode)]) -> Result<()> {
        let mut first_error = None;
        for (ns, node) in nodes {
            let built = {
                let env = ParseEnv::new(ctx, &self.registry, &[], &self.diagnostics);
                Field::from_node(node, env, Parent::namespace())
            };
            let registered = built.and_then(|field| {
                let qualified = qualify(ns, field.name());
                self.registry.insert(&ctx.name, &qualified, field).map(|_| ())
            });
            // The first failure is recorded by `load_str`.
            if let Err(err) = registered {
                if first_error.is_some() {
                    self.diagnostics.error(&err);
                } else {
                    first_error = Some(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn load_interfaces(&self, ctx: &SchemaContext, nodes: &[(String, &XmlNode)]) -> Result<Vec<Interface>> {
        let mut interfaces: Vec<Interface> = Vec::new();
        for (ns, node) in nodes {
            let props = node.props(&["description"])?;
            let mut iface = Interface {
                line: node.line,
                ..Interface::default()
            };

            if let Some(source) = props.single(node, "reuse")? {
                let found = self.find_interface(ctx, &interfaces, source).ok_or_else(|| {
                    SchemaError::InvalidReference(format!(
                        "{}: the interface \"{}\" hasn't been recorded yet",
                        node.loc(),
                        source
                    ))
                })?;
                iface.fields = found.fields.clone();
                iface.description = found.description.clone();
                iface.reused_from = Some(source.to_string());
            }
            if let Some(source) = props.single(node, "copyFieldsFrom")? {
                if !iface.fields.is_empty() {
                    return Err(SchemaError::InvalidStructure(format!(
                        "{}: copying fields from multiple sources is not supported",
                        node.loc()
                    )));
                }
                iface.fields = self.copy_fields_from(ctx, &interfaces, &[], source, node)?;
            }

            iface.name = props.required(node, "name")?.to_string();
            if !common::is_valid_name(&iface.name) {
                return Err(SchemaError::InvalidProperty(format!(
                    "{}: invalid interface name \"{}\"",
                    node.loc(),
                    iface.name
                )));
            }
            iface.qualified_name = qualify(ns, &iface.name);
            if interfaces.iter().any(|i| i.qualified_name == iface.qualified_name) {
                return Err(SchemaError::DuplicateMemberName(format!(
                    "{}: interface \"{}\" has already been defined",
                    node.loc(),
                    iface.qualified_name
                )));
            }
            if let Some(v) = props.single(node, "description")? {
                iface.description = v.to_string();
            }

            let env = ParseEnv::new(ctx, &self.registry, &[], &self.diagnostics);
            for field_node in field_nodes(node)? {
                iface
                    .fields
                    .push(Field::from_node(field_node, env, Parent::interface())?);
            }
            check_unique(&iface.fields, node)?;
            verify_all(&iface.fields, &env)?;
            for attr in node.unknown_attrs(INTERFACE_PROPS) {
                self.diagnostics
                    .warn(node, format!("Unknown attribute \"{}\" of <interface>.", attr));
            }
            self.diagnostics
                .debug(node, format!("interface \"{}\" built", iface.qualified_name));
            interfaces.push(iface);
        }
        Ok(interfaces)
    }

    fn load_messages(
        &self,
        ctx: &SchemaContext,
        interfaces: &[Interface],
        nodes: &[(String, &XmlNode)],
    ) -> Result<Vec<Message>> {
        let env = ParseEnv::new(ctx, &self.registry, interfaces, &self.diagnostics);
        let mut messages: Vec<Message> = Vec::new();
        for (ns, node) in nodes {
            let msg = self.load_message(env, &messages, interfaces, ns, node)?;
            if messages.iter().any(|m| m.qualified_name == msg.qualified_name) {
                return Err(SchemaError::DuplicateMemberName(format!(
                    "{}: message \"{}\" has already been defined",
                    node.loc(),
                    msg.qualified_name
                )));
            }
            if !ctx.non_unique_msg_id_allowed {
                if let Some(other) = messages.iter().find(|m| m.id == msg.id) {
                    return Err(SchemaError::InvalidProperty(format!(
                        "{}: message id {} is already used by \"{}\"",
                        node.loc(),
                        msg.id,
                        other.qualified_name
                    )));
                }
            }
            messages.push(msg);
        }
        messages.sort_by_key(|m| m.id);
        Ok(messages)
    }

    fn load_message(
        &self,
        env: ParseEnv<'_>,
        messages: &[Message],
        interfaces: &[Interface],
        ns: &str,
        node: &XmlNode,
    ) -> Result<Message> {
        let ctx = env.ctx;
        let props = node.props(&["description", "displayName"])?;
        let unexpected = |prop: &str, v: &str| {
            SchemaError::InvalidProperty(format!(
                "{}: property \"{}\" has unexpected value ({})",
                node.loc(),
                prop,
                v
            ))
        };

        let mut msg = Message {
            name: String::new(),
            qualified_name: String::new(),
            display_name: String::new(),
            description: String::new(),
            id: 0,
            since_version: 0,
            deprecated_since: NOT_YET_DEPRECATED,
            removed: false,
            fields: Vec::new(),
            reused_from: None,
            copy_code_from: None,
            line: node.line,
        };

        if let Some(source) = props.single(node, "reuse")? {
            if ctx.supports(Feature::MessageReuse) {
                let found = self.find_message(ctx, messages, source).ok_or_else(|| {
                    SchemaError::InvalidReference(format!(
                        "{}: the message \"{}\" hasn't been recorded yet",
                        node.loc(),
                        source
                    ))
                })?;
                msg = Message {
                    name: String::new(),
                    qualified_name: String::new(),
                    line: node.line,
                    reused_from: Some(source.to_string()),
                    copy_code_from: None,
                    ..found.clone()
                };
                if let Some(v) = props.single(node, "reuseCode")? {
                    if common::parse_bool(v).ok_or_else(|| unexpected("reuseCode", v))? {
                        msg.copy_code_from = Some(source.to_string());
                    }
                }
            } else {
                env.warn(
                    node,
                    format!(
                        "Property \"reuse\" is not supported for <message> in DSL version {}, ignored.",
                        ctx.dsl_version
                    ),
                );
            }
        }

        if let Some(v) = props.single(node, "name")? {
            msg.name = v.to_string();
        }
        if msg.name.is_empty() {
            props.required(node, "name")?;
        }
        if !common::is_valid_name(&msg.name) {
            return Err(unexpected("name", &msg.name));
        }
        msg.qualified_name = qualify(ns, &msg.name);
        if let Some(v) = props.single(node, "displayName")? {
            msg.display_name = v.to_string();
        }
        if let Some(v) = props.single(node, "description")? {
            msg.description = v.to_string();
        }

        let id = props.required(node, "id")?;
        msg.id = common::parse_i128(id)
            .or_else(|| {
                if common::is_valid_ref_name(id) {
                    self.registry.str_to_numeric(&ctx.name, id)
                } else {
                    None
                }
            })
            .ok_or_else(|| unexpected("id", id))?;

        let (since, deprecated) = ctx.read_versions(node, &props, 0, NOT_YET_DEPRECATED)?;
        msg.since_version = since;
        msg.deprecated_since = deprecated;
        if let Some(v) = props.single(node, "removed")? {
            let removed = common::parse_bool(v).ok_or_else(|| unexpected("removed", v))?;
            if removed && deprecated == NOT_YET_DEPRECATED {
                env.warn(node, "Property \"removed\" is ignored for a message that is not deprecated.");
            } else {
                msg.removed = removed;
            }
        }

        if let Some(source) = props.single(node, "copyFieldsFrom")? {
            if msg.reused_from.is_some() {
                return Err(SchemaError::InvalidStructure(format!(
                    "{}: copying fields from multiple sources is not supported",
                    node.loc()
                )));
            }
            msg.fields = self.copy_fields_from(ctx, interfaces, messages, source, node)?;
        }
        reuse::adopt_members(&mut msg.fields, msg.since_version);

        let parent = Parent::message(msg.since_version, msg.deprecated_since);
        for elem in node.children_named("replace") {
            if !ctx.supports(Feature::MemberReplace) {
                env.warn(elem, "<replace> is not supported for this DSL version, ignored.");
                continue;
            }
            let replacements = elem
                .children
                .iter()
                .map(|n| Field::from_node(n, env, parent))
                .collect::<Result<Vec<_>>>()?;
            reuse::replace_members(&mut msg.fields, replacements, &node.loc())?;
        }
        for field_node in field_nodes(node)? {
            msg.fields.push(Field::from_node(field_node, env, parent)?);
        }
        check_unique(&msg.fields, node)?;
        verify_all(&msg.fields, &env)?;

        if let Some(v) = props.single(node, "validateMinLength")? {
            if ctx.property_supported("validateMinLength") {
                let expected = common::parse_uint(v)
                    .and_then(|n| usize::try_from(n).ok())
                    .ok_or_else(|| unexpected("validateMinLength", v))?;
                if expected != msg.min_length() {
                    return Err(SchemaError::InvalidProperty(format!(
                        "{}: invalid minimal length of message \"{}\", expected {}, actual {}",
                        node.loc(),
                        msg.name,
                        expected,
                        msg.min_length()
                    )));
                }
            } else {
                env.warn(node, "Property \"validateMinLength\" is not supported for this DSL version, ignored.");
            }
        }
        for attr in node.unknown_attrs(MESSAGE_PROPS) {
            env.warn(node, format!("Unknown attribute \"{}\" of <message>.", attr));
        }
        env.diag
            .debug(node, format!("message \"{}\" ({}) built", msg.qualified_name, msg.id));
        Ok(msg)
    }

    /// Fields of a message, interface or bundle named by `source`.
    fn copy_fields_from(
        &self,
        ctx: &SchemaContext,
        interfaces: &[Interface],
        messages: &[Message],
        source: &str,
        node: &XmlNode,
    ) -> Result<Vec<Field>> {
        if let Some(msg) = self.find_message(ctx, messages, source) {
            return Ok(msg.fields.clone());
        }
        if let Some(iface) = self.find_interface(ctx, interfaces, source) {
            return Ok(iface.fields.clone());
        }
        match self.registry.find(&ctx.name, source) {
            Some(handle) => match &handle.field().kind {
                FieldKind::Bundle(b) => Ok(b.members.clone()),
                _ => Err(SchemaError::InvalidReference(format!(
                    "{}: \"{}\" is not a <bundle>",
                    node.loc(),
                    source
                ))),
            },
            None => Err(SchemaError::InvalidReference(format!(
                "{}: invalid reference to other message, interface or bundle \"{}\"",
                node.loc(),
                source
            ))),
        }
    }

    /// `ns.Name` in the schema being loaded, or `@Schema.ns.Name` in an earlier one.
    fn find_message<'a>(&'a self, ctx: &SchemaContext, current: &'a [Message], name: &str) -> Option<&'a Message> {
        let parsed = ExternalRef::parse(name)?;
        match parsed.schema.as_deref() {
            Some(schema) if schema != ctx.name => self.schema(schema)?.message(&parsed.path),
            _ => current.iter().find(|m| m.qualified_name == parsed.path),
        }
    }

    fn find_interface<'a>(
        &'a self,
        ctx: &SchemaContext,
        current: &'a [Interface],
        name: &str,
    ) -> Option<&'a Interface> {
        let parsed = ExternalRef::parse(name)?;
        match parsed.schema.as_deref() {
            Some(schema) if schema != ctx.name => self.schema(schema)?.interface(&parsed.path),
            _ => current.iter().find(|i| i.qualified_name == parsed.path),
        }
    }

    pub fn schemas(&self) -> &[Schema] {
        &self.schemas
    }

    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.schemas.iter().find(|s| s.ctx.name == name)
    }

    /// The most recently loaded schema; relative references resolve against it.
    pub fn current_schema(&self) -> Option<&Schema> {
        self.schemas.last()
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Registered field by external name (`ns.Name` or `@Schema.ns.Name`).
    pub fn field(&self, ext_ref: &str) -> Option<&Field> {
        let schema = self.current_schema()?.name();
        let handle = self.registry.find(schema, ext_ref)?;
        self.registry.get(handle.id())
    }

    /// Numeric value of `ns.Field.Value` style references.
    pub fn str_to_numeric(&self, ext_ref: &str) -> Option<i128> {
        let schema = self.current_schema()?.name();
        self.registry.str_to_numeric(schema, ext_ref)
    }
}
