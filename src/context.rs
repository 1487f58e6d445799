//! Per-schema settings, feature gates and the diagnostics collector.

use std::cell::RefCell;

use crate::common::{self, Endian, NOT_YET_DEPRECATED};
use crate::error::{Result, SchemaError};
use crate::field::Kind;
use crate::registry::FieldRegistry;
use crate::schema::Interface;
use crate::xml::{Props, XmlNode};

/// Language constructs that only exist from a given DSL version onwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    ValueReference,
    SemanticTypeLength,
    NonUniqueSpecials,
    Alias,
    Override,
    NonIntSemanticLength,
    MemberReplace,
    MultiSchema,
    InterfaceRef,
    SizeCompInCond,
    ExistsCheckInCond,
    ValidValueInStringData,
    ValidCondInComposite,
    MessageReuse,
}

impl Feature {
    pub fn min_dsl_version(self) -> u32 {
        match self {
            Feature::ValueReference | Feature::SemanticTypeLength | Feature::NonUniqueSpecials => 2,
            Feature::Alias => 3,
            Feature::Override => 4,
            Feature::NonIntSemanticLength | Feature::MemberReplace | Feature::MultiSchema => 5,
            Feature::InterfaceRef | Feature::SizeCompInCond | Feature::ExistsCheckInCond => 6,
            Feature::ValidValueInStringData
            | Feature::ValidCondInComposite
            | Feature::MessageReuse => 7,
        }
    }
}

/// Settings of the schema document currently being processed.
#[derive(Debug, Clone)]
pub struct SchemaContext {
    pub name: String,
    /// 0 selects the newest DSL with every feature enabled.
    pub dsl_version: u32,
    pub version: u32,
    pub endian: Endian,
    pub non_unique_msg_id_allowed: bool,
    pub description: String,
}

impl Default for SchemaContext {
    fn default() -> Self {
        SchemaContext {
            name: String::new(),
            dsl_version: 0,
            version: 0,
            endian: Endian::Little,
            non_unique_msg_id_allowed: false,
            description: String::new(),
        }
    }
}

impl SchemaContext {
    pub fn new(name: &str, dsl_version: u32, version: u32) -> Self {
        SchemaContext {
            name: name.to_string(),
            dsl_version,
            version,
            ..Default::default()
        }
    }

    pub fn supports(&self, feature: Feature) -> bool {
        self.dsl_version == 0 || feature.min_dsl_version() <= self.dsl_version
    }

    /// Whether a property introduced after DSL v1 may be used.
    pub fn property_supported(&self, prop: &str) -> bool {
        let min = match prop {
            "validateMinLength" | "defaultValidValue" | "availableLengthLimit" => 4,
            "valueOverride" | "readOverride" | "writeOverride" | "refreshOverride"
            | "lengthOverride" | "validOverride" | "nameOverride" => 4,
            "copyCodeFrom" | "termSuffix" | "missingOnReadFail" | "missingOnInvalid"
            | "reuseCode" => 5,
            "validCond" | "copyValidCondFrom" => 6,
            "fixedValue" => 7,
            _ => 0,
        };
        self.dsl_version == 0 || min <= self.dsl_version
    }

    pub fn property_deprecated(&self, prop: &str) -> bool {
        let since = match prop {
            "displayReadOnly" | "displayHidden" | "displaySpecials" => 7,
            _ => return false,
        };
        self.dsl_version == 0 || since <= self.dsl_version
    }

    /// Validate a `[since, deprecated)` window against the schema and the enclosing window.
    pub fn check_versions(
        &self,
        node: &XmlNode,
        since: u32,
        deprecated: u32,
        parent_since: u32,
        parent_deprecated: u32,
    ) -> Result<()> {
        let fail = |msg: String| Err(SchemaError::InvalidVersion(format!("{}: {}", node.loc(), msg)));
        if self.version < since {
            return fail(format!(
                "sinceVersion ({}) cannot be greater than schema version ({})",
                since, self.version
            ));
        }
        if since < parent_since {
            return fail(format!("sinceVersion ({}) cannot be less than {}", since, parent_since));
        }
        if parent_deprecated <= since {
            return fail(format!("sinceVersion ({}) must be less than {}", since, parent_deprecated));
        }
        if parent_deprecated < deprecated {
            return fail(format!(
                "deprecated ({}) cannot be greater than {}",
                deprecated, parent_deprecated
            ));
        }
        if deprecated <= since {
            return fail(format!(
                "deprecated ({}) must be greater than sinceVersion ({})",
                deprecated, since
            ));
        }
        if deprecated < NOT_YET_DEPRECATED && self.version < deprecated {
            return fail(format!(
                "deprecated ({}) cannot be greater than schema version ({})",
                deprecated, self.version
            ));
        }
        Ok(())
    }

    /// Read `sinceVersion`/`deprecated` from `props`, defaulting to the parent window.
    pub fn read_versions(
        &self,
        node: &XmlNode,
        props: &Props,
        parent_since: u32,
        parent_deprecated: u32,
    ) -> Result<(u32, u32)> {
        let read = |prop: &str, default: u32| -> Result<u32> {
            match props.single(node, prop)? {
                None => Ok(default),
                Some(v) => common::parse_unsigned(v).ok_or_else(|| {
                    SchemaError::InvalidProperty(format!(
                        "{}: property \"{}\" has unexpected value ({})",
                        node.loc(),
                        prop,
                        v
                    ))
                }),
            }
        };
        let since = read("sinceVersion", parent_since)?;
        let deprecated = read("deprecated", parent_deprecated)?;
        self.check_versions(node, since, deprecated, parent_since, parent_deprecated)?;
        Ok((since, deprecated))
    }
}

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
}

/// A single diagnostic with its source line, when known.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: Level,
    pub line: Option<usize>,
    pub message: String,
}

/// Collects diagnostics during a build and mirrors them to `tracing`.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: RefCell<Vec<Diagnostic>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, level: Level, line: Option<usize>, message: String) {
        match level {
            Level::Debug => tracing::debug!(line, "{}", message),
            Level::Info => tracing::info!(line, "{}", message),
            Level::Warning => tracing::warn!(line, "{}", message),
            Level::Error => tracing::error!(line, "{}", message),
        }
        self.entries.borrow_mut().push(Diagnostic {
            level,
            line,
            message,
        });
    }

    pub fn warn(&self, node: &XmlNode, message: impl Into<String>) {
        self.record(Level::Warning, Some(node.line), message.into());
    }

    pub fn debug(&self, node: &XmlNode, message: impl Into<String>) {
        self.record(Level::Debug, Some(node.line), message.into());
    }

    pub fn info(&self, message: impl Into<String>) {
        self.record(Level::Info, None, message.into());
    }

    pub fn error(&self, err: &SchemaError) {
        self.record(Level::Error, None, err.to_string());
    }

    pub fn has_errors(&self) -> bool {
        self.entries.borrow().iter().any(|d| d.level == Level::Error)
    }

    /// Copy of everything recorded so far.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.borrow().clone()
    }

    /// Messages recorded at `level`.
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .filter(|d| d.level == level)
            .map(|d| d.message.clone())
            .collect()
    }

    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries.into_inner()
    }
}

/// What kind of construct directly contains an element being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentKind {
    Namespace,
    Interface,
    Message,
    Field(Kind),
}

/// Enclosing construct with its version window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parent {
    pub kind: ParentKind,
    pub since_version: u32,
    pub deprecated_since: u32,
}

impl Parent {
    pub fn namespace() -> Self {
        Parent {
            kind: ParentKind::Namespace,
            since_version: 0,
            deprecated_since: NOT_YET_DEPRECATED,
        }
    }

    pub fn interface() -> Self {
        Parent {
            kind: ParentKind::Interface,
            ..Parent::namespace()
        }
    }

    pub fn message(since_version: u32, deprecated_since: u32) -> Self {
        Parent {
            kind: ParentKind::Message,
            since_version,
            deprecated_since,
        }
    }

    pub fn field(kind: Kind, since_version: u32, deprecated_since: u32) -> Self {
        Parent {
            kind: ParentKind::Field(kind),
            since_version,
            deprecated_since,
        }
    }

    /// Version attributes only make sense inside fields and messages.
    pub fn is_versioned(&self) -> bool {
        matches!(self.kind, ParentKind::Field(_) | ParentKind::Message)
    }

    pub fn is_bitfield(&self) -> bool {
        self.kind == ParentKind::Field(Kind::Bitfield)
    }

    pub fn is_bundle_or_message(&self) -> bool {
        matches!(
            self.kind,
            ParentKind::Message | ParentKind::Field(Kind::Bundle)
        )
    }
}

/// Everything a field needs from its surroundings while it is being built.
#[derive(Clone, Copy)]
pub struct ParseEnv<'a> {
    pub ctx: &'a SchemaContext,
    pub registry: &'a FieldRegistry,
    pub interfaces: &'a [Interface],
    pub diag: &'a Diagnostics,
}

impl<'a> ParseEnv<'a> {
    pub fn new(
        ctx: &'a SchemaContext,
        registry: &'a FieldRegistry,
        interfaces: &'a [Interface],
        diag: &'a Diagnostics,
    ) -> Self {
        ParseEnv {
            ctx,
            registry,
            interfaces,
            diag,
        }
    }

    pub fn warn(&self, node: &XmlNode, message: impl Into<String>) {
        self.diag.warn(node, message);
    }
}
