//! Arena of top-level fields addressed by stable ids and external names.
//!
//! Fields are stored once, immutable, behind `Arc`, so a field elsewhere in the model (a `ref`,
//! an external length prefix, a list element) holds a [`FieldHandle`] instead of a copy.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, SchemaError};
use crate::field::Field;
use crate::parser;

/// Dot-qualified name of a schema element, optionally addressed to another schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalRef {
    pub schema: Option<String>,
    pub path: String,
}

impl ExternalRef {
    pub fn parse(text: &str) -> Option<ExternalRef> {
        parser::parse_external_ref(text).ok()
    }
}

/// Stable index of a field in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(usize);

impl FieldId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Non-owning link to a registered field.
#[derive(Debug, Clone)]
pub struct FieldHandle {
    id: FieldId,
    ext_ref: String,
    target: Arc<Field>,
}

impl FieldHandle {
    pub fn id(&self) -> FieldId {
        self.id
    }

    /// The reference text the handle was created from.
    pub fn ext_ref(&self) -> &str {
        &self.ext_ref
    }

    pub fn field(&self) -> &Field {
        &self.target
    }
}

#[derive(Debug, Default)]
pub struct FieldRegistry {
    fields: Vec<Arc<Field>>,
    names: HashMap<(String, String), FieldId>,
    order: Vec<(String, String)>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `field` as `schema`:`qualified_name`.
    pub fn insert(&mut self, schema: &str, qualified_name: &str, field: Field) -> Result<FieldId> {
        let key = (schema.to_string(), qualified_name.to_string());
        if self.names.contains_key(&key) {
            return Err(SchemaError::DuplicateMemberName(format!(
                "line {}: field \"{}\" has already been defined",
                field.common.line, qualified_name
            )));
        }
        let id = FieldId(self.fields.len());
        self.fields.push(Arc::new(field));
        self.names.insert(key.clone(), id);
        self.order.push(key);
        Ok(id)
    }

    pub fn get(&self, id: FieldId) -> Option<&Field> {
        self.fields.get(id.0).map(|f| f.as_ref())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Registered fields of `schema` with their qualified names, in registration order.
    pub fn fields_of<'a>(&'a self, schema: &'a str) -> impl Iterator<Item = (&'a str, &'a Field)> + 'a {
        self.order
            .iter()
            .zip(self.fields.iter())
            .filter(move |((s, _), _)| s == schema)
            .map(|((_, name), field)| (name.as_str(), field.as_ref()))
    }

    fn lookup(&self, current_schema: &str, schema: Option<&str>, path: &str) -> Option<FieldId> {
        let key = (schema.unwrap_or(current_schema).to_string(), path.to_string());
        self.names.get(&key).copied()
    }

    /// Find a field by its external name, relative to `current_schema` unless `@`-prefixed.
    pub fn find(&self, current_schema: &str, ext_ref: &str) -> Option<FieldHandle> {
        let parsed = ExternalRef::parse(ext_ref)?;
        let id = self.lookup(current_schema, parsed.schema.as_deref(), &parsed.path)?;
        Some(FieldHandle {
            id,
            ext_ref: ext_ref.to_string(),
            target: Arc::clone(&self.fields[id.0]),
        })
    }

    /// Split `ext_ref` into the longest prefix naming a field and the remaining inner path.
    fn split_value_ref<'a>(&self, current_schema: &str, ext_ref: &'a str) -> Option<(FieldHandle, &'a str)> {
        let parsed = ExternalRef::parse(ext_ref)?;
        let path = parsed.path.as_str();
        let mut cut = path.len();
        loop {
            let candidate = &path[..cut];
            if let Some(id) = self.lookup(current_schema, parsed.schema.as_deref(), candidate) {
                let rest_start = ext_ref.len() - (path.len() - cut);
                let rest = ext_ref[rest_start..].trim_start_matches('.');
                let handle = FieldHandle {
                    id,
                    ext_ref: candidate.to_string(),
                    target: Arc::clone(&self.fields[id.0]),
                };
                return Some((handle, rest));
            }
            cut = candidate.rfind('.')?;
        }
    }

    /// Numeric value designated by `ns.Field.Value` style references.
    pub fn str_to_numeric(&self, current_schema: &str, ext_ref: &str) -> Option<i128> {
        let (handle, rest) = self.split_value_ref(current_schema, ext_ref)?;
        handle.field().str_to_numeric(rest)
    }

    pub fn str_to_fp(&self, current_schema: &str, ext_ref: &str) -> Option<f64> {
        let (handle, rest) = self.split_value_ref(current_schema, ext_ref)?;
        handle.field().str_to_fp(rest)
    }

    pub fn str_to_bool(&self, current_schema: &str, ext_ref: &str) -> Option<bool> {
        let (handle, rest) = self.split_value_ref(current_schema, ext_ref)?;
        handle.field().str_to_bool(rest)
    }

    pub fn str_to_string(&self, current_schema: &str, ext_ref: &str) -> Option<String> {
        let (handle, rest) = self.split_value_ref(current_schema, ext_ref)?;
        handle.field().str_to_string(rest)
    }

    pub fn str_to_data(&self, current_schema: &str, ext_ref: &str) -> Option<Vec<u8>> {
        let (handle, rest) = self.split_value_ref(current_schema, ext_ref)?;
        handle.field().str_to_data(rest)
    }
}
