//! `<ref>`: an alias of a field defined elsewhere in the schema.

use crate::common::SemanticType;
use crate::error::{Result, SchemaError};
use crate::registry::FieldHandle;

use super::{Field, FieldCommon, FieldParser};

pub(super) const PROPS: &[&str] = &["field", "bitLength"];

pub(super) const CHILDREN: &[&str] = &[];

#[derive(Debug, Clone, Default)]
pub struct RefField {
    target: Option<FieldHandle>,
    /// Width inside a `<bitfield>`; 0 means the target's own width.
    pub bit_length: usize,
}

impl RefField {
    pub fn target(&self) -> Option<&Field> {
        self.target.as_ref().map(FieldHandle::field)
    }

    /// External name of the referenced field.
    pub fn target_ref(&self) -> Option<&str> {
        self.target.as_ref().map(FieldHandle::ext_ref)
    }

    pub(super) fn parse(&mut self, p: &FieldParser<'_>, common: &mut FieldCommon) -> Result<()> {
        if let Some(ext) = p.prop("field")? {
            let handle = p.env.registry.find(&p.env.ctx.name, ext).ok_or_else(|| {
                SchemaError::InvalidReference(format!(
                    "{}: field \"{}\" referenced by <ref> is not defined",
                    p.loc(),
                    ext
                ))
            })?;
            self.target = Some(handle);
        }
        let Some(target) = self.target() else {
            return p.required("field").map(|_| ());
        };

        if common.name.is_empty() {
            common.name = target.name().to_string();
        }
        if common.display_name.is_empty() {
            common.display_name = target.common.display_name.clone();
        }
        if common.semantic_type == SemanticType::None
            && target.semantic_type() != SemanticType::MessageId
        {
            common.semantic_type = target.semantic_type();
        }

        let target_len = target.max_length();
        let var_length = target.min_length() != target_len;
        self.bit_length = super::int::parse_bit_length(p, var_length, target_len, self.bit_length)?;
        Ok(())
    }
}
