//! # protoschema — semantic model for XML binary-protocol schemas
//!
//! Loads schema documents describing binary messages (fields, interfaces, messages, namespaces)
//! and builds a validated, fully resolved model a code generator can walk.
//!
//! ## Building blocks
//!
//! - **Fields**: twelve kinds (`int`, `float`, `enum`, `set`, `bitfield`, `bundle`, `string`,
//!   `data`, `list`, `ref`, `optional`, `variant`) with their lengths and valid values
//! - **References**: `$member.path`, `%interface.path`, `^External.value` with `#`/`?`
//!   modifiers for size and existence queries
//! - **Conditions**: `<optional>` presence and `validCond` expressions checked against siblings
//! - **Ranges**: valid values merged per version window
//! - **Reuse**: `reuse`, `copyFieldsFrom` and `<replace>` inheritance
//!
//! ## Example schema
//!
//! ```text
//! <schema name="demo" version="2" dslVersion="7">
//!     <fields>
//!         <enum name="MsgId" type="uint8">
//!             <validValue name="Status" val="1" />
//!         </enum>
//!     </fields>
//!     <message name="Status" id="MsgId.Status">
//!         <int name="status" type="uint8" />
//!         <optional name="detail" cond="$status = 5">
//!             <string name="detail" length="8" />
//!         </optional>
//!     </message>
//! </schema>
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! let protocol = protoschema::Protocol::parse_file("demo.xml")?;
//! for msg in &protocol.schemas()[0].messages {
//!     println!("{} min={}", msg.name, msg.min_length());
//! }
//! # Ok::<(), protoschema::SchemaError>(())
//! ```

pub mod common;
pub mod cond;
pub mod context;
pub mod error;
pub mod field;
pub mod parser;
pub mod range;
pub mod reference;
pub mod registry;
pub mod reuse;
pub mod schema;
pub mod xml;

pub use cond::{CmpOp, Cond, CondExpr, Operand};
pub use context::{Diagnostic, Diagnostics, Feature, Level, Parent, ParseEnv, SchemaContext};
pub use error::{Result, SchemaError};
pub use field::{Field, FieldKind, Kind};
pub use range::{merge, MergeMode, MergePolicy, NumericOrFp, RangeInterval, ValidRanges};
pub use reference::{RefDescriptor, RefKind};
pub use registry::{ExternalRef, FieldHandle, FieldId, FieldRegistry};
pub use schema::{Interface, Message, Protocol, Schema};
