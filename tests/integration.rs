//! Integration tests: whole schema documents, multiple schemas, files and diagnostics.

use std::io::Write;

use protoschema::{FieldKind, Level, Protocol, SchemaError};

const DEMO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<schema name="demo" version="3" dslVersion="7" endian="big">
    <description>Demo protocol</description>
    <fields>
        <enum name="MsgId" type="uint8" semanticType="messageId">
            <validValue name="Ping" val="1" />
            <validValue name="Status" val="2" />
            <validValue name="Data" val="3" sinceVersion="2" />
        </enum>
        <int name="Length" type="uint16" semanticType="length" />
        <string name="Name">
            <lengthPrefix><int name="len" type="uint8" /></lengthPrefix>
        </string>
    </fields>
    <interface name="Common">
        <int name="version" type="uint8" semanticType="version" />
    </interface>
    <frame name="Frame">
        <size name="size"><int name="s" type="uint16" /></size>
        <id name="id" field="MsgId" />
        <payload name="data" />
    </frame>
    <message name="Status" id="MsgId.Status">
        <set name="flags" length="1">
            <bit name="hasName" idx="0" />
            <bit name="hasCode" idx="1" sinceVersion="2" />
        </set>
        <optional name="name" cond="$flags.hasName" field="Name" />
        <optional name="code" cond="%version >= 2" sinceVersion="2">
            <int name="code" type="uint32" />
        </optional>
    </message>
    <message name="Ping" id="MsgId.Ping" />
    <message name="Data" id="MsgId.Data" sinceVersion="2">
        <data name="payload" />
    </message>
</schema>
"#;

fn wrap(name: &str, dsl: u32, body: &str) -> String {
    format!(
        r#"<schema name="{}" version="3" dslVersion="{}">{}</schema>"#,
        name, dsl, body
    )
}

// ==================== Full document ====================

#[test]
fn demo_schema_loads() {
    let p = Protocol::parse_str(DEMO).expect("load");
    let schema = &p.schemas()[0];
    assert_eq!(schema.name(), "demo");
    assert_eq!(schema.ctx.version, 3);
    assert_eq!(schema.ctx.description, "Demo protocol");
    assert_eq!(schema.interfaces.len(), 1);

    let ids: Vec<_> = schema.messages.iter().map(|m| (m.name.as_str(), m.id)).collect();
    assert_eq!(ids, vec![("Ping", 1), ("Status", 2), ("Data", 3)]);

    let status = schema.message("Status").expect("Status");
    assert_eq!(status.min_length(), 1);
    assert_eq!(status.max_length(), 1 + 256 + 4);
    assert!(matches!(
        status.field("name").map(|f| &f.kind),
        Some(FieldKind::Optional(_))
    ));

    let data = schema.message("Data").expect("Data");
    assert_eq!(data.since_version, 2);
    assert_eq!(data.fields[0].common.since_version, 2);
    assert!(!p.diagnostics().has_errors());
}

#[test]
fn frames_are_reported_at_debug_level_only() {
    let p = Protocol::parse_str(DEMO).expect("load");
    let diag = p.diagnostics();
    assert!(diag
        .messages(Level::Debug)
        .iter()
        .any(|m| m.contains("<frame> is not processed")));
    assert!(diag.messages(Level::Warning).is_empty());
}

#[test]
fn message_since_version_above_schema_version() {
    let err = Protocol::parse_str(&wrap(
        "test",
        7,
        r#"<message name="M" id="1" sinceVersion="4" />"#,
    ))
    .unwrap_err();
    assert!(matches!(err, SchemaError::InvalidVersion(_)));
}

#[test]
fn messages_grouped_and_namespaced() {
    let p = Protocol::parse_str(&wrap(
        "test",
        7,
        r#"
        <messages>
            <message name="A" id="2"><int name="a" type="uint8" /></message>
        </messages>
        <ns name="sub">
            <message name="A" id="1"><int name="a" type="uint16" /></message>
        </ns>
        "#,
    ))
    .expect("load");
    let schema = &p.schemas()[0];
    assert_eq!(schema.namespaces, vec!["sub".to_string()]);
    assert_eq!(schema.messages[0].qualified_name, "sub.A");
    assert_eq!(schema.message("A").map(|m| m.id), Some(2));
}

// ==================== Message ids ====================

#[test]
fn duplicate_message_ids() {
    let body = r#"
        <message name="A" id="1" />
        <message name="B" id="1" />
    "#;
    let err = Protocol::parse_str(&wrap("test", 7, body)).unwrap_err();
    assert!(matches!(err, SchemaError::InvalidProperty(_)));

    let relaxed = format!(
        r#"<schema name="test" version="3" dslVersion="7" nonUniqueMsgIdAllowed="true">{}</schema>"#,
        body
    );
    let p = Protocol::parse_str(&relaxed).expect("load");
    assert_eq!(p.schemas()[0].messages.len(), 2);
}

#[test]
fn duplicate_message_names() {
    let err = Protocol::parse_str(&wrap(
        "test",
        7,
        r#"<message name="A" id="1" /><message name="A" id="2" />"#,
    ))
    .unwrap_err();
    assert!(matches!(err, SchemaError::DuplicateMemberName(_)));
}

#[test]
fn unknown_message_id_reference() {
    let err = Protocol::parse_str(&wrap("test", 7, r#"<message name="A" id="MsgId.Nope" />"#))
        .unwrap_err();
    assert!(matches!(err, SchemaError::InvalidProperty(_)));
}

// ==================== Multiple schemas ====================

#[test]
fn second_schema_refers_to_first() {
    let mut p = Protocol::new();
    p.load_str(&wrap(
        "first",
        7,
        r#"<fields><int name="A" type="uint16" defaultValue="9" /></fields>"#,
    ))
    .expect("first");
    p.load_str(&wrap(
        "second",
        7,
        r#"
        <fields><ref name="B" field="@first.A" /></fields>
        <message name="M" id="1"><ref name="a" field="@first.A" /></message>
        "#,
    ))
    .expect("second");

    assert_eq!(p.schemas().len(), 2);
    assert_eq!(p.current_schema().map(|s| s.name()), Some("second"));
    let b = p.field("B").expect("B");
    assert_eq!(b.min_length(), 2);
    assert_eq!(p.field("@first.A").map(|f| f.name()), Some("A"));
    assert!(p.field("A").is_none());
    assert_eq!(p.schema("second").and_then(|s| s.message("M")).map(|m| m.min_length()), Some(2));
}

#[test]
fn duplicate_schema_name() {
    let mut p = Protocol::new();
    p.load_str(&wrap("first", 7, "")).expect("first");
    let err = p.load_str(&wrap("first", 7, "")).unwrap_err();
    assert!(matches!(err, SchemaError::InvalidStructure(_)));
}

#[test]
fn multiple_schemas_need_dsl_5() {
    let mut p = Protocol::new();
    p.load_str(&wrap("first", 4, "")).expect("first");
    let err = p.load_str(&wrap("second", 4, "")).unwrap_err();
    assert!(matches!(err, SchemaError::UnsupportedFeature(_)));
    assert!(p.diagnostics().has_errors());
}

// ==================== Files ====================

#[test]
fn parse_file_from_disk() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    file.write_all(DEMO.as_bytes()).expect("write");
    let p = Protocol::parse_file(file.path()).expect("load");
    assert_eq!(p.schemas()[0].messages.len(), 3);
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = Protocol::parse_file(dir.path().join("missing.xml")).unwrap_err();
    assert!(matches!(err, SchemaError::Io(_)));
}

// ==================== Diagnostics ====================

#[test]
fn unknown_attributes_and_elements_warn() {
    let p = Protocol::parse_str(&wrap(
        "test",
        7,
        r#"
        <fields><int name="A" type="uint8" color="red" /></fields>
        <widget name="w" />
        "#,
    ))
    .expect("load");
    let warnings = p.diagnostics().messages(Level::Warning);
    assert!(warnings.iter().any(|w| w.contains("\"color\"")));
    assert!(warnings.iter().any(|w| w.contains("<widget>")));
    let entries = p.diagnostics().entries();
    assert!(entries.iter().all(|d| d.level != Level::Error));
    assert!(entries.iter().any(|d| d.level == Level::Warning && d.line.is_some()));
}

#[test]
fn failures_are_recorded_once() {
    let mut p = Protocol::new();
    let err = p
        .load_str(&wrap(
            "test",
            7,
            r#"<fields><int name="A" type="bogus" /><int name="B" type="bogus" /></fields>"#,
        ))
        .unwrap_err();
    assert!(matches!(err, SchemaError::InvalidProperty(_)));
    assert_eq!(p.diagnostics().messages(Level::Error).len(), 2);
}

#[test]
fn root_must_be_schema() {
    let err = Protocol::parse_str("<protocol name=\"x\" />").unwrap_err();
    assert!(matches!(err, SchemaError::InvalidStructure(_)));
}

#[test]
fn malformed_xml() {
    let err = Protocol::parse_str("<schema name=\"x\"><fields></schema>").unwrap_err();
    assert!(matches!(err, SchemaError::Xml(_)));
}
