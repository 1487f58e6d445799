//! Existence and validity conditions: parsing and verification against siblings.

use protoschema::field::FieldKind;
use protoschema::{CmpOp, Cond, CondExpr, Level, Operand, Protocol, SchemaError};

fn schema(dsl: u32, body: &str) -> Result<Protocol, SchemaError> {
    Protocol::parse_str(&format!(
        r#"<schema name="test" version="3" dslVersion="{}">{}</schema>"#,
        dsl, body
    ))
}

fn message(fields: &str) -> Result<Protocol, SchemaError> {
    schema(7, &format!(r#"<message name="Msg" id="1">{}</message>"#, fields))
}

// ==================== Parsing ====================

#[test]
fn parse_comparison() {
    let c = Cond::parse("$status = 5", "line 1").expect("parse");
    match c {
        Cond::Expr(CondExpr::Compare { left, op, right }) => {
            assert_eq!(left.path, "status");
            assert_eq!(op, CmpOp::Eq);
            assert_eq!(right, Operand::Value("5".to_string()));
        }
        other => panic!("unexpected condition {:?}", other),
    }
}

#[test]
fn parse_rejects_bad_left_operand() {
    let err = Cond::parse("status = 5", "line 1").unwrap_err();
    assert!(matches!(err, SchemaError::InvalidCondition(_)));
    assert!(Cond::parse("= 5", "line 1").is_err());
    assert!(Cond::parse("", "line 1").is_err());
}

#[test]
fn display_round_trips_text() {
    let c = CondExpr::parse("$len# >= 2", "line 1").expect("parse");
    assert_eq!(c.to_string(), "$len# >= 2");
}

// ==================== Sibling conditions ====================

#[test]
fn equality_against_sibling_verifies() {
    let p = message(
        r#"
        <int name="status" type="uint8" />
        <optional name="detail" cond="$status = 5">
            <int name="detail" type="uint16" />
        </optional>
        "#,
    )
    .expect("load");
    let msg = &p.schemas()[0].messages[0];
    match &msg.field("detail").expect("detail").kind {
        FieldKind::Optional(o) => assert!(o.cond.is_some()),
        other => panic!("unexpected kind {:?}", other),
    }
}

#[test]
fn missing_sibling_is_invalid_reference() {
    let err = message(
        r#"
        <int name="other" type="uint8" />
        <optional name="detail" cond="$status = 5">
            <int name="detail" type="uint16" />
        </optional>
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::InvalidReference(_)));
}

#[test]
fn incomparable_value() {
    let err = message(
        r#"
        <int name="status" type="uint8" />
        <optional name="detail" cond="$status = abc">
            <int name="detail" type="uint16" />
        </optional>
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::InvalidCondition(_)));
}

#[test]
fn enum_value_names_are_comparable() {
    let p = message(
        r#"
        <enum name="kind" type="uint8">
            <validValue name="A" val="0" />
            <validValue name="B" val="1" />
        </enum>
        <optional name="extra" cond="$kind != B">
            <int name="extra" type="uint8" />
        </optional>
        "#,
    );
    assert!(p.is_ok());
}

#[test]
fn bare_check_needs_inner_value_or_exists() {
    let ok = message(
        r#"
        <set name="flags" length="1"><bit name="hasExtra" idx="0" /></set>
        <optional name="extra" cond="$flags.hasExtra">
            <int name="extra" type="uint8" />
        </optional>
        "#,
    );
    assert!(ok.is_ok());

    let err = message(
        r#"
        <int name="flags" type="uint8" />
        <optional name="extra" cond="$flags">
            <int name="extra" type="uint8" />
        </optional>
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::InvalidCondition(_)));
}

#[test]
fn size_comparison() {
    let ok = message(
        r#"
        <string name="name" />
        <optional name="extra" cond="$name# > 0">
            <int name="extra" type="uint8" />
        </optional>
        "#,
    );
    assert!(ok.is_ok());

    let err = message(
        r#"
        <string name="name" />
        <optional name="extra" cond="$name# > many">
            <int name="extra" type="uint8" />
        </optional>
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::InvalidCondition(_)));
}

#[test]
fn size_comparison_needs_dsl_6() {
    let err = schema(
        5,
        r#"
        <message name="Msg" id="1">
            <string name="name" />
            <optional name="extra" cond="$name# > 0">
                <int name="extra" type="uint8" />
            </optional>
        </message>
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::UnsupportedFeature(_)));
}

#[test]
fn exists_check_on_optional_sibling() {
    let p = message(
        r#"
        <optional name="first" defaultMode="missing">
            <int name="first" type="uint8" />
        </optional>
        <optional name="second" cond="!$?first">
            <int name="second" type="uint8" />
        </optional>
        "#,
    );
    assert!(p.is_ok());
}

#[test]
fn sibling_fields_compared() {
    let ok = message(
        r#"
        <int name="a" type="uint8" />
        <int name="b" type="uint16" />
        <optional name="extra" cond="$a &lt; $b">
            <int name="extra" type="uint8" />
        </optional>
        "#,
    );
    assert!(ok.is_ok());

    let err = message(
        r#"
        <int name="a" type="uint8" />
        <string name="b" />
        <optional name="extra" cond="$a = $b">
            <int name="extra" type="uint8" />
        </optional>
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::InvalidCondition(_)));
}

// ==================== Condition lists ====================

#[test]
fn and_list_of_conditions() {
    let p = message(
        r#"
        <int name="a" type="uint8" />
        <int name="b" type="uint8" />
        <optional name="extra">
            <field><int name="extra" type="uint8" /></field>
            <and>
                <cond value="$a = 1" />
                <cond value="$b = 2" />
            </and>
        </optional>
        "#,
    )
    .expect("load");
    let msg = &p.schemas()[0].messages[0];
    match &msg.field("extra").expect("extra").kind {
        FieldKind::Optional(o) => assert!(matches!(o.cond, Some(Cond::List(_)))),
        other => panic!("unexpected kind {:?}", other),
    }
}

#[test]
fn list_needs_two_conditions() {
    let err = message(
        r#"
        <int name="a" type="uint8" />
        <optional name="extra">
            <field><int name="extra" type="uint8" /></field>
            <or><cond value="$a = 1" /></or>
        </optional>
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::InvalidCondition(_)));
}

#[test]
fn only_one_condition_source() {
    let err = message(
        r#"
        <int name="a" type="uint8" />
        <optional name="extra" cond="$a = 1">
            <field><int name="extra" type="uint8" /></field>
            <or><cond value="$a = 2" /><cond value="$a = 3" /></or>
        </optional>
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::InvalidCondition(_)));
}

// ==================== Interface conditions ====================

const IFACE: &str = r#"
<interface name="Common">
    <int name="version" type="uint8" semanticType="version" />
</interface>
"#;

#[test]
fn interface_reference() {
    let p = schema(
        7,
        &format!(
            r#"{}
            <message name="Msg" id="1">
                <optional name="extra" cond="%version >= 2">
                    <int name="extra" type="uint8" />
                </optional>
            </message>"#,
            IFACE
        ),
    );
    assert!(p.is_ok());
}

#[test]
fn interface_reference_unknown_field() {
    let err = schema(
        7,
        &format!(
            r#"{}
            <message name="Msg" id="1">
                <optional name="extra" cond="%flags = 1">
                    <int name="extra" type="uint8" />
                </optional>
            </message>"#,
            IFACE
        ),
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::InvalidReference(_)));
}

#[test]
fn interface_reference_needs_dsl_6() {
    let err = schema(
        5,
        &format!(
            r#"{}
            <message name="Msg" id="1">
                <optional name="extra" cond="%version >= 2">
                    <int name="extra" type="uint8" />
                </optional>
            </message>"#,
            IFACE
        ),
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::UnsupportedFeature(_)));
}

// ==================== Composite validity ====================

#[test]
fn bundle_valid_cond() {
    let ok = schema(
        7,
        r#"
        <fields>
            <bundle name="Range" validCond="$lo &lt;= $hi">
                <int name="lo" type="uint8" />
                <int name="hi" type="uint8" />
            </bundle>
        </fields>
        "#,
    );
    assert!(ok.is_ok());

    let err = schema(
        7,
        r#"
        <fields>
            <bundle name="Range" validCond="$lo &lt;= $top">
                <int name="lo" type="uint8" />
                <int name="hi" type="uint8" />
            </bundle>
        </fields>
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::InvalidReference(_)));
}

#[test]
fn composite_valid_cond_ignored_before_dsl_7() {
    let p = schema(
        6,
        r#"
        <fields>
            <bitfield name="Bf" validCond="$a = 1">
                <int name="a" type="uint8" bitLength="4" />
                <int name="b" type="uint8" bitLength="4" />
            </bitfield>
        </fields>
        "#,
    )
    .expect("load");
    let warnings = p.diagnostics().messages(Level::Warning);
    assert!(warnings.iter().any(|w| w.contains("not supported")));
}

#[test]
fn cond_on_global_optional_warns() {
    let p = schema(
        7,
        r#"
        <fields>
            <optional name="Opt" cond="$x = 1">
                <int name="Opt" type="uint8" />
            </optional>
        </fields>
        "#,
    )
    .expect("load");
    let warnings = p.diagnostics().messages(Level::Warning);
    assert!(warnings.iter().any(|w| w.contains("Existence conditions")));
}
