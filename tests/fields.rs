//! Field kinds: construction, lengths and structural errors.

use protoschema::field::{FieldKind, OptionalMode};
use protoschema::{Field, Kind, Protocol, SchemaError};

fn load(body: &str) -> Result<Protocol, SchemaError> {
    Protocol::parse_str(&format!(
        r#"<schema name="test" version="5" dslVersion="7">{}</schema>"#,
        body
    ))
}

fn fields(body: &str) -> Protocol {
    load(&format!("<fields>{}</fields>", body)).expect("load")
}

fn field<'a>(p: &'a Protocol, name: &str) -> &'a Field {
    p.field(name).expect("field")
}

// ==================== Integral kinds ====================

#[test]
fn int_lengths_follow_type() {
    let p = fields(
        r#"
        <int name="A" type="uint16" />
        <int name="B" type="int32" length="3" />
        <int name="V" type="uintvar" />
        "#,
    );
    assert_eq!(field(&p, "A").min_length(), 2);
    assert_eq!(field(&p, "A").max_length(), 2);
    assert_eq!(field(&p, "B").max_length(), 3);
    assert_eq!(field(&p, "V").min_length(), 1);
    assert_eq!(field(&p, "V").max_length(), 10);
}

#[test]
fn int_specials_and_default() {
    let p = fields(
        r#"
        <int name="A" type="uint8" defaultValue="Invalid">
            <special name="Invalid" val="0xff" />
        </int>
        "#,
    );
    let a = field(&p, "A");
    assert_eq!(a.str_to_numeric(""), Some(255));
    assert_eq!(a.str_to_numeric("Invalid"), Some(255));
    assert_eq!(p.str_to_numeric("A.Invalid"), Some(255));
}

#[test]
fn int_length_too_big_for_type() {
    let err = load(r#"<fields><int name="A" type="uint8" length="2" /></fields>"#).unwrap_err();
    assert!(matches!(err, SchemaError::InvalidProperty(_)));
}

#[test]
fn missing_type_is_reported() {
    let err = load(r#"<fields><int name="A" /></fields>"#).unwrap_err();
    assert!(matches!(err, SchemaError::MissingProperty(_)));
}

#[test]
fn unknown_field_kind() {
    let err = load(r#"<fields><blob name="X" /></fields>"#).unwrap_err();
    assert!(matches!(err, SchemaError::UnknownFieldKind(_)));
}

#[test]
fn set_bits_must_fit() {
    let p = fields(
        r#"
        <set name="Flags" length="1">
            <bit name="a" idx="0" />
            <bit name="b" idx="7" />
        </set>
        "#,
    );
    assert_eq!(field(&p, "Flags").max_length(), 1);
    assert_eq!(p.str_to_numeric("Flags.b"), Some(0));

    assert!(load(r#"<fields><set name="F" length="1"><bit name="a" idx="8" /></set></fields>"#).is_err());
}

#[test]
fn float_lengths() {
    let p = fields(r#"<float name="F" type="float" /><float name="D" type="double" />"#);
    assert_eq!(field(&p, "F").max_length(), 4);
    assert_eq!(field(&p, "D").max_length(), 8);
}

// ==================== Bitfield ====================

#[test]
fn bitfield_packs_members() {
    let p = fields(
        r#"
        <bitfield name="Bf">
            <int name="low" type="uint8" bitLength="3" />
            <enum name="mode" type="uint8" bitLength="5">
                <validValue name="On" val="1" />
                <validValue name="Off" val="0" />
            </enum>
        </bitfield>
        "#,
    );
    let bf = field(&p, "Bf");
    assert_eq!(bf.kind(), Kind::Bitfield);
    assert_eq!(bf.members().len(), 2);
    assert_eq!(bf.min_length(), 1);
    assert_eq!(bf.members()[0].bit_length(), 3);
}

#[test]
fn bitfield_member_bit_length_exceeded() {
    let err = load(
        r#"<fields><bitfield name="Bf"><int name="a" type="uint8" bitLength="9" /></bitfield></fields>"#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::BitLengthExceeded(_)));
}

#[test]
fn bitfield_total_must_be_whole_bytes() {
    let err = load(
        r#"
        <fields>
            <bitfield name="Bf">
                <int name="a" type="uint8" bitLength="6" />
                <int name="b" type="uint8" bitLength="4" />
            </bitfield>
        </fields>
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::BitLengthExceeded(_)));
}

#[test]
fn bitfield_rejects_non_integral_members() {
    let err = load(
        r#"<fields><bitfield name="Bf"><string name="s" length="1" /></bitfield></fields>"#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::InvalidStructure(_)));
}

// ==================== Bundle ====================

#[test]
fn bundle_lengths_sum_members() {
    let p = fields(
        r#"
        <bundle name="B">
            <int name="a" type="uint16" />
            <string name="s" length="4" />
            <int name="v" type="uintvar" />
        </bundle>
        "#,
    );
    let b = field(&p, "B");
    assert_eq!(b.min_length(), 2 + 4 + 1);
    assert_eq!(b.max_length(), 2 + 4 + 10);
}

#[test]
fn bundle_duplicate_member_name() {
    let err = load(
        r#"
        <fields>
            <bundle name="B">
                <int name="a" type="uint8" />
                <int name="a" type="uint16" />
            </bundle>
        </fields>
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::DuplicateMemberName(_)));
}

#[test]
fn bundle_members_element_and_direct_members_conflict() {
    let err = load(
        r#"
        <fields>
            <bundle name="B">
                <members><int name="a" type="uint8" /></members>
                <int name="b" type="uint8" />
            </bundle>
        </fields>
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::InvalidStructure(_)));
}

#[test]
fn bundle_alias_must_name_member() {
    let p = fields(
        r#"
        <bundle name="B">
            <int name="a" type="uint8" />
            <alias name="first" field="$a" />
        </bundle>
        "#,
    );
    match &field(&p, "B").kind {
        FieldKind::Bundle(b) => assert_eq!(b.aliases[0].field, "a"),
        other => panic!("unexpected kind {:?}", other),
    }

    let err = load(
        r#"<fields><bundle name="B"><int name="a" type="uint8" /><alias name="x" field="$nope" /></bundle></fields>"#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::InvalidReference(_)));
}

// ==================== String and data ====================

#[test]
fn string_length_strategies() {
    let p = fields(
        r#"
        <string name="Fixed" length="8" />
        <string name="Zero" zeroTermSuffix="true" />
        <string name="Prefixed">
            <lengthPrefix><int name="len" type="uint8" /></lengthPrefix>
        </string>
        <string name="Any" />
        "#,
    );
    assert_eq!(field(&p, "Fixed").min_length(), 8);
    assert_eq!(field(&p, "Zero").min_length(), 1);
    assert_eq!(field(&p, "Zero").max_length(), usize::MAX);
    assert_eq!(field(&p, "Prefixed").min_length(), 1);
    assert_eq!(field(&p, "Prefixed").max_length(), 1 + 255);
    assert_eq!(field(&p, "Any").min_length(), 0);
    assert_eq!(field(&p, "Any").max_length(), usize::MAX);
}

#[test]
fn string_conflicting_length_spec() {
    let err = load(r#"<fields><string name="S" length="4" zeroTermSuffix="true" /></fields>"#)
        .unwrap_err();
    assert!(matches!(err, SchemaError::ConflictingLengthSpec(_)));
}

#[test]
fn string_default_longer_than_length() {
    let err = load(r#"<fields><string name="S" length="2" defaultValue="abc" /></fields>"#).unwrap_err();
    assert!(matches!(err, SchemaError::InvalidProperty(_)));
}

#[test]
fn data_default_is_hex() {
    let p = fields(r#"<data name="D" length="3" defaultValue="ab cd ef" />"#);
    assert_eq!(field(&p, "D").str_to_data(""), Some(vec![0xab, 0xcd, 0xef]));
    assert_eq!(field(&p, "D").max_length(), 3);
}

// ==================== List ====================

#[test]
fn list_with_fixed_count() {
    let p = fields(r#"<list name="L" count="3"><int name="e" type="uint16" /></list>"#);
    let l = field(&p, "L");
    assert_eq!(l.min_length(), 6);
    assert_eq!(l.max_length(), 6);
}

#[test]
fn list_with_count_prefix() {
    let p = fields(
        r#"
        <list name="L">
            <element><int name="e" type="uint16" /></element>
            <countPrefix><int name="cnt" type="uint8" /></countPrefix>
        </list>
        "#,
    );
    let l = field(&p, "L");
    assert_eq!(l.min_length(), 1);
    assert_eq!(l.max_length(), 2 * 255 + 1);
}

#[test]
fn list_count_and_prefix_conflict() {
    let err = load(
        r#"
        <fields>
            <list name="L" count="2">
                <element><int name="e" type="uint8" /></element>
                <countPrefix><int name="cnt" type="uint8" /></countPrefix>
            </list>
        </fields>
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::ConflictingLengthSpec(_)));
}

#[test]
fn list_without_element() {
    let err = load(r#"<fields><list name="L" count="2" /></fields>"#).unwrap_err();
    assert!(matches!(err, SchemaError::MissingProperty(_)));
}

#[test]
fn list_elem_fixed_length_requires_fixed_element() {
    let err = load(
        r#"
        <fields>
            <list name="L" count="2" elemFixedLength="true">
                <element><string name="s" zeroTermSuffix="true" /></element>
            </list>
        </fields>
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::InvalidProperty(_)));
}

// ==================== Ref, optional, variant ====================

#[test]
fn ref_takes_target_lengths_and_name() {
    let p = fields(
        r#"
        <int name="A" type="uint32" />
        <ref name="R" field="A" />
        "#,
    );
    let r = field(&p, "R");
    assert_eq!(r.kind(), Kind::Ref);
    assert_eq!(r.min_length(), 4);
    assert_eq!(r.dereferenced().name(), "A");
}

#[test]
fn ref_to_unknown_field() {
    let err = load(r#"<fields><ref name="R" field="Nope" /></fields>"#).unwrap_err();
    assert!(matches!(err, SchemaError::InvalidReference(_)));
}

#[test]
fn optional_wraps_single_field() {
    let p = fields(
        r#"
        <optional name="Opt" defaultMode="exists">
            <int name="Opt" type="uint16" />
        </optional>
        "#,
    );
    let opt = field(&p, "Opt");
    assert_eq!(opt.min_length(), 0);
    assert_eq!(opt.max_length(), 2);
    match &opt.kind {
        FieldKind::Optional(o) => assert_eq!(o.mode, OptionalMode::Exists),
        other => panic!("unexpected kind {:?}", other),
    }
}

#[test]
fn optional_without_field() {
    let err = load(r#"<fields><optional name="Opt" /></fields>"#).unwrap_err();
    assert!(matches!(err, SchemaError::MissingProperty(_)));
}

#[test]
fn variant_lengths() {
    let p = fields(
        r#"
        <variant name="V" defaultMember="small">
            <int name="small" type="uint8" />
            <int name="big" type="uint32" />
        </variant>
        "#,
    );
    let v = field(&p, "V");
    assert_eq!(v.min_length(), 0);
    assert_eq!(v.max_length(), 4);
    match &v.kind {
        FieldKind::Variant(f) => assert_eq!(f.default_member, Some(0)),
        other => panic!("unexpected kind {:?}", other),
    }
}

#[test]
fn variant_negative_default_member_selects_nothing() {
    let p = fields(
        r#"
        <variant name="V" defaultMember="-1">
            <int name="a" type="uint8" />
        </variant>
        "#,
    );
    match &field(&p, "V").kind {
        FieldKind::Variant(f) => assert_eq!(f.default_member, None),
        other => panic!("unexpected kind {:?}", other),
    }
}

// ==================== Common properties ====================

#[test]
fn validate_min_length_mismatch() {
    assert!(load(r#"<fields><int name="A" type="uint16" validateMinLength="2" /></fields>"#).is_ok());
    let err = load(r#"<fields><int name="A" type="uint16" validateMinLength="3" /></fields>"#)
        .unwrap_err();
    assert!(matches!(err, SchemaError::InvalidProperty(_)));
}

#[test]
fn namespaced_fields_are_qualified() {
    let p = load(
        r#"
        <ns name="outer">
            <ns name="inner">
                <fields><int name="A" type="uint8" /></fields>
            </ns>
        </ns>
        "#,
    )
    .expect("load");
    assert!(p.field("outer.inner.A").is_some());
    assert!(p.field("A").is_none());
    assert_eq!(p.schemas()[0].namespaces, vec!["outer", "outer.inner"]);
}

#[test]
fn duplicate_global_field() {
    let err = load(
        r#"<fields><int name="A" type="uint8" /><int name="A" type="uint16" /></fields>"#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::DuplicateMemberName(_)));
}
