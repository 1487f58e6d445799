//! Valid-range merging and per-version validity of integral and float fields.

use protoschema::field::FieldKind;
use protoschema::{merge, Field, Level, MergePolicy, NumericOrFp, Protocol, RangeInterval};

fn s(v: i64) -> NumericOrFp {
    NumericOrFp::Signed(v)
}

fn u(v: u64) -> NumericOrFp {
    NumericOrFp::Unsigned(v)
}

fn load(body: &str) -> Protocol {
    Protocol::parse_str(&format!(
        r#"<schema name="test" version="5" dslVersion="7"><fields>{}</fields></schema>"#,
        body
    ))
    .expect("load")
}

fn bounds(field: &Field) -> Vec<(NumericOrFp, NumericOrFp, u32, u32)> {
    field
        .valid_ranges()
        .expect("ranges")
        .intervals()
        .iter()
        .map(|r| (r.min, r.max, r.since_version, r.deprecated_since))
        .collect()
}

// ==================== Merge ====================

#[test]
fn merge_is_idempotent() {
    let input = vec![
        RangeInterval::new(s(10), s(20)),
        RangeInterval::value(s(21)),
        RangeInterval::new(s(-5), s(0)).with_versions(2, 4),
        RangeInterval::new(s(3), s(1)),
        RangeInterval::value(s(100)),
    ];
    for policy in [MergePolicy::integral(true), MergePolicy::integral(false)] {
        let once = merge(input.clone(), policy);
        let twice = merge(once.intervals().to_vec(), policy);
        assert_eq!(once, twice);
    }
}

#[test]
fn merge_covers_exactly_the_input() {
    let input = vec![
        RangeInterval::new(s(0), s(4)),
        RangeInterval::new(s(2), s(8)),
        RangeInterval::value(s(9)),
        RangeInterval::new(s(20), s(25)),
    ];
    let merged = merge(input.clone(), MergePolicy::integral(false));
    assert_eq!(merged.len(), 2);
    for v in -3..30 {
        let covered = input.iter().any(|r| r.contains_value(s(v)));
        assert_eq!(merged.contains(s(v), None), covered, "value {}", v);
    }
}

#[test]
fn merge_orders_by_value() {
    let merged = merge(
        vec![
            RangeInterval::value(s(50)),
            RangeInterval::value(s(-50)),
            RangeInterval::value(s(0)),
        ],
        MergePolicy::integral(false),
    );
    let mins: Vec<_> = merged.intervals().iter().map(|r| r.min).collect();
    assert_eq!(mins, vec![s(-50), s(0), s(50)]);
}

#[test]
fn windows_are_not_merged_together() {
    let merged = merge(
        vec![
            RangeInterval::new(s(0), s(5)),
            RangeInterval::new(s(6), s(10)).with_versions(3, u32::MAX),
        ],
        MergePolicy::integral(true),
    );
    assert_eq!(merged.len(), 2);
    assert!(merged.contains(s(8), Some(3)));
    assert!(!merged.contains(s(8), Some(2)));
}

// ==================== Big unsigned ====================

#[test]
fn big_unsigned_orders_above_signed() {
    assert!(u(u64::MAX) > s(i64::MAX));
    assert!(u(u64::MAX) > s(-1));
    assert!(u(i64::MAX as u64 + 1) > s(i64::MAX));
    assert_eq!(u(5), s(5));
}

#[test]
fn uint64_field_keeps_top_values() {
    let p = load(
        r#"
        <int name="Big" type="uint64">
            <validRange value="[0xfffffffffffffff0, 0xffffffffffffffff]" />
            <validValue value="0" />
        </int>
        "#,
    );
    let big = p.field("Big").expect("Big");
    let ranges = big.valid_ranges().expect("ranges");
    assert_eq!(ranges.len(), 2);
    assert_eq!(ranges.intervals()[0].min, s(0));
    assert_eq!(ranges.intervals()[1].max, u(u64::MAX));
    assert!(ranges.contains(u(u64::MAX - 1), None));
    assert!(!ranges.contains(u(1 << 63), None));
}

// ==================== Field ranges ====================

#[test]
fn int_defaults_to_full_type_range() {
    let p = load(r#"<int name="A" type="int8" />"#);
    assert_eq!(
        bounds(p.field("A").expect("A")),
        vec![(s(-128), s(127), 0, u32::MAX)]
    );
}

#[test]
fn int_declared_ranges_with_versions() {
    let p = load(
        r#"
        <int name="A" type="uint8" validCheckVersion="true" validRange="[0, 10]">
            <validValue value="11" sinceVersion="2" />
            <validMin value="200" />
        </int>
        "#,
    );
    assert_eq!(
        bounds(p.field("A").expect("A")),
        vec![
            (s(0), s(10), 0, u32::MAX),
            (s(11), s(11), 2, u32::MAX),
            (s(200), s(255), 0, u32::MAX),
        ]
    );
}

#[test]
fn int_ranges_merge_without_version_check() {
    let p = load(
        r#"
        <int name="A" type="uint8" validRange="[0, 10]">
            <validValue value="11" sinceVersion="2" />
        </int>
        "#,
    );
    assert_eq!(
        bounds(p.field("A").expect("A")),
        vec![(s(0), s(11), 0, u32::MAX)]
    );
}

#[test]
fn range_outside_type_is_rejected() {
    let err = Protocol::parse_str(
        r#"<schema name="t" version="1"><fields><int name="A" type="uint8" validRange="[0, 300]" /></fields></schema>"#,
    );
    assert!(err.is_err());
}

#[test]
fn float_ranges_with_specials() {
    let p = load(
        r#"
        <float name="F" type="double" validRange="[0.0, 1.5]">
            <validValue value="inf" />
            <validValue value="nan" />
        </float>
        "#,
    );
    let ranges = p.field("F").and_then(Field::valid_ranges).expect("ranges");
    assert_eq!(ranges.len(), 3);
    assert!(ranges.contains(NumericOrFp::Fp(1.0), None));
    assert!(ranges.contains(NumericOrFp::Fp(f64::INFINITY), None));
    assert!(ranges.contains(NumericOrFp::Fp(f64::NAN), None));
    assert!(!ranges.contains(NumericOrFp::Fp(2.0), None));
}

#[test]
fn intersecting_float_ranges_warn() {
    let p = load(
        r#"
        <float name="F" type="double" validRange="[0.0, 2.0]">
            <validRange value="[1.0, 3.0]" />
        </float>
        "#,
    );
    let ranges = p.field("F").and_then(Field::valid_ranges).expect("ranges");
    assert_eq!(ranges.len(), 1);
    let warnings = p.diagnostics().messages(Level::Warning);
    assert!(warnings.iter().any(|w| w.contains("are intersecting")));

    let p = load(r#"<float name="G" type="double" validRange="[0.0, 1.0]"><validValue value="1.0" /></float>"#);
    assert!(p.diagnostics().messages(Level::Warning).is_empty());
}

// ==================== Enum validity per version ====================

#[test]
fn enum_ranges_follow_value_windows() {
    let p = load(
        r#"
        <enum name="E" type="uint8" validCheckVersion="true">
            <validValue name="A" val="0" />
            <validValue name="B" val="1" />
            <validValue name="C" val="2" sinceVersion="1" deprecated="2" />
        </enum>
        "#,
    );
    let e = p.field("E").expect("E");
    assert_eq!(
        bounds(e),
        vec![(s(0), s(1), 0, u32::MAX), (s(2), s(2), 1, 2)]
    );

    let FieldKind::Enum(en) = &e.kind else {
        panic!("not an enum");
    };
    assert!(en.is_valid_value(2, Some(1)));
    assert!(!en.is_valid_value(2, Some(2)));
    assert!(!en.is_valid_value(2, Some(0)));
    assert!(en.is_valid_value(0, Some(4)));
    assert!(!en.is_valid_value(3, None));
}

#[test]
fn enum_without_version_check_merges_all() {
    let p = load(
        r#"
        <enum name="E" type="uint8">
            <validValue name="A" val="0" />
            <validValue name="B" val="1" />
            <validValue name="C" val="2" sinceVersion="1" deprecated="2" />
        </enum>
        "#,
    );
    let e = p.field("E").expect("E");
    assert_eq!(bounds(e), vec![(s(0), s(2), 0, u32::MAX)]);
    let FieldKind::Enum(en) = &e.kind else {
        panic!("not an enum");
    };
    assert!(en.is_valid_value(2, Some(2)));
}

#[test]
fn enum_duplicate_values_need_permission() {
    let dup = r#"
        <enum name="E" type="uint8"{}>
            <validValue name="A" val="1" />
            <validValue name="B" val="1" />
        </enum>
    "#;
    let strict = Protocol::parse_str(&format!(
        r#"<schema name="t" version="1"><fields>{}</fields></schema>"#,
        dup.replace("{}", "")
    ));
    assert!(strict.is_err());
    let relaxed = Protocol::parse_str(&format!(
        r#"<schema name="t" version="1"><fields>{}</fields></schema>"#,
        dup.replace("{}", r#" nonUniqueAllowed="true""#)
    ));
    assert!(relaxed.is_ok());
}
