//! Benchmark: merging valid ranges, and loading a schema with a large versioned enum.
//! The enum case exercises the per-value windows that `validCheckVersion` keeps apart.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use protoschema::{merge, MergePolicy, NumericOrFp, Protocol, RangeInterval};

fn scattered_ranges(count: i64) -> Vec<RangeInterval> {
    (0..count)
        .map(|i| {
            // Every third value leaves a gap, every fifth range gets its own window.
            let base = (i * 7919) % (count * 3);
            let r = RangeInterval::new(NumericOrFp::Signed(base), NumericOrFp::Signed(base + 1));
            if i % 5 == 0 {
                r.with_versions((i % 4) as u32, u32::MAX)
            } else {
                r
            }
        })
        .collect()
}

fn enum_schema(values: usize) -> String {
    let mut body = String::new();
    for i in 0..values {
        let since = i % 4;
        body.push_str(&format!(
            "<validValue name=\"V{}\" val=\"{}\" sinceVersion=\"{}\" />",
            i, i, since
        ));
    }
    format!(
        r#"<schema name="bench" version="5" dslVersion="7"><fields><enum name="Big" type="uint16" validCheckVersion="true">{}</enum></fields></schema>"#,
        body
    )
}

fn bench(c: &mut Criterion) {
    let ranges = scattered_ranges(4096);
    let merged = merge(ranges.clone(), MergePolicy::integral(true));
    eprintln!(
        "range_merge: {} input ranges, {} after merge",
        ranges.len(),
        merged.len()
    );

    c.bench_function("merge_versioned", |b| {
        b.iter(|| black_box(merge(black_box(ranges.clone()), MergePolicy::integral(true))));
    });

    c.bench_function("merge_unversioned", |b| {
        b.iter(|| black_box(merge(black_box(ranges.clone()), MergePolicy::integral(false))));
    });

    let src = enum_schema(1000);
    c.bench_function("load_enum_1000_values", |b| {
        b.iter(|| {
            let p = Protocol::parse_str(black_box(&src));
            black_box(p.is_ok())
        });
    });
}

criterion_group!(benches, bench);
criterion_main!(benches);
