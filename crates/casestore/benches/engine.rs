use casestore::filter::FilterCompiler;
use casestore::projection::{LookupJoin, ProjectionCtx, scan};
use casestore::{Comparison, FilterExpr, Projection, SelectQb, SqlQb, StoreResult};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

#[derive(Default)]
struct Row {
    id: i64,
    name: String,
    owner: Option<casestore::Lookup>,
}

const OWNER: LookupJoin = LookupJoin {
    table: "directory.wbt_user",
    alias: "u",
    fk: "owner_id",
    name: "name",
};

fn projection() -> Projection<Row> {
    Projection::<Row>::builder()
        .required(&["id"])
        .defaults(&["id", "name"])
        .column("id", "id", |r, row, i| {
            r.id = scan::get(row, i)?;
            Ok(())
        })
        .column("name", "name", |r, row, i| {
            r.name = scan::get(row, i)?;
            Ok(())
        })
        .lookup("owner", OWNER, |r, row, i| {
            r.owner = scan::lookup(row, i)?;
            Ok(())
        })
        .build()
}

/// `(name ILIKE $x OR owner.name = $y)` repeated `n` times under one AND.
fn filter_tree(n: usize) -> FilterExpr {
    FilterExpr::and(
        (0..n)
            .map(|i| {
                FilterExpr::or(vec![
                    FilterExpr::leaf("name", Comparison::ILike, format!("%{i}%").as_str()),
                    FilterExpr::leaf("owner.name", Comparison::Eq, format!("user{i}").as_str()),
                ])
            })
            .collect(),
    )
}

fn owner_join(fk: &str, qb: &mut SelectQb) -> StoreResult<String> {
    assert_eq!(fk, "owner");
    Ok(qb.left_join_once(fk, OWNER.table, OWNER.alias, "u.id = t.owner_id"))
}

fn bench_compile_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/compile_filter");

    for n in [1, 10, 100] {
        let tree = filter_tree(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &tree, |b, tree| {
            b.iter(|| {
                let resolver = owner_join;
                let compiler = FilterCompiler::new("t", &resolver);
                let mut qb = SelectQb::new("cases.thing t");
                compiler.apply(tree, &mut qb).unwrap();
                black_box(qb.to_sql());
            });
        });
    }

    group.finish();
}

fn bench_build_columns(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/build_columns");
    let projection = projection();
    let ctx = ProjectionCtx::new("t", 1);

    for fields in [vec![], vec!["name".to_string(), "owner".to_string()]] {
        let label = if fields.is_empty() { "defaults" } else { "with_lookup" };
        group.bench_with_input(BenchmarkId::from_parameter(label), &fields, |b, fields| {
            b.iter(|| {
                let (qb, plan) = projection
                    .build_columns(SelectQb::new("cases.thing t"), &ctx, fields)
                    .unwrap();
                black_box((qb.to_sql(), plan.len()));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compile_filter, bench_build_columns);
criterion_main!(benches);
