use super::*;
use crate::error::StoreResult;
use crate::qb::{ParamList, SelectQb, SqlQb};
use std::cell::Cell;

fn params_debug(params: &ParamList) -> Vec<String> {
    params.iter().map(|p| format!("{p:?}")).collect()
}

fn compile_unqualified(expr: &FilterExpr) -> (String, Vec<String>) {
    let mut qb = SelectQb::new("t");
    let predicate = FilterCompiler::new("", &NoJoins).compile(expr, &mut qb).unwrap();
    let mut params = ParamList::new();
    let sql = predicate.build(&mut params);
    (sql, params_debug(&params))
}

#[test]
fn and_with_nested_or() {
    let expr = FilterExpr::and(vec![
        FilterExpr::leaf("color", Comparison::Eq, "red"),
        FilterExpr::or(vec![
            FilterExpr::leaf("name", Comparison::Like, "%urgent%"),
            FilterExpr::leaf("name", Comparison::Like, "%critical%"),
        ]),
    ]);
    let (sql, args) = compile_unqualified(&expr);
    assert_eq!(sql, "color = $1 AND (name LIKE $2 OR name LIKE $3)");
    assert_eq!(args, vec!["\"red\"", "\"%urgent%\"", "\"%critical%\""]);
}

#[test]
fn where_clause_from_tree() {
    let expr = FilterExpr::and(vec![
        FilterExpr::leaf("color", Comparison::Eq, "red"),
        FilterExpr::or(vec![
            FilterExpr::leaf("name", Comparison::Like, "%urgent%"),
            FilterExpr::leaf("name", Comparison::Like, "%critical%"),
        ]),
    ]);
    let mut qb = SelectQb::new("cases.priority");
    FilterCompiler::new("", &NoJoins).apply(&expr, &mut qb).unwrap();
    assert_eq!(
        qb.to_sql(),
        "SELECT * FROM cases.priority WHERE color = $1 AND (name LIKE $2 OR name LIKE $3)"
    );
}

#[test]
fn compiling_twice_is_stable() {
    let expr = FilterExpr::or(vec![
        FilterExpr::leaf("a", Comparison::Gt, 1i64),
        FilterExpr::leaf("b", Comparison::ILike, "x%"),
    ]);
    assert_eq!(compile_unqualified(&expr), compile_unqualified(&expr));
}

#[test]
fn compiling_after_other_params_only_shifts_numbering() {
    let expr = FilterExpr::leaf("a", Comparison::Lte, 10i64);
    let mut qb = SelectQb::new("t");
    let predicate = FilterCompiler::new("", &NoJoins).compile(&expr, &mut qb).unwrap();

    let mut fresh = ParamList::new();
    let mut shifted = ParamList::new();
    shifted.push(0i64);
    assert_eq!(predicate.build(&mut fresh), "a <= $1");
    assert_eq!(predicate.build(&mut shifted), "a <= $2");
    assert_eq!(params_debug(&fresh), params_debug(&shifted)[1..].to_vec());
}

#[test]
fn empty_tree_is_tautology() {
    let (sql, args) = compile_unqualified(&FilterExpr::and(vec![]));
    assert_eq!(sql, "1=1");
    assert!(args.is_empty());
    let (sql, _) = compile_unqualified(&FilterExpr::or(vec![FilterExpr::and(vec![])]));
    assert_eq!(sql, "1=1");
}

#[test]
fn bare_columns_are_qualified_with_root_alias() {
    let mut qb = SelectQb::new("cases.priority p");
    let predicate = FilterCompiler::new("p", &NoJoins)
        .compile(&FilterExpr::leaf("name", Comparison::ILike, "%a%"), &mut qb)
        .unwrap();
    assert_eq!(predicate.build(&mut ParamList::new()), "p.name ILIKE $1");
}

#[test]
fn two_dots_are_rejected() {
    let mut qb = SelectQb::new("t");
    let err = FilterCompiler::new("t", &NoJoins)
        .compile(&FilterExpr::leaf("a.b.c", Comparison::Eq, 1i64), &mut qb)
        .unwrap_err();
    assert!(err.is_invalid_argument());
    assert_eq!(err.id(), "store.filter.nesting");
}

#[test]
fn dotted_column_resolves_once() {
    let calls = Cell::new(0);
    let resolver = |fk: &str, qb: &mut SelectQb| -> StoreResult<String> {
        calls.set(calls.get() + 1);
        assert_eq!(fk, "sla");
        Ok(qb.left_join_once(fk, "cases.sla", "sla", "sla.id = s.sla_id"))
    };

    let expr = FilterExpr::or(vec![
        FilterExpr::leaf("sla.name", Comparison::Eq, "Gold"),
        FilterExpr::leaf("sla.name", Comparison::Eq, "Silver"),
        FilterExpr::leaf("sla.id", Comparison::Gt, 3i64),
    ]);
    let mut qb = SelectQb::new("cases.service_catalog s");
    FilterCompiler::new("s", &resolver).apply(&expr, &mut qb).unwrap();

    assert_eq!(calls.get(), 1);
    assert_eq!(qb.join_count(), 1);
    assert_eq!(
        qb.to_sql(),
        "SELECT * FROM cases.service_catalog s LEFT JOIN cases.sla sla ON sla.id = s.sla_id \
         WHERE (sla.name = $1 OR sla.name = $2 OR sla.id > $3)"
    );
}

#[test]
fn existing_join_is_reused_without_resolver() {
    let mut qb = SelectQb::new("cases.service_catalog s");
    qb.left_join_once("status", "cases.status", "st", "st.id = s.status_id");
    let predicate = FilterCompiler::new("s", &NoJoins)
        .compile(&FilterExpr::leaf("status.name", Comparison::Eq, "Open"), &mut qb)
        .unwrap();
    assert_eq!(predicate.build(&mut ParamList::new()), "st.name = $1");
}

#[test]
fn unknown_join_fails() {
    let mut qb = SelectQb::new("t");
    let err = FilterCompiler::new("t", &NoJoins)
        .compile(&FilterExpr::leaf("owner.name", Comparison::Eq, "x"), &mut qb)
        .unwrap_err();
    assert!(err.is_invalid_argument());
}

#[test]
fn list_and_null_values() {
    let expr = FilterExpr::and(vec![
        FilterExpr::leaf("id", Comparison::Eq, vec![1i64, 2]),
        FilterExpr::leaf("name", Comparison::NotEq, vec!["a".to_string()]),
        FilterExpr::Leaf(Filter::new("color", Comparison::Eq, FilterValue::Null)),
    ]);
    let (sql, _) = compile_unqualified(&expr);
    assert_eq!(sql, "id = ANY($1) AND name != ALL($2) AND color IS NULL");

    let mut qb = SelectQb::new("t");
    let err = FilterCompiler::new("", &NoJoins)
        .compile(&FilterExpr::leaf("id", Comparison::Gt, vec![1i64]), &mut qb)
        .unwrap_err();
    assert_eq!(err.id(), "store.filter.list_comparison");
}

#[test]
fn encoders_rewrite_values() {
    let encoders = ValueEncoders::new().register("created_at", encode_timestamp);
    let mut qb = SelectQb::new("t");
    let predicate = FilterCompiler::new("t", &NoJoins)
        .with_encoders(&encoders)
        .compile(
            &FilterExpr::leaf("created_at", Comparison::Gte, 1_700_000_000_000i64),
            &mut qb,
        )
        .unwrap();
    let mut params = ParamList::new();
    assert_eq!(predicate.build(&mut params), "t.created_at >= $1");
    assert_eq!(params_debug(&params), vec!["2023-11-14T22:13:20Z"]);
}

#[test]
fn comparison_parse() {
    assert_eq!("ilike".parse::<Comparison>().unwrap(), Comparison::ILike);
    assert_eq!(">=".parse::<Comparison>().unwrap(), Comparison::Gte);
    let err = "~".parse::<Comparison>().unwrap_err();
    assert!(err.is_invalid_argument());
}

#[test]
fn tree_from_json() {
    let json = r#"{"connective": "and", "nodes": [
        {"column": "color", "comparison": "=", "value": "red"},
        {"connective": "or", "nodes": [
            {"column": "id", "comparison": "=", "value": [1, 2]},
            {"column": "color", "comparison": "!=", "value": null}
        ]}
    ]}"#;
    let expr: FilterExpr = serde_json::from_str(json).unwrap();
    let (sql, _) = compile_unqualified(&expr);
    assert_eq!(sql, "color = $1 AND (id = ANY($2) OR color IS NOT NULL)");
}

#[test]
fn unknown_comparison_in_json_fails() {
    let json = r#"{"column": "color", "comparison": "~~", "value": "red"}"#;
    assert!(serde_json::from_str::<FilterExpr>(json).is_err());
}

#[test]
fn leaves_mut_reaches_every_leaf() {
    let mut expr = FilterExpr::and(vec![
        FilterExpr::leaf("name", Comparison::Eq, "a"),
        FilterExpr::or(vec![
            FilterExpr::leaf("id", Comparison::Gt, 1i64),
            FilterExpr::and(vec![FilterExpr::leaf("color", Comparison::Eq, "red")]),
        ]),
    ]);
    for leaf in expr.leaves_mut() {
        leaf.value = FilterValue::Null;
    }
    let mut columns: Vec<String> = expr.leaves_mut().into_iter().map(|f| f.column.clone()).collect();
    columns.sort();
    assert_eq!(columns, ["color", "id", "name"]);
    assert!(expr.leaves_mut().iter().all(|f| f.value == FilterValue::Null));
}
