//! Cross-builder tests for the qb module.

use crate::qb::{Expr, MutationQb, ParamList, SqlQb, delete, insert, select, update};

#[test]
fn test_builders_share_one_param_list() {
    let mut params = ParamList::new();
    let mutation = update("cases.priority")
        .set("name", "Low")
        .eq("dc", 1i64)
        .eq("id", 9i64)
        .returning_all();
    let first = mutation.build_into(&mut params);
    let second = select("p").column("p.id").eq("p.dc", 1i64).build_into(&mut params);

    assert_eq!(
        first,
        "UPDATE cases.priority SET name = $1 WHERE dc = $2 AND id = $3 RETURNING *"
    );
    assert_eq!(second, "SELECT p.id FROM p WHERE p.dc = $4");
    assert_eq!(params.len(), 4);
}

#[test]
fn test_build_validates() {
    assert!(update("t").build().is_err());
    let built = delete("t").eq("id", 1i64).build().unwrap();
    assert_eq!(built.sql, "DELETE FROM t WHERE id = $1");
    assert_eq!(built.params.len(), 1);
    assert_eq!(built.tag(), None);
}

#[test]
fn test_built_query_tag() {
    let built = insert("t")
        .set("a", 1i32)
        .build()
        .unwrap()
        .tagged("postgres.t.create");
    assert_eq!(built.tag(), Some("postgres.t.create"));
}

#[test]
fn test_param_debug_values_follow_placeholder_order() {
    let qb = select("t").and_expr(Expr::and(vec![
        Expr::eq("color", "red"),
        Expr::or(vec![Expr::eq("a", 1i64), Expr::eq("b", 2i64)]),
    ]));
    let built = qb.build().unwrap();
    let debug: Vec<String> = built.params.iter().map(|p| format!("{p:?}")).collect();
    assert_eq!(debug, vec!["\"red\"", "1", "2"]);
}

#[test]
fn test_returning_flags() {
    assert!(!insert("t").has_returning());
    assert!(insert("t").returning_all().has_returning());
    assert!(delete("t").returning("id").has_returning());
}
