//! Bulk update and delete

mod common;

use common::{setup_strict, setup_test, some};
use querykit::{Delete, ErrorKind, Expr, Query, Update, Value};

#[test]
fn test_bulk_update() {
    let ctx = setup_test();
    let plan = Update::table(&ctx.member)
        .set(ctx.m("username"), "비회원")
        .filter(ctx.m("age").lt(28))
        .build()
        .unwrap();
    assert_eq!(ctx.executor.update(&plan).unwrap(), 2);

    let query = Query::select_from(&ctx.member)
        .order_by(ctx.m("age").asc())
        .build()
        .unwrap();
    assert_eq!(
        ctx.usernames(&query),
        some(&["비회원", "비회원", "member3", "member4"])
    );
}

#[test]
fn test_update_with_expression() {
    let ctx = setup_test();
    let plan = Update::table(&ctx.member)
        .set(ctx.m("age"), ctx.m("age").add(1))
        .filter(ctx.m("age").ge(0))
        .build()
        .unwrap();
    assert_eq!(ctx.executor.update(&plan).unwrap(), 4);

    let ages = Query::select([ctx.m("age")])
        .from(&ctx.member)
        .order_by(ctx.m("age").asc())
        .build()
        .unwrap();
    assert_eq!(
        ctx.executor.fetch_values::<i32>(&ages).unwrap(),
        vec![11, 21, 31, 41]
    );
}

#[test]
fn test_assignments_see_the_original_row() {
    let ctx = setup_test();
    // the second assignment reads the age before the first one applied
    let plan = Update::table(&ctx.member)
        .set(ctx.m("age"), ctx.m("age").mul(2))
        .set(
            ctx.m("username"),
            ctx.m("username").concat("_").unwrap().concat(ctx.m("age").string_value()),
        )
        .filter(ctx.m("username").eq("member1"))
        .build()
        .unwrap();
    assert_eq!(ctx.executor.update(&plan).unwrap(), 1);

    let query = Query::select([ctx.m("username"), ctx.m("age")])
        .from(&ctx.member)
        .filter(ctx.m("id").eq(1i64))
        .build()
        .unwrap();
    let values = ctx.executor.fetch_one(&query).unwrap().unwrap().into_values().unwrap();
    assert_eq!(values, vec![Value::string("member1_10"), Value::I32(20)]);
}

#[test]
fn test_update_from_subquery() {
    let ctx = setup_test();
    let sub = ctx.fixture.member("subM");
    let oldest = Query::select([sub.col("age").unwrap().max()])
        .from(&sub)
        .build_subquery()
        .unwrap();
    let plan = Update::table(&ctx.member)
        .set(ctx.m("age"), Expr::subquery(oldest))
        .filter(ctx.m("username").eq("member1"))
        .build()
        .unwrap();
    assert_eq!(ctx.executor.update(&plan).unwrap(), 1);

    let query = Query::select_from(&ctx.member)
        .filter(ctx.m("age").eq(40))
        .build()
        .unwrap();
    assert_eq!(ctx.executor.fetch_count(&query).unwrap(), 2);
}

#[test]
fn test_bulk_delete() {
    let ctx = setup_test();
    let plan = Delete::from(&ctx.member)
        .filter(ctx.m("age").gt(18))
        .build()
        .unwrap();
    assert_eq!(ctx.executor.delete(&plan).unwrap(), 3);

    let query = Query::select_from(&ctx.member).build().unwrap();
    assert_eq!(ctx.usernames(&query), some(&["member1"]));

    // nothing left to delete
    assert_eq!(ctx.executor.delete(&plan).unwrap(), 0);
}

#[test]
fn test_update_is_repeatable() {
    let ctx = setup_test();
    let plan = Update::table(&ctx.member)
        .set(ctx.m("username"), "junior")
        .filter(ctx.m("age").lt(28))
        .build()
        .unwrap();
    assert_eq!(ctx.executor.update(&plan).unwrap(), 2);
    assert_eq!(ctx.executor.update(&plan).unwrap(), 2);

    let query = Query::select_from(&ctx.member)
        .filter(ctx.m("username").eq("junior"))
        .build()
        .unwrap();
    assert_eq!(ctx.executor.fetch_count(&query).unwrap(), 2);
}

#[test]
fn test_unconditional_mutation_guard() {
    let strict = setup_strict();
    let update = Update::table(&strict.member)
        .set(strict.m("age"), 0)
        .build()
        .unwrap();
    let err = strict.executor.update(&update).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsafeUnconditionalMutation);

    let delete = Delete::from(&strict.member).build().unwrap();
    let err = strict.executor.delete(&delete).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsafeUnconditionalMutation);
    assert_eq!(strict.fixture.store.row_count("Member").unwrap(), 4);

    // the default configuration allows it
    let ctx = setup_test();
    let update = Update::table(&ctx.member)
        .set(ctx.m("age"), 0)
        .build()
        .unwrap();
    assert_eq!(ctx.executor.update(&update).unwrap(), 4);
    let delete = Delete::from(&ctx.member).build().unwrap();
    assert_eq!(ctx.executor.delete(&delete).unwrap(), 4);
    assert_eq!(ctx.fixture.store.row_count("Member").unwrap(), 0);
}

#[test]
fn test_invalid_updates() {
    let ctx = setup_test();

    let err = Update::table(&ctx.member)
        .set(ctx.m("id"), 10i64)
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedExpression);

    let err = Update::table(&ctx.member)
        .set(ctx.m("age"), Expr::null())
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedExpression);

    let err = Update::table(&ctx.member)
        .set(ctx.m("age"), "old")
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedExpression);

    let err = Update::table(&ctx.member)
        .set(ctx.t("name"), "x")
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedExpression);

    let err = Update::table(&ctx.member).build().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedExpression);

    // narrowing that does not fit fails at runtime and changes nothing
    let plan = Update::table(&ctx.member)
        .set(ctx.m("age"), i64::MAX)
        .filter(ctx.m("age").eq(10))
        .build()
        .unwrap();
    let err = ctx.executor.update(&plan).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Evaluation);
    let ages = Query::select([ctx.m("age")])
        .from(&ctx.member)
        .filter(ctx.m("username").eq("member1"))
        .build()
        .unwrap();
    assert_eq!(ctx.executor.fetch_values::<i32>(&ages).unwrap(), vec![10]);
}

#[test]
fn test_mutation_functions_are_checked() {
    let ctx = setup_test();
    ctx.fixture.store.restrict_functions(["lower"]);
    let plan = Update::table(&ctx.member)
        .set(
            ctx.m("username"),
            Expr::function("replace", vec![ctx.m("username"), Expr::lit("member"), Expr::lit("M")]),
        )
        .filter(ctx.m("age").eq(10))
        .build()
        .unwrap();
    let err = ctx.executor.update(&plan).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFunction);
}

#[test]
fn test_invalidate_snapshot() {
    let ctx = setup_test();
    let before = ctx.executor.snapshot_token().unwrap();

    let plan = Update::table(&ctx.member)
        .set(ctx.m("age"), 99)
        .filter(ctx.m("username").eq("member4"))
        .build()
        .unwrap();
    ctx.executor.update(&plan).unwrap();

    let after = ctx.executor.snapshot_token().unwrap();
    assert_ne!(before, after);
    assert!(!ctx.fixture.store.is_invalidated(before));

    ctx.executor.invalidate(before).unwrap();
    assert!(ctx.fixture.store.is_invalidated(before));
    assert!(!ctx.fixture.store.is_invalidated(after));
}
