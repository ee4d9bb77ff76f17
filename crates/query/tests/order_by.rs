//! ORDER BY, null placement and tie-breaking

mod common;

use common::{TestContext, setup_test};
use querykit::{EngineConfig, Fixture, NullSort, Query};

fn add_hundreds(ctx: &TestContext) {
    ctx.add_member(5, None, 100, None);
    ctx.add_member(6, Some("member5"), 100, None);
    ctx.add_member(7, Some("member6"), 100, None);
}

#[test]
fn test_sort_with_nulls_last() {
    let ctx = setup_test();
    add_hundreds(&ctx);

    let plan = Query::select_from(&ctx.member)
        .filter(ctx.m("age").eq(100))
        .order_by(ctx.m("age").desc())
        .order_by(ctx.m("username").asc().nulls_last())
        .build()
        .unwrap();

    assert_eq!(
        ctx.usernames(&plan),
        vec![Some("member5".into()), Some("member6".into()), None]
    );
}

#[test]
fn test_default_null_placement() {
    let ctx = setup_test();
    add_hundreds(&ctx);

    // NULL is the smallest value: first ascending, last descending
    let asc = Query::select_from(&ctx.member)
        .filter(ctx.m("age").eq(100))
        .order_by(ctx.m("username").asc())
        .build()
        .unwrap();
    assert_eq!(
        ctx.usernames(&asc),
        vec![None, Some("member5".into()), Some("member6".into())]
    );

    let desc = Query::select_from(&ctx.member)
        .filter(ctx.m("age").eq(100))
        .order_by(ctx.m("username").desc())
        .build()
        .unwrap();
    assert_eq!(
        ctx.usernames(&desc),
        vec![Some("member6".into()), Some("member5".into()), None]
    );
}

#[test]
fn test_configured_null_placement() {
    let fixture = Fixture::new().unwrap();
    fixture.insert_member(1, None, 1, None).unwrap();
    fixture.insert_member(2, Some("a"), 1, None).unwrap();
    let executor = fixture.executor_with(EngineConfig {
        null_sort: NullSort::Largest,
        ..EngineConfig::default()
    });
    let member = fixture.member("member");

    let plan = Query::select([member.col("username")])
        .from(&member)
        .order_by(member.col("username").unwrap().asc())
        .build()
        .unwrap();
    let names: Vec<Option<String>> = executor.fetch_values(&plan).unwrap();
    assert_eq!(names, vec![Some("a".to_string()), None]);
}

#[test]
fn test_ties_break_on_row_identity() {
    let ctx = setup_test();
    add_hundreds(&ctx);

    let plan = Query::select_from(&ctx.member)
        .filter(ctx.m("age").eq(100))
        .order_by(ctx.m("age").asc())
        .build()
        .unwrap();
    // insertion order: null, member5, member6
    assert_eq!(
        ctx.usernames(&plan),
        vec![None, Some("member5".into()), Some("member6".into())]
    );

    // Stable across runs
    assert_eq!(ctx.usernames(&plan), ctx.usernames(&plan));
}

#[test]
fn test_order_by_expression() {
    let ctx = setup_test();
    let plan = Query::select_from(&ctx.member)
        .order_by(ctx.m("age").mul(-1).unwrap().asc())
        .build()
        .unwrap();
    assert_eq!(
        ctx.usernames(&plan),
        common::some(&["member4", "member3", "member2", "member1"])
    );
}
