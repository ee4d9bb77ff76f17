//! Relationship joins, explicit joins, fetch joins and deferred references

mod common;

use common::{setup_test, some};
use querykit::{ErrorKind, Predicate, Query, Related, Selection, Value};

#[test]
fn test_inner_relationship_join() {
    let ctx = setup_test();
    let plan = Query::select_from(&ctx.member)
        .join(ctx.member.relation("team_id"), &ctx.team)
        .filter(ctx.t("name").eq("teamA"))
        .order_by(ctx.m("age").asc())
        .build()
        .unwrap();
    assert_eq!(ctx.usernames(&plan), some(&["member1", "member2"]));
}

#[test]
fn test_left_join_keeps_unmatched_rows() {
    let ctx = setup_test();
    ctx.add_member(5, Some("loner"), 50, None);

    let plan = Query::select([Selection::entity(&ctx.member), Selection::entity(&ctx.team)])
        .from(&ctx.member)
        .left_join(ctx.member.relation("team_id"), &ctx.team)
        .order_by(ctx.m("age").asc())
        .build()
        .unwrap();
    let tuples = ctx.fetch_all(&plan);
    assert_eq!(tuples.len(), 5);

    let last = &tuples[4];
    assert_eq!(
        last.entity(0).unwrap().value::<String>("username").unwrap(),
        "loner"
    );
    assert!(last.entity(1).is_none());

    // inner join drops the member without a team
    let inner = Query::select_from(&ctx.member)
        .join(ctx.member.relation("team_id"), &ctx.team)
        .build()
        .unwrap();
    assert_eq!(ctx.executor.fetch_count(&inner).unwrap(), 4);
}

#[test]
fn test_left_join_with_on_condition() {
    let ctx = setup_test();
    let plan = Query::select([ctx.m("username"), ctx.t("name")])
        .from(&ctx.member)
        .left_join(ctx.member.relation("team_id"), &ctx.team)
        .on(ctx.t("name").eq("teamA"))
        .order_by(ctx.m("age").asc())
        .build()
        .unwrap();

    let rows: Vec<Vec<Value>> = ctx
        .fetch_all(&plan)
        .into_iter()
        .map(|t| t.into_values().unwrap())
        .collect();
    assert_eq!(
        rows,
        vec![
            vec![Value::string("member1"), Value::string("teamA")],
            vec![Value::string("member2"), Value::string("teamA")],
            vec![Value::string("member3"), Value::Null],
            vec![Value::string("member4"), Value::Null],
        ]
    );
}

#[test]
fn test_theta_join_between_unrelated_sources() {
    let ctx = setup_test();
    ctx.add_member(5, Some("teamA"), 50, None);
    ctx.add_member(6, Some("teamB"), 60, None);

    let plan = Query::select_from(&ctx.member)
        .from(&ctx.team)
        .filter(ctx.m("username").eq(ctx.t("name")))
        .order_by(ctx.m("age").asc())
        .build()
        .unwrap();
    assert_eq!(ctx.usernames(&plan), some(&["teamA", "teamB"]));
}

#[test]
fn test_join_on_explicit_condition() {
    let ctx = setup_test();
    ctx.add_member(5, Some("teamA"), 50, None);

    let plan = Query::select([ctx.m("username"), ctx.t("name")])
        .from(&ctx.member)
        .left_join_on(&ctx.team, ctx.m("username").eq(ctx.t("name")))
        .order_by(ctx.m("age").asc())
        .build()
        .unwrap();
    let names: Vec<Value> = ctx
        .fetch_all(&plan)
        .into_iter()
        .map(|t| t.value(1).cloned().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
            Value::string("teamA")
        ]
    );
}

#[test]
fn test_fetch_join_loads_reference() {
    let ctx = setup_test();
    let plan = Query::select_from(&ctx.member)
        .join(ctx.member.relation("team_id"), &ctx.team)
        .fetch_join()
        .filter(ctx.m("username").eq("member1"))
        .build()
        .unwrap();

    let members = ctx.fetch_entities(&plan);
    let member = &members[0];
    assert!(member.is_loaded("team_id"));
    let team = member.loaded("team_id").unwrap();
    assert_eq!(team.value::<String>("name").unwrap(), "teamA");
}

#[test]
fn test_plain_join_defers_reference() {
    let ctx = setup_test();
    let plan = Query::select_from(&ctx.member)
        .join(ctx.member.relation("team_id"), &ctx.team)
        .filter(ctx.m("username").eq("member3"))
        .build()
        .unwrap();

    let members = ctx.fetch_entities(&plan);
    let member = &members[0];
    assert!(!member.is_loaded("team_id"));
    assert_eq!(
        member.related("team_id"),
        Some(&Related::Deferred(Value::I64(2)))
    );

    let team = ctx
        .executor
        .load_related(member, "team_id")
        .unwrap()
        .unwrap();
    assert_eq!(team.value::<String>("name").unwrap(), "teamB");
}

#[test]
fn test_null_reference_counts_as_loaded() {
    let ctx = setup_test();
    ctx.add_member(5, Some("loner"), 50, None);
    let plan = Query::select_from(&ctx.member)
        .filter(ctx.m("username").eq("loner"))
        .build()
        .unwrap();

    let member = ctx.fetch_entities(&plan).remove(0);
    assert!(member.is_loaded("team_id"));
    assert_eq!(ctx.executor.load_related(&member, "team_id").unwrap(), None);

    let err = ctx.executor.load_related(&member, "age").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedExpression);
}

#[test]
fn test_invalid_joins() {
    let ctx = setup_test();

    // not a reference field
    let err = Query::select_from(&ctx.member)
        .join(ctx.member.relation("age"), &ctx.team)
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedExpression);

    // fetch on a non-relationship join
    let err = Query::select_from(&ctx.member)
        .join_on(&ctx.team, ctx.m("team_id").eq(ctx.t("id")))
        .fetch_join()
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedExpression);

    // relationship pointing at the wrong record type
    let other = ctx.fixture.member("other");
    let err = Query::select_from(&ctx.member)
        .join(ctx.member.relation("team_id"), &other)
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedExpression);
}

#[test]
fn test_explicit_join_requires_a_condition() {
    let ctx = setup_test();
    let team_name: Option<&str> = None;

    let err = Query::select_from(&ctx.member)
        .join_on(
            &ctx.team,
            Predicate::optional(team_name, |name| ctx.t("name").eq(name)),
        )
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedExpression);

    let err = Query::select_from(&ctx.member)
        .left_join_on(&ctx.team, Predicate::Absent)
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedExpression);

    // a condition added later through on() satisfies it
    let plan = Query::select_from(&ctx.member)
        .join_on(
            &ctx.team,
            Predicate::optional(team_name, |name| ctx.t("name").eq(name)),
        )
        .on(ctx.m("team_id").eq(ctx.t("id")))
        .build()
        .unwrap();
    assert_eq!(ctx.executor.fetch_count(&plan).unwrap(), 4);

    // the unconditional join has to be asked for
    let plan = Query::select_from(&ctx.member)
        .cross_join(&ctx.team)
        .build()
        .unwrap();
    assert_eq!(ctx.executor.fetch_count(&plan).unwrap(), 8);
}
