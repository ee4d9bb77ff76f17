//! Binding results to typed output structs

mod common;

use common::setup_test;
use querykit::{
    Bindable, Constructor, DataType, ErrorKind, ExecutionState, Expr, FieldMapping, FromValue,
    OutputField, Query, Result, Value,
};

#[derive(Debug, PartialEq)]
struct MemberDto {
    username: Option<String>,
    age: i32,
}

impl Bindable for MemberDto {
    const FIELDS: &'static [OutputField] = &[
        OutputField::nullable("username", DataType::Str),
        OutputField::required("age", DataType::I32),
    ];

    fn from_values(values: Vec<Value>) -> Result<Self> {
        let mut values = values.into_iter();
        Ok(MemberDto {
            username: FromValue::from_value(values.next().unwrap_or(Value::Null))?,
            age: FromValue::from_value(values.next().unwrap_or(Value::Null))?,
        })
    }
}

#[derive(Debug, PartialEq)]
struct UserDto {
    name: Option<String>,
    age: i32,
}

impl Bindable for UserDto {
    const FIELDS: &'static [OutputField] = &[
        OutputField::nullable("name", DataType::Str),
        OutputField::required("age", DataType::I32),
    ];

    fn from_values(values: Vec<Value>) -> Result<Self> {
        let mut values = values.into_iter();
        Ok(UserDto {
            name: FromValue::from_value(values.next().unwrap_or(Value::Null))?,
            age: FromValue::from_value(values.next().unwrap_or(Value::Null))?,
        })
    }
}

fn member(username: &str, age: i32) -> MemberDto {
    MemberDto {
        username: Some(username.to_string()),
        age,
    }
}

#[test]
fn test_field_mapping() {
    let ctx = setup_test();
    let binder = FieldMapping::<MemberDto>::new()
        .map("username", ctx.m("username"))
        .unwrap()
        .map("age", ctx.m("age"))
        .unwrap()
        .build()
        .unwrap();

    let plan = Query::select(binder.selections())
        .from(&ctx.member)
        .order_by(ctx.m("age").asc())
        .limit(2)
        .build()
        .unwrap();
    let dtos = ctx.executor.fetch_as(&plan, &binder).unwrap();
    assert_eq!(dtos, vec![member("member1", 10), member("member2", 20)]);
}

#[test]
fn test_constructor() {
    let ctx = setup_test();
    let binder = Constructor::<MemberDto>::new([ctx.m("username"), ctx.m("age")]).unwrap();
    let plan = Query::select(binder.selections())
        .from(&ctx.member)
        .filter(ctx.m("age").ge(30))
        .order_by(ctx.m("age").desc())
        .build()
        .unwrap();
    let dtos = ctx.executor.fetch_as(&plan, &binder).unwrap();
    assert_eq!(dtos, vec![member("member4", 40), member("member3", 30)]);
}

#[test]
fn test_mapping_renamed_fields_and_subqueries() {
    let ctx = setup_test();
    let sub = ctx.fixture.member("memberSub");
    let oldest = Query::select([sub.col("age").unwrap().max()])
        .from(&sub)
        .build_subquery()
        .unwrap();

    let binder = FieldMapping::<UserDto>::new()
        .map("name", ctx.m("username"))
        .unwrap()
        .map("age", Expr::subquery(oldest))
        .unwrap()
        .build()
        .unwrap();
    let plan = Query::select(binder.selections())
        .from(&ctx.member)
        .order_by(ctx.m("age").asc())
        .build()
        .unwrap();

    let tuples = ctx.fetch_all(&plan);
    assert_eq!(tuples[0].labels(), ["name", "age"]);

    let dtos = ctx.executor.fetch_as(&plan, &binder).unwrap();
    assert_eq!(dtos.len(), 4);
    assert!(dtos.iter().all(|dto| dto.age == 40));
    assert_eq!(dtos[0].name.as_deref(), Some("member1"));
}

#[test]
fn test_unmapped_nullable_field() {
    let ctx = setup_test();
    let binder = FieldMapping::<UserDto>::new()
        .map("age", ctx.m("age"))
        .unwrap()
        .build()
        .unwrap();
    let plan = Query::select(binder.selections())
        .from(&ctx.member)
        .filter(ctx.m("age").eq(10))
        .build()
        .unwrap();
    let dtos = ctx.executor.fetch_as(&plan, &binder).unwrap();
    assert_eq!(dtos, vec![UserDto { name: None, age: 10 }]);
}

#[test]
fn test_projection_errors() {
    let ctx = setup_test();

    let err = FieldMapping::<MemberDto>::new()
        .map("nickname", ctx.m("username"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProjectionArityMismatch);

    let err = FieldMapping::<MemberDto>::new()
        .map("age", ctx.m("username"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProjectionTypeMismatch);

    let err = FieldMapping::<MemberDto>::new()
        .map("username", ctx.m("username"))
        .unwrap()
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProjectionArityMismatch);

    let err = Constructor::<MemberDto>::new([ctx.m("username")]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProjectionArityMismatch);

    // binder against a query with a different shape
    let binder = Constructor::<MemberDto>::new([ctx.m("username"), ctx.m("age")]).unwrap();
    let plan = Query::select([ctx.m("username")])
        .from(&ctx.member)
        .build()
        .unwrap();
    let err = ctx.executor.fetch_as(&plan, &binder).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProjectionArityMismatch);
}

#[test]
fn test_null_into_required_field() {
    let ctx = setup_test();
    let team = ctx.fixture.team("t");
    // left join leaves the team id NULL for member5
    ctx.add_member(5, Some("member5"), 50, None);

    #[derive(Debug)]
    struct TeamOf {
        #[allow(dead_code)]
        team_id: i64,
    }
    impl Bindable for TeamOf {
        const FIELDS: &'static [OutputField] = &[OutputField::required("team_id", DataType::I64)];

        fn from_values(values: Vec<Value>) -> Result<Self> {
            let value = values.into_iter().next().unwrap_or(Value::Null);
            Ok(TeamOf {
                team_id: FromValue::from_value(value)?,
            })
        }
    }

    let binder = Constructor::<TeamOf>::new([team.col("id").unwrap()]).unwrap();
    let plan = Query::select(binder.selections())
        .from(&ctx.member)
        .left_join(ctx.member.relation("team_id"), &team)
        .order_by(ctx.m("age").asc())
        .build()
        .unwrap();
    let mut execution = ctx.executor.execution(&plan);
    let err = execution.fetch_as(&binder).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProjectionTypeMismatch);
    assert_eq!(
        execution.state(),
        ExecutionState::Failed(ErrorKind::ProjectionTypeMismatch)
    );
}
