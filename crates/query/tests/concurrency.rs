//! Shared plans and executors across threads

mod common;

use common::setup_test;
use querykit::{Expr, Query, Update};
use std::sync::Arc;
use std::thread;

#[test]
fn test_plans_execute_concurrently() {
    let ctx = setup_test();
    let plan = Arc::new(
        Query::select([Expr::count_all(), ctx.m("age").sum().unwrap()])
            .from(&ctx.member)
            .build()
            .unwrap(),
    );
    let bump = Update::table(&ctx.member)
        .set(ctx.m("age"), ctx.m("age").add(1))
        .filter(ctx.m("age").ge(0))
        .build()
        .unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let executor = ctx.executor.clone();
            let plan = Arc::clone(&plan);
            thread::spawn(move || {
                for _ in 0..50 {
                    let tuple = executor.fetch_one(&plan).unwrap().unwrap();
                    assert_eq!(tuple.get::<i64>(0).unwrap(), 4);
                    // every update bumps all four rows at once
                    let sum = tuple.get::<i64>(1).unwrap();
                    assert_eq!((sum - 100) % 4, 0);
                }
            })
        })
        .collect();

    let writer = {
        let executor = ctx.executor.clone();
        thread::spawn(move || {
            for _ in 0..20 {
                assert_eq!(executor.update(&bump).unwrap(), 4);
            }
        })
    };

    for reader in readers {
        reader.join().unwrap();
    }
    writer.join().unwrap();

    let tuple = ctx.executor.fetch_one(&plan).unwrap().unwrap();
    assert_eq!(tuple.get::<i64>(1).unwrap(), 180);
}

#[test]
fn test_concurrent_inserts_and_reads() {
    let ctx = setup_test();
    let plan = Arc::new(Query::select([Expr::count_all()]).from(&ctx.member).build().unwrap());
    let store = Arc::clone(&ctx.fixture.store);

    let writer = thread::spawn(move || {
        for id in 5..25i64 {
            store
                .insert(
                    "Member",
                    vec![id.into(), format!("member{}", id).into(), 1i32.into(), None::<i64>.into()],
                )
                .unwrap();
        }
    });

    let executor = ctx.executor.clone();
    let reader_plan = Arc::clone(&plan);
    let reader = thread::spawn(move || {
        let mut last = 0;
        for _ in 0..50 {
            let count = executor.fetch_values::<i64>(&reader_plan).unwrap()[0];
            assert!(count >= last);
            last = count;
        }
    });

    writer.join().unwrap();
    reader.join().unwrap();
    assert_eq!(ctx.executor.fetch_values::<i64>(&plan).unwrap(), vec![24]);
}
