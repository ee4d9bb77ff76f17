//! Common test utilities for query integration tests
#![allow(dead_code)]

use querykit::{
    EngineConfig, Entity, Executor, Expr, Fixture, QueryPlan, Source, Tuple, Value,
};

/// Test context holding a seeded store, an executor and the usual aliases
pub struct TestContext {
    pub fixture: Fixture,
    pub executor: Executor,
    /// `Member` as `member`
    pub member: Source,
    /// `Team` as `team`
    pub team: Source,
}

impl TestContext {
    fn from_fixture(fixture: Fixture, config: EngineConfig) -> Self {
        let executor = fixture.executor_with(config);
        let member = fixture.member("member");
        let team = fixture.team("team");
        Self {
            fixture,
            executor,
            member,
            team,
        }
    }

    /// Column of the `member` source
    pub fn m(&self, field: &str) -> Expr {
        self.member.col(field).unwrap()
    }

    /// Column of the `team` source
    pub fn t(&self, field: &str) -> Expr {
        self.team.col(field).unwrap()
    }

    pub fn add_member(&self, id: i64, username: Option<&str>, age: i32, team: Option<i64>) {
        self.fixture
            .insert_member(id, username, age, team)
            .unwrap();
    }

    pub fn fetch_all(&self, plan: &QueryPlan) -> Vec<Tuple> {
        self.executor.fetch_all(plan).unwrap()
    }

    pub fn fetch_entities(&self, plan: &QueryPlan) -> Vec<Entity> {
        self.executor.fetch_entities(plan).unwrap()
    }

    /// Usernames of a query selecting the member entity
    pub fn usernames(&self, plan: &QueryPlan) -> Vec<Option<String>> {
        self.fetch_entities(plan)
            .iter()
            .map(|m| m.value::<Option<String>>("username").unwrap())
            .collect()
    }

    /// Values of the first column of every tuple
    pub fn column(&self, plan: &QueryPlan) -> Vec<Value> {
        self.fetch_all(plan)
            .into_iter()
            .map(|t| t.value(0).cloned().unwrap())
            .collect()
    }
}

/// `teamA`/`teamB` with `member1..member4` aged 10, 20, 30, 40
pub fn setup_test() -> TestContext {
    TestContext::from_fixture(Fixture::basic().unwrap(), EngineConfig::default())
}

/// Same data, strict engine configuration
pub fn setup_strict() -> TestContext {
    TestContext::from_fixture(Fixture::basic().unwrap(), EngineConfig::strict())
}

/// Empty tables
pub fn setup_empty() -> TestContext {
    TestContext::from_fixture(Fixture::new().unwrap(), EngineConfig::default())
}

pub fn some(names: &[&str]) -> Vec<Option<String>> {
    names.iter().map(|n| Some(n.to_string())).collect()
}
