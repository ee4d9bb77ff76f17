//! Member/Team demo data set
//!
//! Two record types: `Team(id, name)` and `Member(id, username, age,
//! team_id → Team.id)`, registered in a [`MemoryStore`].

use crate::config::EngineConfig;
use crate::error::Result;
use crate::execution::Executor;
use crate::store::{MemoryStore, RowId};
use crate::types::column::Source;
use crate::types::schema::{Field, RecordType};
use querykit_value::{DataType, Value};
use std::sync::Arc;

pub fn team_type() -> Result<RecordType> {
    RecordType::new(
        "Team",
        vec![
            Field::new("id", DataType::I64).primary_key(),
            Field::new("name", DataType::Str).nullable(false),
        ],
    )
}

pub fn member_type() -> Result<RecordType> {
    RecordType::new(
        "Member",
        vec![
            Field::new("id", DataType::I64).primary_key(),
            Field::new("username", DataType::Str),
            Field::new("age", DataType::I32).nullable(false),
            Field::new("team_id", DataType::I64).references("Team", "id"),
        ],
    )
}

/// A store holding the Member/Team schema.
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub team_type: Arc<RecordType>,
    pub member_type: Arc<RecordType>,
}

impl Fixture {
    /// Empty tables.
    pub fn new() -> Result<Self> {
        let store = Arc::new(MemoryStore::new());
        let team_type = store.register(team_type()?)?;
        let member_type = store.register(member_type()?)?;
        Ok(Fixture {
            store,
            team_type,
            member_type,
        })
    }

    /// `teamA`, `teamB` and `member1..member4` aged 10 to 40, the first two
    /// in `teamA`.
    pub fn basic() -> Result<Self> {
        let fixture = Self::new()?;
        fixture.insert_team(1, "teamA")?;
        fixture.insert_team(2, "teamB")?;
        fixture.insert_member(1, Some("member1"), 10, Some(1))?;
        fixture.insert_member(2, Some("member2"), 20, Some(1))?;
        fixture.insert_member(3, Some("member3"), 30, Some(2))?;
        fixture.insert_member(4, Some("member4"), 40, Some(2))?;
        Ok(fixture)
    }

    /// Two teams and `count` members `member{i}` aged `i`, alternating
    /// between the teams.
    pub fn demo(count: usize) -> Result<Self> {
        let fixture = Self::new()?;
        fixture.insert_team(1, "teamA")?;
        fixture.insert_team(2, "teamB")?;
        for i in 0..count {
            let age = i32::try_from(i).unwrap_or(i32::MAX);
            let team = if i % 2 == 0 { 1 } else { 2 };
            fixture.insert_member(i as i64 + 1, Some(&format!("member{}", i)), age, Some(team))?;
        }
        Ok(fixture)
    }

    pub fn insert_team(&self, id: i64, name: &str) -> Result<RowId> {
        self.store
            .insert("Team", vec![Value::I64(id), Value::string(name)])
    }

    pub fn insert_member(
        &self,
        id: i64,
        username: Option<&str>,
        age: i32,
        team_id: Option<i64>,
    ) -> Result<RowId> {
        self.store.insert(
            "Member",
            vec![
                Value::I64(id),
                username.into(),
                Value::I32(age),
                team_id.into(),
            ],
        )
    }

    pub fn member(&self, alias: &str) -> Source {
        Source::new(&self.member_type, alias)
    }

    pub fn team(&self, alias: &str) -> Source {
        Source::new(&self.team_type, alias)
    }

    pub fn executor(&self) -> Executor {
        Executor::new(self.store.clone())
    }

    pub fn executor_with(&self, config: EngineConfig) -> Executor {
        Executor::with_config(self.store.clone(), config)
    }
}
