use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coordination::database::{JourneyRepo, Result};
use model::{
    journey::{Journey, JourneyStatus},
    route::Route,
    WithId,
};
use sqlx::prelude::FromRow;
use utility::id::Id;

use crate::{
    queries::journey::{
        advance_stop_sequence, find_open, get, insert, set_status, touch_ping,
    },
    PgDatabaseAutocommit, PgDatabaseTransaction,
};

use super::DatabaseRow;

#[derive(Debug, Clone, FromRow)]
pub struct JourneyRow {
    pub id: String,
    pub route_id: String,
    pub current_stop_sequence: i32,
    pub status: String,
    pub last_ping_time: DateTime<Utc>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DatabaseRow for JourneyRow {
    type Model = Journey;

    fn get_id(&self) -> Id<Self::Model> {
        Id::new(self.id.clone())
    }

    fn to_model(self) -> Self::Model {
        Journey {
            route_id: Id::new(self.route_id),
            current_stop_sequence: self.current_stop_sequence,
            status: JourneyStatus::parse(&self.status)
                // rows with an unknown status cannot be boarded
                .unwrap_or(JourneyStatus::Cancelled),
            last_ping_time: self.last_ping_time,
            created_by: Id::new(self.created_by),
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
        }
    }
}

// Repo

#[async_trait]
impl JourneyRepo for PgDatabaseAutocommit {
    async fn journey(&mut self, id: &Id<Journey>) -> Result<WithId<Journey>> {
        get(&self.pool, id).await
    }

    async fn find_open_journey(
        &mut self,
        route: &Id<Route>,
        before_sequence: i32,
    ) -> Result<Option<WithId<Journey>>> {
        find_open(&self.pool, route, before_sequence).await
    }

    async fn insert_journey(&mut self, journey: Journey) -> Result<WithId<Journey>> {
        insert(&self.pool, journey).await
    }

    async fn touch_ping(
        &mut self,
        id: &Id<Journey>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        touch_ping(&self.pool, id, at).await
    }

    async fn advance_stop_sequence(
        &mut self,
        id: &Id<Journey>,
        sequence: i32,
        at: DateTime<Utc>,
    ) -> Result<()> {
        advance_stop_sequence(&self.pool, id, sequence, at).await
    }

    async fn set_journey_status(
        &mut self,
        id: &Id<Journey>,
        status: JourneyStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        set_status(&self.pool, id, status, completed_at).await
    }
}

#[async_trait]
impl<'a> JourneyRepo for PgDatabaseTransaction<'a> {
    async fn journey(&mut self, id: &Id<Journey>) -> Result<WithId<Journey>> {
        get(&mut *self.tx, id).await
    }

    async fn find_open_journey(
        &mut self,
        route: &Id<Route>,
        before_sequence: i32,
    ) -> Result<Option<WithId<Journey>>> {
        find_open(&mut *self.tx, route, before_sequence).await
    }

    async fn insert_journey(&mut self, journey: Journey) -> Result<WithId<Journey>> {
        insert(&mut *self.tx, journey).await
    }

    async fn touch_ping(
        &mut self,
        id: &Id<Journey>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        touch_ping(&mut *self.tx, id, at).await
    }

    async fn advance_stop_sequence(
        &mut self,
        id: &Id<Journey>,
        sequence: i32,
        at: DateTime<Utc>,
    ) -> Result<()> {
        advance_stop_sequence(&mut *self.tx, id, sequence, at).await
    }

    async fn set_journey_status(
        &mut self,
        id: &Id<Journey>,
        status: JourneyStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        set_status(&mut *self.tx, id, status, completed_at).await
    }
}
