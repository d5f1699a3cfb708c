use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coordination::database::{Result, WaitingRepo};
use model::{
    journey::Journey, stop::Stop, waiting::WaitingRecord, Rider, TransportType, WithId,
};
use sqlx::prelude::FromRow;
use utility::id::Id;

use crate::{
    queries::waiting::{at_stop, delete, delete_for_journey, for_rider, upsert},
    PgDatabaseAutocommit, PgDatabaseTransaction,
};

use super::DatabaseRow;

#[derive(Debug, Clone, FromRow)]
pub struct WaitingRecordRow {
    pub id: String,
    pub stop_id: String,
    pub user_id: String,
    pub route_id: String,
    pub journey_id: Option<String>,
    pub transport_type: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl DatabaseRow for WaitingRecordRow {
    type Model = WaitingRecord;

    fn get_id(&self) -> Id<Self::Model> {
        Id::new(self.id.clone())
    }

    fn to_model(self) -> Self::Model {
        WaitingRecord {
            stop_id: Id::new(self.stop_id),
            user_id: Id::new(self.user_id),
            route_id: Id::new(self.route_id),
            journey_id: self.journey_id.map(Id::new),
            transport_type: TransportType::parse(&self.transport_type)
                .unwrap_or(TransportType::Bus),
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

// Repo

#[async_trait]
impl WaitingRepo for PgDatabaseAutocommit {
    async fn upsert_waiting(
        &mut self,
        record: WaitingRecord,
    ) -> Result<WithId<WaitingRecord>> {
        upsert(&self.pool, record).await
    }

    async fn delete_waiting(
        &mut self,
        rider: &Id<Rider>,
        stop: &Id<Stop>,
    ) -> Result<u64> {
        delete(&self.pool, rider, stop).await
    }

    async fn delete_waiting_for_journey(
        &mut self,
        rider: &Id<Rider>,
        journey: &Id<Journey>,
    ) -> Result<u64> {
        delete_for_journey(&self.pool, rider, journey).await
    }

    async fn waiting_at_stop(
        &mut self,
        stop: &Id<Stop>,
        now: DateTime<Utc>,
    ) -> Result<Vec<WithId<WaitingRecord>>> {
        at_stop(&self.pool, stop, now).await
    }

    async fn waiting_for_rider(
        &mut self,
        rider: &Id<Rider>,
        now: DateTime<Utc>,
    ) -> Result<Option<WithId<WaitingRecord>>> {
        for_rider(&self.pool, rider, now).await
    }
}

#[async_trait]
impl<'a> WaitingRepo for PgDatabaseTransaction<'a> {
    async fn upsert_waiting(
        &mut self,
        record: WaitingRecord,
    ) -> Result<WithId<WaitingRecord>> {
        upsert(&mut *self.tx, record).await
    }

    async fn delete_waiting(
        &mut self,
        rider: &Id<Rider>,
        stop: &Id<Stop>,
    ) -> Result<u64> {
        delete(&mut *self.tx, rider, stop).await
    }

    async fn delete_waiting_for_journey(
        &mut self,
        rider: &Id<Rider>,
        journey: &Id<Journey>,
    ) -> Result<u64> {
        delete_for_journey(&mut *self.tx, rider, journey).await
    }

    async fn waiting_at_stop(
        &mut self,
        stop: &Id<Stop>,
        now: DateTime<Utc>,
    ) -> Result<Vec<WithId<WaitingRecord>>> {
        at_stop(&mut *self.tx, stop, now).await
    }

    async fn waiting_for_rider(
        &mut self,
        rider: &Id<Rider>,
        now: DateTime<Utc>,
    ) -> Result<Option<WithId<WaitingRecord>>> {
        for_rider(&mut *self.tx, rider, now).await
    }
}
