use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coordination::database::{DriverJourneyRepo, Result};
use model::{
    journey::{CompletedJourney, DriverJourney, Journey, JourneyStatus},
    Rider, WithId,
};
use sqlx::prelude::FromRow;
use utility::id::Id;

use crate::{
    queries::driver::{completed_delete, completed_get, get, set_status},
    PgDatabaseAutocommit, PgDatabaseTransaction,
};

use super::DatabaseRow;

#[derive(Debug, Clone, FromRow)]
pub struct DriverJourneyRow {
    pub id: String,
    pub journey_id: String,
    pub driver_id: String,
    pub status: String,
}

impl DatabaseRow for DriverJourneyRow {
    type Model = DriverJourney;

    fn get_id(&self) -> Id<Self::Model> {
        Id::new(self.id.clone())
    }

    fn to_model(self) -> Self::Model {
        DriverJourney {
            journey_id: Id::new(self.journey_id),
            driver_id: Id::new(self.driver_id),
            status: JourneyStatus::parse(&self.status)
                .unwrap_or(JourneyStatus::Cancelled),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CompletedJourneyRow {
    pub id: String,
    pub journey_id: String,
    pub user_id: String,
    pub completed_at: DateTime<Utc>,
}

impl DatabaseRow for CompletedJourneyRow {
    type Model = CompletedJourney;

    fn get_id(&self) -> Id<Self::Model> {
        Id::new(self.id.clone())
    }

    fn to_model(self) -> Self::Model {
        CompletedJourney {
            journey_id: Id::new(self.journey_id),
            user_id: Id::new(self.user_id),
            completed_at: self.completed_at,
        }
    }
}

// Repo

#[async_trait]
impl DriverJourneyRepo for PgDatabaseAutocommit {
    async fn driver_journey(
        &mut self,
        journey: &Id<Journey>,
        driver: &Id<Rider>,
    ) -> Result<Option<WithId<DriverJourney>>> {
        get(&self.pool, journey, driver).await
    }

    async fn set_driver_journey_status(
        &mut self,
        id: &Id<DriverJourney>,
        status: JourneyStatus,
    ) -> Result<()> {
        set_status(&self.pool, id, status).await
    }

    async fn completed_journey(
        &mut self,
        journey: &Id<Journey>,
        rider: &Id<Rider>,
    ) -> Result<Option<WithId<CompletedJourney>>> {
        completed_get(&self.pool, journey, rider).await
    }

    async fn delete_completed_journey(
        &mut self,
        journey: &Id<Journey>,
        rider: &Id<Rider>,
    ) -> Result<u64> {
        completed_delete(&self.pool, journey, rider).await
    }
}

#[async_trait]
impl<'a> DriverJourneyRepo for PgDatabaseTransaction<'a> {
    async fn driver_journey(
        &mut self,
        journey: &Id<Journey>,
        driver: &Id<Rider>,
    ) -> Result<Option<WithId<DriverJourney>>> {
        get(&mut *self.tx, journey, driver).await
    }

    async fn set_driver_journey_status(
        &mut self,
        id: &Id<DriverJourney>,
        status: JourneyStatus,
    ) -> Result<()> {
        set_status(&mut *self.tx, id, status).await
    }

    async fn completed_journey(
        &mut self,
        journey: &Id<Journey>,
        rider: &Id<Rider>,
    ) -> Result<Option<WithId<CompletedJourney>>> {
        completed_get(&mut *self.tx, journey, rider).await
    }

    async fn delete_completed_journey(
        &mut self,
        journey: &Id<Journey>,
        rider: &Id<Rider>,
    ) -> Result<u64> {
        completed_delete(&mut *self.tx, journey, rider).await
    }
}
