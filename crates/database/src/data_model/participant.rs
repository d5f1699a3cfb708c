use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coordination::database::{ParticipantRepo, Result};
use model::{
    journey::{Journey, JourneyParticipant},
    Rider, WithId,
};
use sqlx::prelude::FromRow;
use utility::id::Id;

use crate::{
    queries::participant::{active_for_journey, active_for_rider, delete, upsert},
    PgDatabaseAutocommit, PgDatabaseTransaction,
};

use super::DatabaseRow;

#[derive(Debug, Clone, FromRow)]
pub struct JourneyParticipantRow {
    pub id: String,
    pub journey_id: String,
    pub user_id: String,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
}

impl DatabaseRow for JourneyParticipantRow {
    type Model = JourneyParticipant;

    fn get_id(&self) -> Id<Self::Model> {
        Id::new(self.id.clone())
    }

    fn to_model(self) -> Self::Model {
        JourneyParticipant {
            journey_id: Id::new(self.journey_id),
            user_id: Id::new(self.user_id),
            is_active: self.is_active,
            joined_at: self.joined_at,
        }
    }
}

// Repo

#[async_trait]
impl ParticipantRepo for PgDatabaseAutocommit {
    async fn upsert_participant(
        &mut self,
        participant: JourneyParticipant,
    ) -> Result<WithId<JourneyParticipant>> {
        upsert(&self.pool, participant).await
    }

    async fn delete_participant(
        &mut self,
        journey: &Id<Journey>,
        rider: &Id<Rider>,
    ) -> Result<u64> {
        delete(&self.pool, journey, rider).await
    }

    async fn active_participants(
        &mut self,
        journey: &Id<Journey>,
    ) -> Result<Vec<WithId<JourneyParticipant>>> {
        active_for_journey(&self.pool, journey).await
    }

    async fn active_participation_for(
        &mut self,
        rider: &Id<Rider>,
    ) -> Result<Option<WithId<JourneyParticipant>>> {
        active_for_rider(&self.pool, rider).await
    }
}

#[async_trait]
impl<'a> ParticipantRepo for PgDatabaseTransaction<'a> {
    async fn upsert_participant(
        &mut self,
        participant: JourneyParticipant,
    ) -> Result<WithId<JourneyParticipant>> {
        upsert(&mut *self.tx, participant).await
    }

    async fn delete_participant(
        &mut self,
        journey: &Id<Journey>,
        rider: &Id<Rider>,
    ) -> Result<u64> {
        delete(&mut *self.tx, journey, rider).await
    }

    async fn active_participants(
        &mut self,
        journey: &Id<Journey>,
    ) -> Result<Vec<WithId<JourneyParticipant>>> {
        active_for_journey(&mut *self.tx, journey).await
    }

    async fn active_participation_for(
        &mut self,
        rider: &Id<Rider>,
    ) -> Result<Option<WithId<JourneyParticipant>>> {
        active_for_rider(&mut *self.tx, rider).await
    }
}
