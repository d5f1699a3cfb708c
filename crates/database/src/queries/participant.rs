use coordination::database::Result;
use model::{
    journey::{Journey, JourneyParticipant},
    Rider, WithId,
};
use sqlx::{Executor, Postgres};
use utility::id::Id;

use crate::data_model::{participant::JourneyParticipantRow, with_id, with_ids};

use super::convert_error;

pub async fn upsert<'c, E>(
    executor: E,
    participant: JourneyParticipant,
) -> Result<WithId<JourneyParticipant>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as(
        "
        INSERT INTO journey_participants(journey_id, user_id, is_active, joined_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (journey_id, user_id)
        DO UPDATE SET is_active = TRUE
        RETURNING id, journey_id, user_id, is_active, joined_at;
        ",
    )
    .bind(participant.journey_id.raw())
    .bind(participant.user_id.raw())
    .bind(participant.is_active)
    .bind(participant.joined_at)
    .fetch_one(executor)
    .await
    .map(|row: JourneyParticipantRow| with_id(row))
    .map_err(convert_error)
}

pub async fn delete<'c, E>(
    executor: E,
    journey: &Id<Journey>,
    rider: &Id<Rider>,
) -> Result<u64>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query(
        "
        DELETE FROM journey_participants
        WHERE journey_id = $1 AND user_id = $2;
        ",
    )
    .bind(journey.raw_ref::<str>())
    .bind(rider.raw_ref::<str>())
    .execute(executor)
    .await
    .map(|result| result.rows_affected())
    .map_err(convert_error)
}

pub async fn active_for_journey<'c, E>(
    executor: E,
    journey: &Id<Journey>,
) -> Result<Vec<WithId<JourneyParticipant>>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as(
        "
        SELECT id, journey_id, user_id, is_active, joined_at
        FROM journey_participants
        WHERE journey_id = $1 AND is_active
        ORDER BY joined_at;
        ",
    )
    .bind(journey.raw_ref::<str>())
    .fetch_all(executor)
    .await
    .map(|rows: Vec<JourneyParticipantRow>| with_ids(rows))
    .map_err(convert_error)
}

pub async fn active_for_rider<'c, E>(
    executor: E,
    rider: &Id<Rider>,
) -> Result<Option<WithId<JourneyParticipant>>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as(
        "
        SELECT p.id, p.journey_id, p.user_id, p.is_active, p.joined_at
        FROM journey_participants p
        JOIN journeys j ON j.id = p.journey_id
        WHERE p.user_id = $1 AND p.is_active AND j.status = 'in_progress'
        ORDER BY p.joined_at DESC
        LIMIT 1;
        ",
    )
    .bind(rider.raw_ref::<str>())
    .fetch_optional(executor)
    .await
    .map(|row: Option<JourneyParticipantRow>| row.map(with_id))
    .map_err(convert_error)
}
