use chrono::{DateTime, Utc};
use coordination::database::Result;
use model::{
    journey::Journey, stop::Stop, waiting::WaitingRecord, Rider, WithId,
};
use sqlx::{Executor, Postgres};
use utility::id::{Id, IdWrapper};

use crate::data_model::{waiting::WaitingRecordRow, with_id, with_ids};

use super::convert_error;

pub async fn upsert<'c, E>(
    executor: E,
    record: WaitingRecord,
) -> Result<WithId<WaitingRecord>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as(
        "
        INSERT INTO waiting_records(
            stop_id, user_id, route_id, journey_id,
            transport_type, created_at, expires_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (user_id, stop_id)
        DO UPDATE SET
            route_id = EXCLUDED.route_id,
            journey_id = EXCLUDED.journey_id,
            transport_type = EXCLUDED.transport_type,
            created_at = EXCLUDED.created_at,
            expires_at = EXCLUDED.expires_at
        RETURNING
            id, stop_id, user_id, route_id, journey_id,
            transport_type, created_at, expires_at;
        ",
    )
    .bind(record.stop_id.raw())
    .bind(record.user_id.raw())
    .bind(record.route_id.raw())
    .bind(record.journey_id.raw())
    .bind(record.transport_type.as_str())
    .bind(record.created_at)
    .bind(record.expires_at)
    .fetch_one(executor)
    .await
    .map(|row: WaitingRecordRow| with_id(row))
    .map_err(convert_error)
}

pub async fn delete<'c, E>(
    executor: E,
    rider: &Id<Rider>,
    stop: &Id<Stop>,
) -> Result<u64>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query(
        "
        DELETE FROM waiting_records
        WHERE user_id = $1 AND stop_id = $2;
        ",
    )
    .bind(rider.raw_ref::<str>())
    .bind(stop.raw_ref::<str>())
    .execute(executor)
    .await
    .map(|result| result.rows_affected())
    .map_err(convert_error)
}

pub async fn delete_for_journey<'c, E>(
    executor: E,
    rider: &Id<Rider>,
    journey: &Id<Journey>,
) -> Result<u64>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query(
        "
        DELETE FROM waiting_records
        WHERE user_id = $1 AND journey_id = $2;
        ",
    )
    .bind(rider.raw_ref::<str>())
    .bind(journey.raw_ref::<str>())
    .execute(executor)
    .await
    .map(|result| result.rows_affected())
    .map_err(convert_error)
}

pub async fn at_stop<'c, E>(
    executor: E,
    stop: &Id<Stop>,
    now: DateTime<Utc>,
) -> Result<Vec<WithId<WaitingRecord>>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as(
        "
        SELECT
            id, stop_id, user_id, route_id, journey_id,
            transport_type, created_at, expires_at
        FROM waiting_records
        WHERE stop_id = $1 AND expires_at > $2
        ORDER BY created_at;
        ",
    )
    .bind(stop.raw_ref::<str>())
    .bind(now)
    .fetch_all(executor)
    .await
    .map(|rows: Vec<WaitingRecordRow>| with_ids(rows))
    .map_err(convert_error)
}

pub async fn for_rider<'c, E>(
    executor: E,
    rider: &Id<Rider>,
    now: DateTime<Utc>,
) -> Result<Option<WithId<WaitingRecord>>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as(
        "
        SELECT
            id, stop_id, user_id, route_id, journey_id,
            transport_type, created_at, expires_at
        FROM waiting_records
        WHERE user_id = $1 AND expires_at > $2
        ORDER BY created_at DESC
        LIMIT 1;
        ",
    )
    .bind(rider.raw_ref::<str>())
    .bind(now)
    .fetch_optional(executor)
    .await
    .map(|row: Option<WaitingRecordRow>| row.map(with_id))
    .map_err(convert_error)
}
