use chrono::{DateTime, Utc};
use coordination::database::{DatabaseError, Result};
use model::{
    journey::{Journey, JourneyStatus},
    route::Route,
    WithId,
};
use sqlx::{Executor, Postgres};
use utility::id::Id;

use crate::data_model::{journey::JourneyRow, with_id};

use super::convert_error;

pub async fn get<'c, E>(executor: E, id: &Id<Journey>) -> Result<WithId<Journey>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as(
        "
        SELECT
            id, route_id, current_stop_sequence, status, last_ping_time,
            created_by, created_at, updated_at, completed_at
        FROM
            journeys
        WHERE id = $1;
        ",
    )
    .bind(id.raw_ref::<str>())
    .fetch_one(executor)
    .await
    .map(|row: JourneyRow| with_id(row))
    .map_err(convert_error)
}

pub async fn find_open<'c, E>(
    executor: E,
    route: &Id<Route>,
    before_sequence: i32,
) -> Result<Option<WithId<Journey>>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as(
        "
        SELECT
            id, route_id, current_stop_sequence, status, last_ping_time,
            created_by, created_at, updated_at, completed_at
        FROM
            journeys
        WHERE
            route_id = $1
            AND status = 'in_progress'
            AND current_stop_sequence < $2
        ORDER BY created_at DESC
        LIMIT 1;
        ",
    )
    .bind(route.raw_ref::<str>())
    .bind(before_sequence)
    .fetch_optional(executor)
    .await
    .map(|row: Option<JourneyRow>| row.map(with_id))
    .map_err(convert_error)
}

pub async fn insert<'c, E>(executor: E, journey: Journey) -> Result<WithId<Journey>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as(
        "
        INSERT INTO journeys(
            route_id,
            current_stop_sequence,
            status,
            last_ping_time,
            created_by,
            created_at,
            updated_at,
            completed_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING
            id, route_id, current_stop_sequence, status, last_ping_time,
            created_by, created_at, updated_at, completed_at;
        ",
    )
    .bind(journey.route_id.raw())
    .bind(journey.current_stop_sequence)
    .bind(journey.status.as_str())
    .bind(journey.last_ping_time)
    .bind(journey.created_by.raw())
    .bind(journey.created_at)
    .bind(journey.updated_at)
    .bind(journey.completed_at)
    .fetch_one(executor)
    .await
    .map(|row: JourneyRow| with_id(row))
    .map_err(convert_error)
}

pub async fn touch_ping<'c, E>(
    executor: E,
    id: &Id<Journey>,
    at: DateTime<Utc>,
) -> Result<()>
where
    E: Executor<'c, Database = Postgres>,
{
    let result = sqlx::query(
        "
        UPDATE journeys
        SET last_ping_time = $2, updated_at = $2
        WHERE id = $1;
        ",
    )
    .bind(id.raw_ref::<str>())
    .bind(at)
    .execute(executor)
    .await
    .map_err(convert_error)?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound);
    }
    Ok(())
}

pub async fn advance_stop_sequence<'c, E>(
    executor: E,
    id: &Id<Journey>,
    sequence: i32,
    at: DateTime<Utc>,
) -> Result<()>
where
    E: Executor<'c, Database = Postgres>,
{
    let result = sqlx::query(
        "
        UPDATE journeys
        SET current_stop_sequence = $2, last_ping_time = $3, updated_at = $3
        WHERE id = $1;
        ",
    )
    .bind(id.raw_ref::<str>())
    .bind(sequence)
    .bind(at)
    .execute(executor)
    .await
    .map_err(convert_error)?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound);
    }
    Ok(())
}

pub async fn set_status<'c, E>(
    executor: E,
    id: &Id<Journey>,
    status: JourneyStatus,
    completed_at: Option<DateTime<Utc>>,
) -> Result<()>
where
    E: Executor<'c, Database = Postgres>,
{
    let result = sqlx::query(
        "
        UPDATE journeys
        SET status = $2, completed_at = $3, updated_at = NOW()
        WHERE id = $1;
        ",
    )
    .bind(id.raw_ref::<str>())
    .bind(status.as_str())
    .bind(completed_at)
    .execute(executor)
    .await
    .map_err(convert_error)?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound);
    }
    Ok(())
}
