use coordination::database::{DatabaseError, Result};
use model::{
    journey::{CompletedJourney, DriverJourney, Journey, JourneyStatus},
    Rider, WithId,
};
use sqlx::{Executor, Postgres};
use utility::id::Id;

use crate::data_model::{
    driver::{CompletedJourneyRow, DriverJourneyRow},
    with_id,
};

use super::convert_error;

pub async fn get<'c, E>(
    executor: E,
    journey: &Id<Journey>,
    driver: &Id<Rider>,
) -> Result<Option<WithId<DriverJourney>>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as(
        "
        SELECT id, journey_id, driver_id, status
        FROM driver_journeys
        WHERE journey_id = $1 AND driver_id = $2;
        ",
    )
    .bind(journey.raw_ref::<str>())
    .bind(driver.raw_ref::<str>())
    .fetch_optional(executor)
    .await
    .map(|row: Option<DriverJourneyRow>| row.map(with_id))
    .map_err(convert_error)
}

pub async fn set_status<'c, E>(
    executor: E,
    id: &Id<DriverJourney>,
    status: JourneyStatus,
) -> Result<()>
where
    E: Executor<'c, Database = Postgres>,
{
    let result = sqlx::query(
        "
        UPDATE driver_journeys
        SET status = $2
        WHERE id = $1;
        ",
    )
    .bind(id.raw_ref::<str>())
    .bind(status.as_str())
    .execute(executor)
    .await
    .map_err(convert_error)?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound);
    }
    Ok(())
}

pub async fn completed_get<'c, E>(
    executor: E,
    journey: &Id<Journey>,
    rider: &Id<Rider>,
) -> Result<Option<WithId<CompletedJourney>>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as(
        "
        SELECT id, journey_id, user_id, completed_at
        FROM completed_journeys
        WHERE journey_id = $1 AND user_id = $2;
        ",
    )
    .bind(journey.raw_ref::<str>())
    .bind(rider.raw_ref::<str>())
    .fetch_optional(executor)
    .await
    .map(|row: Option<CompletedJourneyRow>| row.map(with_id))
    .map_err(convert_error)
}

pub async fn completed_delete<'c, E>(
    executor: E,
    journey: &Id<Journey>,
    rider: &Id<Rider>,
) -> Result<u64>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query(
        "
        DELETE FROM completed_journeys
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
