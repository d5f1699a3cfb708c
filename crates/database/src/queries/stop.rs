use coordination::database::Result;
use model::{route::Route, stop::Stop, WithId};
use sqlx::{Executor, Postgres};
use utility::id::Id;

use crate::data_model::{stop::StopRow, with_id, with_ids};

use super::convert_error;

pub async fn get<'c, E>(executor: E, id: &Id<Stop>) -> Result<WithId<Stop>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as(
        "
        SELECT id, name, latitude, longitude, address, route_id, sequence
        FROM stops
        WHERE id = $1;
        ",
    )
    .bind(id.raw_ref::<str>())
    .fetch_one(executor)
    .await
    .map(|row: StopRow| with_id(row))
    .map_err(convert_error)
}

pub async fn on_route<'c, E>(
    executor: E,
    route: &Id<Route>,
) -> Result<Vec<WithId<Stop>>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as(
        "
        SELECT id, name, latitude, longitude, address, route_id, sequence
        FROM stops
        WHERE route_id = $1
        ORDER BY sequence;
        ",
    )
    .bind(route.raw_ref::<str>())
    .fetch_all(executor)
    .await
    .map(|rows: Vec<StopRow>| with_ids(rows))
    .map_err(convert_error)
}
