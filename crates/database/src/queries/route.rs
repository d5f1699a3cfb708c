use coordination::database::Result;
use model::{route::Route, WithId};
use sqlx::{Executor, Postgres};
use utility::id::Id;

use crate::data_model::{route::RouteRow, with_id};

use super::convert_error;

pub async fn get<'c, E>(executor: E, id: &Id<Route>) -> Result<WithId<Route>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as(
        "
        SELECT
            r.id,
            r.name,
            r.transport_type,
            COALESCE(
                array_agg(s.id ORDER BY s.sequence)
                    FILTER (WHERE s.id IS NOT NULL),
                '{}'
            ) AS stop_ids
        FROM routes r
        LEFT JOIN stops s ON s.route_id = r.id
        WHERE r.id = $1
        GROUP BY r.id;
        ",
    )
    .bind(id.raw_ref::<str>())
    .fetch_one(executor)
    .await
    .map(|row: RouteRow| with_id(row))
    .map_err(convert_error)
}
