use async_trait::async_trait;
use coordination::database::{Result, StopRepo};
use model::{
    route::Route,
    stop::{Location, Stop},
    WithId,
};
use sqlx::prelude::FromRow;
use utility::id::Id;

use crate::{
    queries::stop::{get, on_route},
    PgDatabaseAutocommit, PgDatabaseTransaction,
};

use super::DatabaseRow;

#[derive(Debug, Clone, FromRow)]
pub struct StopRow {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub route_id: String,
    pub sequence: i32,
}

impl DatabaseRow for StopRow {
    type Model = Stop;

    fn get_id(&self) -> Id<Self::Model> {
        Id::new(self.id.clone())
    }

    fn to_model(self) -> Self::Model {
        Stop {
            name: self.name,
            location: Location {
                latitude: self.latitude,
                longitude: self.longitude,
                address: self.address,
            },
            route_id: Id::new(self.route_id),
            sequence: self.sequence,
        }
    }
}

// Repo

#[async_trait]
impl StopRepo for PgDatabaseAutocommit {
    async fn stop(&mut self, id: &Id<Stop>) -> Result<WithId<Stop>> {
        get(&self.pool, id).await
    }

    async fn stops_on_route(
        &mut self,
        route: &Id<Route>,
    ) -> Result<Vec<WithId<Stop>>> {
        on_route(&self.pool, route).await
    }
}

#[async_trait]
impl<'a> StopRepo for PgDatabaseTransaction<'a> {
    async fn stop(&mut self, id: &Id<Stop>) -> Result<WithId<Stop>> {
        get(&mut *self.tx, id).await
    }

    async fn stops_on_route(
        &mut self,
        route: &Id<Route>,
    ) -> Result<Vec<WithId<Stop>>> {
        on_route(&mut *self.tx, route).await
    }
}
