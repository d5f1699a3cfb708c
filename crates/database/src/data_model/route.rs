use async_trait::async_trait;
use coordination::database::{Result, RouteRepo};
use model::{route::Route, TransportType, WithId};
use sqlx::prelude::FromRow;
use utility::id::Id;

use crate::{queries::route::get, PgDatabaseAutocommit, PgDatabaseTransaction};

use super::DatabaseRow;

#[derive(Debug, Clone, FromRow)]
pub struct RouteRow {
    pub id: String,
    pub name: String,
    pub transport_type: String,
    pub stop_ids: Vec<String>,
}

impl DatabaseRow for RouteRow {
    type Model = Route;

    fn get_id(&self) -> Id<Self::Model> {
        Id::new(self.id.clone())
    }

    fn to_model(self) -> Self::Model {
        Route {
            name: self.name,
            transport_type: TransportType::parse(&self.transport_type)
                .unwrap_or(TransportType::Bus),
            stop_ids: self.stop_ids.into_iter().map(Id::new).collect(),
        }
    }
}

// Repo

#[async_trait]
impl RouteRepo for PgDatabaseAutocommit {
    async fn route(&mut self, id: &Id<Route>) -> Result<WithId<Route>> {
        get(&self.pool, id).await
    }
}

#[async_trait]
impl<'a> RouteRepo for PgDatabaseTransaction<'a> {
    async fn route(&mut self, id: &Id<Route>) -> Result<WithId<Route>> {
        get(&mut *self.tx, id).await
    }
}
