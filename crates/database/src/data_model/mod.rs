use model::WithId;
use utility::id::{HasId, Id};

pub mod driver;
pub mod journey;
pub mod participant;
pub mod route;
pub mod stop;
pub mod waiting;

/// Conversion between a database row and its domain model.
pub trait DatabaseRow {
    type Model: HasId<IdType = String> + serde::Serialize;

    fn get_id(&self) -> Id<Self::Model>;

    fn to_model(self) -> Self::Model;
}

pub fn with_id<R: DatabaseRow>(row: R) -> WithId<R::Model> {
    let id = row.get_id();
    WithId::new(id, row.to_model())
}

pub fn with_ids<R: DatabaseRow>(rows: Vec<R>) -> Vec<WithId<R::Model>> {
    rows.into_iter().map(with_id).collect()
}
