use coordination::database::DatabaseError;
use sqlx::error::ErrorKind;

pub mod driver;
pub mod journey;
pub mod participant;
pub mod route;
pub mod stop;
pub mod waiting;

pub(crate) fn convert_error(why: sqlx::Error) -> DatabaseError {
    match why {
        sqlx::Error::RowNotFound => DatabaseError::NotFound,
        sqlx::Error::Database(db)
            if matches!(db.kind(), ErrorKind::UniqueViolation) =>
        {
            DatabaseError::Conflict
        }
        _ => DatabaseError::Other(Box::new(why)),
    }
}
