use std::fmt::Debug;

use serde::{Deserialize, Serialize};
pub use serde_with;
use utility::id::{HasId, Id};

pub mod favorite;
pub mod journey;
pub mod route;
pub mod stop;
pub mod waiting;

/// A rider of the system. The core only ever handles rider identifiers;
/// profile data lives with the account collaborator.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rider {
    pub display_name: Option<String>,
}

impl HasId for Rider {
    type IdType = String;
}

/// Mode of transport a route is served by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    Bus,
    Train,
    Tram,
    Ferry,
}

impl TransportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportType::Bus => "bus",
            TransportType::Train => "train",
            TransportType::Tram => "tram",
            TransportType::Ferry => "ferry",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "bus" => Some(TransportType::Bus),
            "train" => Some(TransportType::Train),
            "tram" => Some(TransportType::Tram),
            "ferry" => Some(TransportType::Ferry),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WithId<V>
where
    V: HasId,
    V::IdType: Serialize + Debug + Clone,
{
    pub id: Id<V>,
    #[serde(flatten)]
    pub content: V,
}

impl<V> WithId<V>
where
    V: HasId,
    V::IdType: Serialize + Debug + Clone,
{
    pub fn new(id: Id<V>, content: V) -> Self {
        Self { id, content }
    }
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithDistance<T> {
    pub distance_km: f64,
    #[serde(flatten)]
    pub content: T,
}

impl<T> WithDistance<T> {
    pub fn new(distance_km: f64, content: T) -> Self {
        Self {
            distance_km,
            content,
        }
    }
}
