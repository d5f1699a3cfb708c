use serde::{Deserialize, Serialize};
use utility::id::Id;

use crate::stop::Stop;

/// Favorites as they arrive from legacy client payloads: either a bare stop
/// id string or a partially shaped object. Normalized exactly once at
/// ingestion via [`FavoriteStop::normalize`]; downstream code only ever sees
/// the canonical form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawFavorite {
    BareId(String),
    Shaped {
        #[serde(alias = "stopId", alias = "stop_id", alias = "id")]
        stop_id: String,
        #[serde(default)]
        label: Option<String>,
    },
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteStop {
    pub stop_id: Id<Stop>,
    pub label: Option<String>,
}

impl FavoriteStop {
    pub fn normalize(raw: RawFavorite) -> Self {
        match raw {
            RawFavorite::BareId(id) => FavoriteStop {
                stop_id: Id::new(id),
                label: None,
            },
            RawFavorite::Shaped { stop_id, label } => FavoriteStop {
                stop_id: Id::new(stop_id),
                label,
            },
        }
    }
}
