use serde::{Deserialize, Serialize};
use utility::id::{HasId, Id};

use crate::{stop::Stop, TransportType};

/// A transit route. Reference data, read-only to the coordination core.
/// Stops are referenced in travel order via their sequence numbers.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub name: String,
    pub transport_type: TransportType,
    #[serde(skip)]
    pub stop_ids: Vec<Id<Stop>>,
}

impl HasId for Route {
    type IdType = String;
}
