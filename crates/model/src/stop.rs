use serde::{Deserialize, Serialize};
use utility::{
    geo,
    id::{HasId, Id},
};

use crate::{route::Route, WithDistance};

/// A stop on a route. Reference data created by administrative flows and
/// read-only to the coordination core.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub name: String,
    pub location: Location,
    #[serde(skip)]
    pub route_id: Id<Route>,
    /// Position of this stop on its route, ascending along the direction
    /// of travel.
    pub sequence: i32,
}

impl Stop {
    pub fn with_distance_to(self, latitude: f64, longitude: f64) -> WithDistance<Stop> {
        let distance = geo::haversine_distance(
            latitude,
            longitude,
            self.location.latitude,
            self.location.longitude,
        );
        WithDistance::new(distance, self)
    }
}

impl HasId for Stop {
    type IdType = String;
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
}
