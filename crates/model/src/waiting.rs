use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utility::id::{HasId, Id};

use crate::{journey::Journey, route::Route, stop::Stop, Rider, TransportType};

/// How long a waiting record stays alive without pickup or cancellation.
pub const DEFAULT_WAITING_TTL_SECS: i64 = 300;

/// One rider's intent to board at one stop. At most one active record per
/// (rider, stop) pair; the lifecycle manager additionally keeps it to one
/// per rider system-wide.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitingRecord {
    pub stop_id: Id<Stop>,
    pub user_id: Id<Rider>,
    pub route_id: Id<Route>,
    pub journey_id: Option<Id<Journey>>,
    pub transport_type: TransportType,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl WaitingRecord {
    pub fn new(
        rider: Id<Rider>,
        stop: Id<Stop>,
        route: Id<Route>,
        journey: Option<Id<Journey>>,
        transport_type: TransportType,
        created_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        WaitingRecord {
            stop_id: stop,
            user_id: rider,
            route_id: route,
            journey_id: journey,
            transport_type,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl HasId for WaitingRecord {
    type IdType = String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn expiry_is_creation_plus_ttl() {
        let created = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        let record = WaitingRecord::new(
            Id::new("rider-1".to_owned()),
            Id::new("stop-1".to_owned()),
            Id::new("route-1".to_owned()),
            None,
            TransportType::Bus,
            created,
            Duration::seconds(DEFAULT_WAITING_TTL_SECS),
        );
        assert_eq!(record.expires_at - record.created_at, Duration::seconds(300));
        assert!(!record.is_expired(created + Duration::seconds(299)));
        assert!(record.is_expired(created + Duration::seconds(300)));
    }
}
