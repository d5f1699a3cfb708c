use std::time::Duration;

use model::journey::Journey;
use utility::id::Id;

use crate::database::DatabaseError;

pub mod cancellation;
pub mod database;
pub mod journey;
pub mod memory;
pub mod presence;
pub mod proximity;
pub mod waiting;

/// Errors surfaced by the coordination core.
///
/// `LocationUnavailable` is absorbed into a neutral "not yet eligible" UI
/// state and never shown as an error. `ActiveJourneyConflict` is actionable
/// (offer cancellation). The storage-backed variants are transient and
/// retryable; the local state machine never advances past a failed step.
#[derive(Debug)]
pub enum CoordinationError {
    LocationUnavailable,
    ActiveJourneyConflict { journey_id: Id<Journey> },
    JourneyResolutionFailed(DatabaseError),
    WaitingRecordWriteFailed(DatabaseError),
    ParticipantRemovalFailed(DatabaseError),
    CancellationPartialFailure,
}

pub type Result<T> = std::result::Result<T, CoordinationError>;

/// Tunables of the coordination core. `Default` carries the production
/// values; tests shrink the intervals.
#[derive(Debug, Clone)]
pub struct CoordinationConfig {
    /// Lifetime of a waiting record without pickup or cancellation.
    pub waiting_ttl: Duration,
    /// Grace period between a pickup tap and the record deletion, so an
    /// accidental tap can be undone.
    pub pickup_confirmation_delay: Duration,
    /// Radius within which a rider may interact with a stop.
    pub proximity_radius_km: f64,
    /// How often the device location is re-sampled while a gate is mounted.
    pub location_sample_interval: Duration,
    /// How often presence (participant/waiting counts) is refreshed. Also
    /// the worst-case staleness of presence data.
    pub presence_poll_interval: Duration,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        CoordinationConfig {
            waiting_ttl: Duration::from_secs(
                model::waiting::DEFAULT_WAITING_TTL_SECS as u64,
            ),
            pickup_confirmation_delay: Duration::from_secs(5),
            proximity_radius_km: 0.5,
            location_sample_interval: Duration::from_secs(30),
            presence_poll_interval: Duration::from_secs(30),
        }
    }
}
