use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utility::id::{HasId, Id};

use crate::{route::Route, Rider};

/// Lifecycle state of a shared journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyStatus {
    InProgress,
    Completed,
    Cancelled,
}

impl JourneyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JourneyStatus::InProgress => "in_progress",
            JourneyStatus::Completed => "completed",
            JourneyStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in_progress" => Some(JourneyStatus::InProgress),
            "completed" => Some(JourneyStatus::Completed),
            "cancelled" => Some(JourneyStatus::Cancelled),
            _ => None,
        }
    }
}

/// One shared, in-progress trip instance on a route. All riders converging
/// on the same route segment share a single journey row.
///
/// `current_stop_sequence` is a best-effort pointer to where the vehicle is
/// assumed to be; `last_ping_time` is a liveness heartbeat, updated whenever
/// a rider joins. Both are last-writer-wins by design.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Journey {
    pub route_id: Id<Route>,
    pub current_stop_sequence: i32,
    pub status: JourneyStatus,
    pub last_ping_time: DateTime<Utc>,
    pub created_by: Id<Rider>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Journey {
    pub fn started_by(
        rider: Id<Rider>,
        route_id: Id<Route>,
        stop_sequence: i32,
        now: DateTime<Utc>,
    ) -> Self {
        Journey {
            route_id,
            current_stop_sequence: stop_sequence,
            status: JourneyStatus::InProgress,
            last_ping_time: now,
            created_by: rider,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Whether a rider at `stop_sequence` could still board this journey.
    /// A journey whose pointer has advanced to or past the stop has already
    /// left that rider behind.
    pub fn is_open_for(&self, stop_sequence: i32) -> bool {
        self.status == JourneyStatus::InProgress
            && self.current_stop_sequence < stop_sequence
    }
}

impl HasId for Journey {
    type IdType = String;
}

/// One rider's membership in a journey. Deleted outright on cancellation,
/// never soft-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyParticipant {
    pub journey_id: Id<Journey>,
    pub user_id: Id<Rider>,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
}

impl HasId for JourneyParticipant {
    type IdType = String;
}

/// Driver-facing mirror of a journey. Owned by the driver collaborator; the
/// core only flips its status during cascade cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverJourney {
    pub journey_id: Id<Journey>,
    pub driver_id: Id<Rider>,
    pub status: JourneyStatus,
}

impl HasId for DriverJourney {
    type IdType = String;
}

/// Record of a finished trip for a rider, written by the completion
/// collaborator. The core only removes these defensively during
/// cancellation cleanup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedJourney {
    pub journey_id: Id<Journey>,
    pub user_id: Id<Rider>,
    pub completed_at: DateTime<Utc>,
}

impl HasId for CompletedJourney {
    type IdType = String;
}
