use std::{error, future::Future, result};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::{
    journey::{
        CompletedJourney, DriverJourney, Journey, JourneyParticipant, JourneyStatus,
    },
    route::Route,
    stop::Stop,
    waiting::WaitingRecord,
    Rider, WithId,
};
use utility::id::Id;

#[derive(Debug)]
pub enum DatabaseError {
    NotFound,
    /// A uniqueness rule was violated, e.g. a second in-progress journey
    /// for a route.
    Conflict,
    Other(Box<dyn error::Error + Send + Sync>),
}

pub type Result<T> = result::Result<T, DatabaseError>;

/// Read access to stop reference data.
#[async_trait]
pub trait StopRepo {
    async fn stop(&mut self, id: &Id<Stop>) -> Result<WithId<Stop>>;

    /// All stops of a route, ordered by their sequence on the route.
    async fn stops_on_route(&mut self, route: &Id<Route>)
        -> Result<Vec<WithId<Stop>>>;
}

/// Read access to route reference data.
#[async_trait]
pub trait RouteRepo {
    async fn route(&mut self, id: &Id<Route>) -> Result<WithId<Route>>;
}

#[async_trait]
pub trait JourneyRepo {
    async fn journey(&mut self, id: &Id<Journey>) -> Result<WithId<Journey>>;

    /// The newest in-progress journey on `route` whose stop pointer has not
    /// yet reached `before_sequence`. A journey past that sequence has
    /// already left the querying rider behind.
    async fn find_open_journey(
        &mut self,
        route: &Id<Route>,
        before_sequence: i32,
    ) -> Result<Option<WithId<Journey>>>;

    /// Inserts a new journey. Fails with [`DatabaseError::Conflict`] if the
    /// route already has an in-progress journey.
    async fn insert_journey(&mut self, journey: Journey) -> Result<WithId<Journey>>;

    /// Heartbeat: bump `last_ping_time` to signal the journey is alive.
    async fn touch_ping(
        &mut self,
        id: &Id<Journey>,
        at: DateTime<Utc>,
    ) -> Result<()>;

    async fn advance_stop_sequence(
        &mut self,
        id: &Id<Journey>,
        sequence: i32,
        at: DateTime<Utc>,
    ) -> Result<()>;

    async fn set_journey_status(
        &mut self,
        id: &Id<Journey>,
        status: JourneyStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()>;
}

#[async_trait]
pub trait ParticipantRepo {
    /// Inserts the participant, or reactivates the existing row for the
    /// same (journey, rider) pair.
    async fn upsert_participant(
        &mut self,
        participant: JourneyParticipant,
    ) -> Result<WithId<JourneyParticipant>>;

    /// Removes the rider's row for the journey. Returns the number of rows
    /// removed, so callers can detect the idempotent no-op case.
    async fn delete_participant(
        &mut self,
        journey: &Id<Journey>,
        rider: &Id<Rider>,
    ) -> Result<u64>;

    async fn active_participants(
        &mut self,
        journey: &Id<Journey>,
    ) -> Result<Vec<WithId<JourneyParticipant>>>;

    /// The rider's active participation in an in-progress journey, if any.
    /// A rider is in at most one journey at a time; an `is_active` row whose
    /// journey has completed or been cancelled does not count.
    async fn active_participation_for(
        &mut self,
        rider: &Id<Rider>,
    ) -> Result<Option<WithId<JourneyParticipant>>>;
}

#[async_trait]
pub trait WaitingRepo {
    /// Inserts the record, replacing any previous record of the same rider
    /// at the same stop.
    async fn upsert_waiting(
        &mut self,
        record: WaitingRecord,
    ) -> Result<WithId<WaitingRecord>>;

    async fn delete_waiting(
        &mut self,
        rider: &Id<Rider>,
        stop: &Id<Stop>,
    ) -> Result<u64>;

    async fn delete_waiting_for_journey(
        &mut self,
        rider: &Id<Rider>,
        journey: &Id<Journey>,
    ) -> Result<u64>;

    /// Unexpired records at a stop. Rows whose `expires_at` is at or before
    /// `now` are never returned, even if an orphaned row still exists.
    async fn waiting_at_stop(
        &mut self,
        stop: &Id<Stop>,
        now: DateTime<Utc>,
    ) -> Result<Vec<WithId<WaitingRecord>>>;

    /// The rider's unexpired record, if any.
    async fn waiting_for_rider(
        &mut self,
        rider: &Id<Rider>,
        now: DateTime<Utc>,
    ) -> Result<Option<WithId<WaitingRecord>>>;
}

/// Access to collaborator-owned driver and completion tables, touched only
/// during cascade cancellation.
#[async_trait]
pub trait DriverJourneyRepo {
    async fn driver_journey(
        &mut self,
        journey: &Id<Journey>,
        driver: &Id<Rider>,
    ) -> Result<Option<WithId<DriverJourney>>>;

    async fn set_driver_journey_status(
        &mut self,
        id: &Id<DriverJourney>,
        status: JourneyStatus,
    ) -> Result<()>;

    async fn completed_journey(
        &mut self,
        journey: &Id<Journey>,
        rider: &Id<Rider>,
    ) -> Result<Option<WithId<CompletedJourney>>>;

    async fn delete_completed_journey(
        &mut self,
        journey: &Id<Journey>,
        rider: &Id<Rider>,
    ) -> Result<u64>;
}

pub trait DatabaseOperations:
    StopRepo + RouteRepo + JourneyRepo + ParticipantRepo + WaitingRepo + DriverJourneyRepo
{
}

#[async_trait]
pub trait DatabaseTransaction: DatabaseOperations {
    async fn commit(self) -> Result<()>;
}

pub trait DatabaseAutocommit: DatabaseOperations {}

/// A store the coordination core can run against. Concurrent access happens
/// by cloning the database handle.
#[async_trait]
pub trait Database: Clone + Send + Sync + Sized + 'static {
    type Transaction: DatabaseTransaction + Send;
    type Autocommit: DatabaseAutocommit + Send;

    fn auto(&self) -> Self::Autocommit;

    async fn transaction(&self) -> Result<Self::Transaction>;

    async fn perform_transaction<T, F, Fut>(&self, action: F) -> Result<T>
    where
        T: Send,
        F: Send + FnOnce(&mut Self::Transaction) -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send;
}
