//! In-memory database for tests and local development.
//!
//! Implements the same repository traits as the Postgres backend, including
//! the one-in-progress-journey-per-route rule, so the coordination logic
//! can be exercised without a running database. Transactions commit
//! immediately; there is no rollback.

use std::{collections::HashMap, future::Future, sync::Arc};

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
use tokio::sync::Mutex;
use utility::id::Id;

use crate::database::{
    Database, DatabaseAutocommit, DatabaseError, DatabaseOperations,
    DatabaseTransaction, DriverJourneyRepo, JourneyRepo, ParticipantRepo, Result,
    RouteRepo, StopRepo, WaitingRepo,
};

#[derive(Default)]
struct Tables {
    stops: HashMap<String, Stop>,
    routes: HashMap<String, Route>,
    journeys: HashMap<String, Journey>,
    participants: HashMap<String, JourneyParticipant>,
    waiting: HashMap<String, WaitingRecord>,
    driver_journeys: HashMap<String, DriverJourney>,
    completed_journeys: HashMap<String, CompletedJourney>,
    next_id: u64,
    fail_waiting_writes: bool,
}

impl Tables {
    fn fresh_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    // seeding, for reference data the core treats as read-only

    pub async fn seed_stop(&self, id: &str, stop: Stop) {
        self.tables
            .lock()
            .await
            .stops
            .insert(id.to_owned(), stop);
    }

    pub async fn seed_route(&self, id: &str, route: Route) {
        self.tables
            .lock()
            .await
            .routes
            .insert(id.to_owned(), route);
    }

    pub async fn seed_driver_journey(&self, id: &str, driver_journey: DriverJourney) {
        self.tables
            .lock()
            .await
            .driver_journeys
            .insert(id.to_owned(), driver_journey);
    }

    pub async fn seed_completed_journey(
        &self,
        id: &str,
        completed: CompletedJourney,
    ) {
        self.tables
            .lock()
            .await
            .completed_journeys
            .insert(id.to_owned(), completed);
    }

    /// Makes subsequent waiting-record writes fail, for exercising the
    /// rollback branches of the lifecycle manager.
    pub async fn fail_waiting_writes(&self, fail: bool) {
        self.tables.lock().await.fail_waiting_writes = fail;
    }

    // raw table access, for assertions that must bypass query-level
    // expiry filtering

    pub async fn raw_waiting_rows(&self) -> Vec<WaitingRecord> {
        self.tables.lock().await.waiting.values().cloned().collect()
    }

    pub async fn raw_journeys(&self) -> Vec<WithId<Journey>> {
        self.tables
            .lock()
            .await
            .journeys
            .iter()
            .map(|(id, journey)| WithId::new(Id::new(id.clone()), journey.clone()))
            .collect()
    }

    pub async fn raw_driver_journeys(&self) -> Vec<WithId<DriverJourney>> {
        self.tables
            .lock()
            .await
            .driver_journeys
            .iter()
            .map(|(id, dj)| WithId::new(Id::new(id.clone()), dj.clone()))
            .collect()
    }

    pub async fn raw_completed_journeys(&self) -> Vec<WithId<CompletedJourney>> {
        self.tables
            .lock()
            .await
            .completed_journeys
            .iter()
            .map(|(id, cj)| WithId::new(Id::new(id.clone()), cj.clone()))
            .collect()
    }
}

#[derive(Clone)]
pub struct InMemoryOperations {
    tables: Arc<Mutex<Tables>>,
}

#[async_trait]
impl Database for InMemoryDatabase {
    type Transaction = InMemoryOperations;
    type Autocommit = InMemoryOperations;

    fn auto(&self) -> Self::Autocommit {
        InMemoryOperations {
            tables: Arc::clone(&self.tables),
        }
    }

    async fn transaction(&self) -> Result<Self::Transaction> {
        Ok(self.auto())
    }

    async fn perform_transaction<T, F, Fut>(&self, action: F) -> Result<T>
    where
        T: Send,
        F: Send + FnOnce(&mut Self::Transaction) -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        let mut tx = self.auto();
        action(&mut tx).await
    }
}

impl DatabaseOperations for InMemoryOperations {}
impl DatabaseAutocommit for InMemoryOperations {}

#[async_trait]
impl DatabaseTransaction for InMemoryOperations {
    async fn commit(self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl StopRepo for InMemoryOperations {
    async fn stop(&mut self, id: &Id<Stop>) -> Result<WithId<Stop>> {
        let tables = self.tables.lock().await;
        tables
            .stops
            .get(&id.raw())
            .cloned()
            .map(|stop| WithId::new(id.clone(), stop))
            .ok_or(DatabaseError::NotFound)
    }

    async fn stops_on_route(
        &mut self,
        route: &Id<Route>,
    ) -> Result<Vec<WithId<Stop>>> {
        let tables = self.tables.lock().await;
        let mut stops = tables
            .stops
            .iter()
            .filter(|(_, stop)| stop.route_id == *route)
            .map(|(id, stop)| WithId::new(Id::new(id.clone()), stop.clone()))
            .collect::<Vec<_>>();
        stops.sort_by_key(|stop| stop.content.sequence);
        Ok(stops)
    }
}

#[async_trait]
impl RouteRepo for InMemoryOperations {
    async fn route(&mut self, id: &Id<Route>) -> Result<WithId<Route>> {
        let tables = self.tables.lock().await;
        tables
            .routes
            .get(&id.raw())
            .cloned()
            .map(|route| WithId::new(id.clone(), route))
            .ok_or(DatabaseError::NotFound)
    }
}

#[async_trait]
impl JourneyRepo for InMemoryOperations {
    async fn journey(&mut self, id: &Id<Journey>) -> Result<WithId<Journey>> {
        let tables = self.tables.lock().await;
        tables
            .journeys
            .get(&id.raw())
            .cloned()
            .map(|journey| WithId::new(id.clone(), journey))
            .ok_or(DatabaseError::NotFound)
    }

    async fn find_open_journey(
        &mut self,
        route: &Id<Route>,
        before_sequence: i32,
    ) -> Result<Option<WithId<Journey>>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .journeys
            .iter()
            .filter(|(_, journey)| {
                journey.route_id == *route && journey.is_open_for(before_sequence)
            })
            .max_by(|(id_a, a), (id_b, b)| {
                a.created_at.cmp(&b.created_at).then(id_a.cmp(id_b))
            })
            .map(|(id, journey)| WithId::new(Id::new(id.clone()), journey.clone())))
    }

    async fn insert_journey(&mut self, journey: Journey) -> Result<WithId<Journey>> {
        let mut tables = self.tables.lock().await;
        let route_busy = tables.journeys.values().any(|existing| {
            existing.route_id == journey.route_id
                && existing.status == JourneyStatus::InProgress
        });
        if route_busy {
            return Err(DatabaseError::Conflict);
        }
        let id = tables.fresh_id("journey");
        tables.journeys.insert(id.clone(), journey.clone());
        Ok(WithId::new(Id::new(id), journey))
    }

    async fn touch_ping(
        &mut self,
        id: &Id<Journey>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let journey = tables
            .journeys
            .get_mut(&id.raw())
            .ok_or(DatabaseError::NotFound)?;
        journey.last_ping_time = at;
        journey.updated_at = at;
        Ok(())
    }

    async fn advance_stop_sequence(
        &mut self,
        id: &Id<Journey>,
        sequence: i32,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let journey = tables
            .journeys
            .get_mut(&id.raw())
            .ok_or(DatabaseError::NotFound)?;
        journey.current_stop_sequence = sequence;
        journey.last_ping_time = at;
        journey.updated_at = at;
        Ok(())
    }

    async fn set_journey_status(
        &mut self,
        id: &Id<Journey>,
        status: JourneyStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let journey = tables
            .journeys
            .get_mut(&id.raw())
            .ok_or(DatabaseError::NotFound)?;
        journey.status = status;
        journey.completed_at = completed_at;
        journey.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl ParticipantRepo for InMemoryOperations {
    async fn upsert_participant(
        &mut self,
        participant: JourneyParticipant,
    ) -> Result<WithId<JourneyParticipant>> {
        let mut tables = self.tables.lock().await;
        for (id, row) in tables.participants.iter_mut() {
            if row.journey_id == participant.journey_id
                && row.user_id == participant.user_id
            {
                // keep the original join time; rejoining is idempotent
                row.is_active = true;
                return Ok(WithId::new(Id::new(id.clone()), row.clone()));
            }
        }
        let id = tables.fresh_id("participant");
        tables
            .participants
            .insert(id.clone(), participant.clone());
        Ok(WithId::new(Id::new(id), participant))
    }

    async fn delete_participant(
        &mut self,
        journey: &Id<Journey>,
        rider: &Id<Rider>,
    ) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.participants.len();
        tables
            .participants
            .retain(|_, row| !(row.journey_id == *journey && row.user_id == *rider));
        Ok((before - tables.participants.len()) as u64)
    }

    async fn active_participants(
        &mut self,
        journey: &Id<Journey>,
    ) -> Result<Vec<WithId<JourneyParticipant>>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .participants
            .iter()
            .filter(|(_, row)| row.journey_id == *journey && row.is_active)
            .map(|(id, row)| WithId::new(Id::new(id.clone()), row.clone()))
            .collect())
    }

    async fn active_participation_for(
        &mut self,
        rider: &Id<Rider>,
    ) -> Result<Option<WithId<JourneyParticipant>>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .participants
            .iter()
            .find(|(_, row)| {
                row.user_id == *rider
                    && row.is_active
                    // a stale is_active row does not count once its journey
                    // has completed or been cancelled
                    && tables
                        .journeys
                        .get(row.journey_id.raw_ref::<str>())
                        .map(|journey| journey.status == JourneyStatus::InProgress)
                        .unwrap_or(false)
            })
            .map(|(id, row)| WithId::new(Id::new(id.clone()), row.clone())))
    }
}

#[async_trait]
impl WaitingRepo for InMemoryOperations {
    async fn upsert_waiting(
        &mut self,
        record: WaitingRecord,
    ) -> Result<WithId<WaitingRecord>> {
        let mut tables = self.tables.lock().await;
        if tables.fail_waiting_writes {
            return Err(DatabaseError::Other("waiting write failure injected".into()));
        }
        tables.waiting.retain(|_, row| {
            !(row.user_id == record.user_id && row.stop_id == record.stop_id)
        });
        let id = tables.fresh_id("waiting");
        tables.waiting.insert(id.clone(), record.clone());
        Ok(WithId::new(Id::new(id), record))
    }

    async fn delete_waiting(
        &mut self,
        rider: &Id<Rider>,
        stop: &Id<Stop>,
    ) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        if tables.fail_waiting_writes {
            return Err(DatabaseError::Other("waiting write failure injected".into()));
        }
        let before = tables.waiting.len();
        tables
            .waiting
            .retain(|_, row| !(row.user_id == *rider && row.stop_id == *stop));
        Ok((before - tables.waiting.len()) as u64)
    }

    async fn delete_waiting_for_journey(
        &mut self,
        rider: &Id<Rider>,
        journey: &Id<Journey>,
    ) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.waiting.len();
        tables.waiting.retain(|_, row| {
            !(row.user_id == *rider && row.journey_id.as_ref() == Some(journey))
        });
        Ok((before - tables.waiting.len()) as u64)
    }

    async fn waiting_at_stop(
        &mut self,
        stop: &Id<Stop>,
        now: DateTime<Utc>,
    ) -> Result<Vec<WithId<WaitingRecord>>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .waiting
            .iter()
            .filter(|(_, row)| row.stop_id == *stop && !row.is_expired(now))
            .map(|(id, row)| WithId::new(Id::new(id.clone()), row.clone()))
            .collect())
    }

    async fn waiting_for_rider(
        &mut self,
        rider: &Id<Rider>,
        now: DateTime<Utc>,
    ) -> Result<Option<WithId<WaitingRecord>>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .waiting
            .iter()
            .find(|(_, row)| row.user_id == *rider && !row.is_expired(now))
            .map(|(id, row)| WithId::new(Id::new(id.clone()), row.clone())))
    }
}

#[async_trait]
impl DriverJourneyRepo for InMemoryOperations {
    async fn driver_journey(
        &mut self,
        journey: &Id<Journey>,
        driver: &Id<Rider>,
    ) -> Result<Option<WithId<DriverJourney>>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .driver_journeys
            .iter()
            .find(|(_, row)| row.journey_id == *journey && row.driver_id == *driver)
            .map(|(id, row)| WithId::new(Id::new(id.clone()), row.clone())))
    }

    async fn set_driver_journey_status(
        &mut self,
        id: &Id<DriverJourney>,
        status: JourneyStatus,
    ) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let row = tables
            .driver_journeys
            .get_mut(&id.raw())
            .ok_or(DatabaseError::NotFound)?;
        row.status = status;
        Ok(())
    }

    async fn completed_journey(
        &mut self,
        journey: &Id<Journey>,
        rider: &Id<Rider>,
    ) -> Result<Option<WithId<CompletedJourney>>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .completed_journeys
            .iter()
            .find(|(_, row)| row.journey_id == *journey && row.user_id == *rider)
            .map(|(id, row)| WithId::new(Id::new(id.clone()), row.clone())))
    }

    async fn delete_completed_journey(
        &mut self,
        journey: &Id<Journey>,
        rider: &Id<Rider>,
    ) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.completed_journeys.len();
        tables.completed_journeys.retain(|_, row| {
            !(row.journey_id == *journey && row.user_id == *rider)
        });
        Ok((before - tables.completed_journeys.len()) as u64)
    }
}
