use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use model::{
    route::Route, stop::Stop, waiting::WaitingRecord, Rider, TransportType,
};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use utility::id::Id;

use crate::{
    cancellation,
    database::{Database, StopRepo, WaitingRepo},
    journey::JourneyCoordinator,
    CoordinationConfig, CoordinationError, Result,
};

/// Where a rider currently is in the waiting lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitingPhase {
    Idle,
    Waiting { created_at: DateTime<Utc> },
    PickedUp { created_at: DateTime<Utc> },
}

/// Countdown state published for UI display, ticking once per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CountdownDisplay {
    Inactive,
    /// Seconds until the waiting record auto-expires.
    WaitingRemaining { seconds: i64 },
    /// Seconds until a pickup confirmation becomes final.
    PickupConfirmIn { seconds: i64 },
}

/// Running timer tasks for the current record. `key` is the record's
/// creation timestamp: a timer only ever acts if its key still matches the
/// live phase, so a stale timer can never delete a newer record.
struct Timers {
    key: DateTime<Utc>,
    expiry: JoinHandle<()>,
    ticker: JoinHandle<()>,
}

impl Timers {
    fn abort(&self) {
        debug!("aborting timer set keyed at {}", self.key);
        self.expiry.abort();
        self.ticker.abort();
    }
}

struct Inner {
    phase: WaitingPhase,
    stop_id: Option<Id<Stop>>,
    timers: Option<Timers>,
}

/// Shared handle the timer tasks run against. Cloned into every spawned
/// task so an expiring pickup can roll back and re-arm the waiting timers.
struct Core<D>
where
    D: Database,
{
    database: D,
    rider: Id<Rider>,
    config: CoordinationConfig,
    inner: Arc<Mutex<Inner>>,
    countdown: Arc<watch::Sender<CountdownDisplay>>,
}

impl<D: Database> Clone for Core<D> {
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            rider: self.rider.clone(),
            config: self.config.clone(),
            inner: Arc::clone(&self.inner),
            countdown: Arc::clone(&self.countdown),
        }
    }
}

/// Per-rider state machine for the waiting flow:
/// Idle -> Waiting -> PickedUp -> Idle, with automatic expiry after the TTL
/// and explicit cancellation from any state.
///
/// All storage writes happen before the local transition they justify; on a
/// write error the machine stays in its prior state.
pub struct WaitingLifecycleManager<D>
where
    D: Database,
{
    coordinator: JourneyCoordinator<D>,
    core: Core<D>,
}

impl<D> WaitingLifecycleManager<D>
where
    D: Database,
{
    pub fn new(database: D, rider: Id<Rider>, config: CoordinationConfig) -> Self {
        let (countdown, _) = watch::channel(CountdownDisplay::Inactive);
        Self {
            coordinator: JourneyCoordinator::new(database.clone()),
            core: Core {
                database,
                rider,
                config,
                inner: Arc::new(Mutex::new(Inner {
                    phase: WaitingPhase::Idle,
                    stop_id: None,
                    timers: None,
                })),
                countdown: Arc::new(countdown),
            },
        }
    }

    pub async fn phase(&self) -> WaitingPhase {
        self.core.inner.lock().await.phase
    }

    pub fn subscribe_countdown(&self) -> watch::Receiver<CountdownDisplay> {
        self.core.countdown.subscribe()
    }

    pub fn coordinator(&self) -> &JourneyCoordinator<D> {
        &self.coordinator
    }

    /// Marks the rider as waiting at a stop. Resolves the shared journey,
    /// writes the waiting record and arms the expiry and countdown timers.
    /// Returns the record's creation timestamp, which is also the timer key.
    ///
    /// Fails with [`CoordinationError::ActiveJourneyConflict`] if the rider
    /// is already part of a journey; the UI offers cancellation then.
    pub async fn mark_waiting(
        &self,
        stop: &Id<Stop>,
        route: &Id<Route>,
        transport_type: TransportType,
    ) -> Result<DateTime<Utc>> {
        if let Some(journey_id) = self
            .coordinator
            .has_active_participation(&self.core.rider)
            .await?
        {
            return Err(CoordinationError::ActiveJourneyConflict { journey_id });
        }

        let mut inner = self.core.inner.lock().await;

        // one live record per rider system-wide: a record at another stop
        // is removed before the new one is written, so replacing the timers
        // below cannot orphan it
        if let Some(previous) = inner.stop_id.clone() {
            if previous != *stop {
                self.core
                    .database
                    .auto()
                    .delete_waiting(&self.core.rider, &previous)
                    .await
                    .map_err(CoordinationError::WaitingRecordWriteFailed)?;
            }
        }

        let now = Utc::now();

        // Resolve the shared journey. Marking the stop does not strictly
        // require a resolved journey, so resolution failures only cost the
        // record its journey reference.
        let journey_id = match self.resolve_journey(stop, route).await {
            Ok(id) => Some(id),
            Err(why) => {
                warn!(
                    "journey resolution failed for rider {} at stop {}: {:?}",
                    self.core.rider, stop, why
                );
                None
            }
        };

        let record = WaitingRecord::new(
            self.core.rider.clone(),
            stop.clone(),
            route.clone(),
            journey_id,
            transport_type,
            now,
            chrono_ttl(self.core.config.waiting_ttl),
        );

        self.core
            .database
            .auto()
            .upsert_waiting(record)
            .await
            .map_err(CoordinationError::WaitingRecordWriteFailed)?;

        inner.phase = WaitingPhase::Waiting { created_at: now };
        inner.stop_id = Some(stop.clone());
        self.core
            .arm_waiting_timers(&mut inner, now, self.core.config.waiting_ttl);

        Ok(now)
    }

    /// The rider reports having boarded. Starts the short confirmation
    /// countdown; only when it runs out is the record actually deleted, so
    /// an accidental tap can be undone via [`Self::undo_pickup`].
    pub async fn confirm_picked_up(&self) -> Result<()> {
        let mut inner = self.core.inner.lock().await;
        let created_at = match inner.phase {
            WaitingPhase::Waiting { created_at } => created_at,
            phase => {
                debug!("pickup confirmation ignored in phase {:?}", phase);
                return Ok(());
            }
        };

        inner.phase = WaitingPhase::PickedUp { created_at };
        self.core.arm_pickup_timers(&mut inner, created_at);
        Ok(())
    }

    /// Reverts an unconfirmed pickup back to waiting, re-arming the expiry
    /// timer with whatever TTL is left.
    pub async fn undo_pickup(&self) -> Result<()> {
        let mut inner = self.core.inner.lock().await;
        let created_at = match inner.phase {
            WaitingPhase::PickedUp { created_at } => created_at,
            phase => {
                debug!("pickup undo ignored in phase {:?}", phase);
                return Ok(());
            }
        };

        inner.phase = WaitingPhase::Waiting { created_at };
        let remaining = remaining_ttl(created_at, self.core.config.waiting_ttl);
        self.core.arm_waiting_timers(&mut inner, created_at, remaining);
        Ok(())
    }

    /// Explicit cancellation from any state: deletes the waiting record,
    /// tears down journey participation and resets the machine to idle.
    pub async fn cancel(&self) -> Result<()> {
        let mut inner = self.core.inner.lock().await;

        if let Some(stop_id) = inner.stop_id.clone() {
            self.core
                .database
                .auto()
                .delete_waiting(&self.core.rider, &stop_id)
                .await
                .map_err(CoordinationError::WaitingRecordWriteFailed)?;
        }

        let participation = self
            .coordinator
            .has_active_participation(&self.core.rider)
            .await?;

        let mut partial_failure = false;
        if let Some(journey_id) = participation {
            match cancellation::cancel_participation(
                &self.core.database,
                &self.core.rider,
                &journey_id,
            )
            .await
            {
                Ok(()) => {}
                Err(CoordinationError::CancellationPartialFailure) => {
                    // auxiliary cleanup failed, but the rider is no longer
                    // a participant, so the cancel still counts
                    partial_failure = true;
                }
                Err(why) => return Err(why),
            }
        }

        if let Some(timers) = inner.timers.take() {
            timers.abort();
        }
        inner.phase = WaitingPhase::Idle;
        inner.stop_id = None;
        let _ = self.core.countdown.send(CountdownDisplay::Inactive);

        if partial_failure {
            warn!(
                "cancellation for rider {} partially failed",
                self.core.rider
            );
        }
        Ok(())
    }

    async fn resolve_journey(
        &self,
        stop: &Id<Stop>,
        route: &Id<Route>,
    ) -> Result<Id<model::journey::Journey>> {
        let stop_entry = self
            .core
            .database
            .auto()
            .stop(stop)
            .await
            .map_err(CoordinationError::JourneyResolutionFailed)?;
        self.coordinator
            .join_or_create(&self.core.rider, route, stop_entry.content.sequence)
            .await
    }
}

impl<D> Core<D>
where
    D: Database,
{
    /// Replaces the current timer set with a fresh expiry timer and UI
    /// ticker for the record created at `key`. The old tasks are aborted,
    /// not merely overwritten.
    fn arm_waiting_timers(&self, inner: &mut Inner, key: DateTime<Utc>, ttl: Duration) {
        if let Some(old) = inner.timers.take() {
            old.abort();
        }

        let expiry = {
            let core = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(ttl).await;

                let mut inner = core.inner.lock().await;
                // a newer record may have replaced ours in the meantime
                if inner.phase != (WaitingPhase::Waiting { created_at: key }) {
                    return;
                }
                if let Some(stop_id) = inner.stop_id.clone() {
                    if let Err(why) = core
                        .database
                        .auto()
                        .delete_waiting(&core.rider, &stop_id)
                        .await
                    {
                        // the record is expired either way; readers filter
                        // it out and the sweep job removes the row
                        error!(
                            "auto-delete of waiting record for rider {} failed: {:?}",
                            core.rider, why
                        );
                    }
                }
                inner.phase = WaitingPhase::Idle;
                inner.stop_id = None;
                let _ = core.countdown.send(CountdownDisplay::Inactive);
                // aborting ourselves here is harmless, nothing awaits below
                if let Some(timers) = inner.timers.take() {
                    timers.abort();
                }
            })
        };

        let deadline = Utc::now() + chrono_ttl(ttl);
        let ticker = spawn_ticker(Arc::clone(&self.countdown), move |now| {
            CountdownDisplay::WaitingRemaining {
                seconds: (deadline - now).num_seconds().max(0),
            }
        });

        inner.timers = Some(Timers { key, expiry, ticker });
    }

    fn arm_pickup_timers(&self, inner: &mut Inner, key: DateTime<Utc>) {
        if let Some(old) = inner.timers.take() {
            old.abort();
        }

        let delay = self.config.pickup_confirmation_delay;

        let expiry = {
            let core = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;

                let mut inner = core.inner.lock().await;
                if inner.phase != (WaitingPhase::PickedUp { created_at: key }) {
                    return;
                }
                let Some(stop_id) = inner.stop_id.clone() else {
                    inner.phase = WaitingPhase::Idle;
                    let _ = core.countdown.send(CountdownDisplay::Inactive);
                    if let Some(timers) = inner.timers.take() {
                        timers.abort();
                    }
                    return;
                };
                match core
                    .database
                    .auto()
                    .delete_waiting(&core.rider, &stop_id)
                    .await
                {
                    Ok(_) => {
                        inner.phase = WaitingPhase::Idle;
                        inner.stop_id = None;
                        let _ = core.countdown.send(CountdownDisplay::Inactive);
                        if let Some(timers) = inner.timers.take() {
                            timers.abort();
                        }
                    }
                    Err(why) => {
                        // roll back to waiting; the record still exists
                        error!(
                            "pickup deletion for rider {} failed: {:?}",
                            core.rider, why
                        );
                        inner.phase = WaitingPhase::Waiting { created_at: key };
                        let remaining =
                            remaining_ttl(key, core.config.waiting_ttl);
                        core.arm_waiting_timers(&mut inner, key, remaining);
                    }
                }
            })
        };

        let deadline = Utc::now() + chrono_ttl(delay);
        let ticker = spawn_ticker(Arc::clone(&self.countdown), move |now| {
            CountdownDisplay::PickupConfirmIn {
                seconds: (deadline - now).num_seconds().max(0),
            }
        });

        inner.timers = Some(Timers { key, expiry, ticker });
    }
}

fn chrono_ttl(ttl: Duration) -> chrono::Duration {
    chrono::Duration::from_std(ttl).unwrap_or_else(|_| {
        chrono::Duration::seconds(model::waiting::DEFAULT_WAITING_TTL_SECS)
    })
}

fn remaining_ttl(created_at: DateTime<Utc>, ttl: Duration) -> Duration {
    let deadline = created_at + chrono_ttl(ttl);
    (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}

fn spawn_ticker<F>(
    countdown: Arc<watch::Sender<CountdownDisplay>>,
    display: F,
) -> JoinHandle<()>
where
    F: Fn(DateTime<Utc>) -> CountdownDisplay + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            if countdown.send(display(Utc::now())).is_err() {
                break;
            }
        }
    })
}
