use std::time::Duration;

use chrono::{DateTime, Utc};
use log::warn;
use model::{journey::Journey, stop::Stop};
use serde::Serialize;
use tokio::{sync::watch, task::JoinHandle};
use utility::id::Id;

use crate::database::{Database, ParticipantRepo, WaitingRepo};

/// Counts shown on the stop screen: who is on the journey, who is waiting
/// at the stop. Refreshed by polling, so values may lag reality by up to
/// one poll interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceSnapshot {
    pub active_participants: usize,
    pub waiting_riders: usize,
    pub taken_at: DateTime<Utc>,
}

/// Periodically polls participant and waiting counts for one journey/stop
/// pair and publishes snapshots on a watch channel.
///
/// The poll interval (default 30 s) is the documented worst-case staleness
/// of the published data. The polling task stops when the poller is
/// dropped.
pub struct PresencePoller {
    handle: JoinHandle<()>,
    snapshots: watch::Receiver<Option<PresenceSnapshot>>,
}

impl PresencePoller {
    pub fn spawn<D>(
        database: D,
        journey: Id<Journey>,
        stop: Id<Stop>,
        poll_interval: Duration,
    ) -> Self
    where
        D: Database,
    {
        let (tx, rx) = watch::channel(None);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            loop {
                interval.tick().await;

                let mut ops = database.auto();
                let now = Utc::now();

                let participants = match ops.active_participants(&journey).await {
                    Ok(participants) => participants.len(),
                    Err(why) => {
                        warn!(
                            "presence poll for journey {} failed: {:?}",
                            journey, why
                        );
                        continue;
                    }
                };
                let waiting = match ops.waiting_at_stop(&stop, now).await {
                    Ok(records) => records.len(),
                    Err(why) => {
                        warn!("presence poll for stop {} failed: {:?}", stop, why);
                        continue;
                    }
                };

                let snapshot = PresenceSnapshot {
                    active_participants: participants,
                    waiting_riders: waiting,
                    taken_at: now,
                };
                if tx.send(Some(snapshot)).is_err() {
                    break;
                }
            }
        });

        Self {
            handle,
            snapshots: rx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<PresenceSnapshot>> {
        self.snapshots.clone()
    }

    pub fn latest(&self) -> Option<PresenceSnapshot> {
        *self.snapshots.borrow()
    }
}

impl Drop for PresencePoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
