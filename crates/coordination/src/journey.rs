use chrono::Utc;
use log::{debug, info, warn};
use model::{
    journey::{Journey, JourneyParticipant},
    route::Route,
    Rider,
};
use utility::id::Id;

use crate::{
    database::{Database, DatabaseError, JourneyRepo, ParticipantRepo},
    CoordinationError, Result,
};

/// Maps a (route, stop sequence) pair to the single shared in-progress
/// journey all riders at that segment converge on.
#[derive(Clone)]
pub struct JourneyCoordinator<D>
where
    D: Database,
{
    database: D,
}

impl<D> JourneyCoordinator<D>
where
    D: Database,
{
    pub fn new(database: D) -> Self {
        Self { database }
    }

    /// Resolves the journey a rider at `stop_sequence` on `route` should
    /// board, creating one if no open journey exists, and records the rider
    /// as an active participant.
    ///
    /// An open journey is one that is in progress and whose stop pointer
    /// has not yet reached `stop_sequence`; joining it bumps its heartbeat.
    /// Creation races are serialized by the store's one-in-progress-journey-
    /// per-route rule: losing the race means someone else just created the
    /// journey, so the winner's journey is joined instead.
    pub async fn join_or_create(
        &self,
        rider: &Id<Rider>,
        route: &Id<Route>,
        stop_sequence: i32,
    ) -> Result<Id<Journey>> {
        let mut ops = self.database.auto();
        let now = Utc::now();

        let journey_id = match ops
            .find_open_journey(route, stop_sequence)
            .await
            .map_err(CoordinationError::JourneyResolutionFailed)?
        {
            Some(existing) => {
                debug!(
                    "rider {} joins existing journey {} on route {}",
                    rider, existing.id, route
                );
                ops.touch_ping(&existing.id, now)
                    .await
                    .map_err(CoordinationError::JourneyResolutionFailed)?;
                existing.id
            }
            None => {
                let journey = Journey::started_by(
                    rider.clone(),
                    route.clone(),
                    stop_sequence,
                    now,
                );
                match ops.insert_journey(journey).await {
                    Ok(created) => {
                        info!(
                            "rider {} created journey {} on route {} at sequence {}",
                            rider, created.id, route, stop_sequence
                        );
                        created.id
                    }
                    // Lost the creation race: another rider inserted the
                    // journey between our query and our insert.
                    Err(DatabaseError::Conflict) => {
                        warn!(
                            "journey creation conflict on route {}, re-querying",
                            route
                        );
                        ops.find_open_journey(route, stop_sequence)
                            .await
                            .map_err(CoordinationError::JourneyResolutionFailed)?
                            .map(|winner| winner.id)
                            .ok_or(CoordinationError::JourneyResolutionFailed(
                                DatabaseError::Conflict,
                            ))?
                    }
                    Err(why) => {
                        return Err(CoordinationError::JourneyResolutionFailed(why))
                    }
                }
            }
        };

        ops.upsert_participant(JourneyParticipant {
            journey_id: journey_id.clone(),
            user_id: rider.clone(),
            is_active: true,
            joined_at: now,
        })
        .await
        .map_err(CoordinationError::JourneyResolutionFailed)?;

        Ok(journey_id)
    }

    /// The journey the rider is currently part of, if any. Used as the
    /// precondition check before marking waiting.
    pub async fn has_active_participation(
        &self,
        rider: &Id<Rider>,
    ) -> Result<Option<Id<Journey>>> {
        self.database
            .auto()
            .active_participation_for(rider)
            .await
            .map(|participation| {
                participation.map(|p| p.content.journey_id)
            })
            .map_err(CoordinationError::JourneyResolutionFailed)
    }

    /// Advances the shared stop pointer, e.g. when riders report the
    /// vehicle passing a stop. Last writer wins by design.
    pub async fn report_progress(
        &self,
        journey: &Id<Journey>,
        stop_sequence: i32,
    ) -> Result<()> {
        self.database
            .auto()
            .advance_stop_sequence(journey, stop_sequence, Utc::now())
            .await
            .map_err(CoordinationError::JourneyResolutionFailed)
    }
}
