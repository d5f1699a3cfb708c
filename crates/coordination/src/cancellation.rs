use chrono::Utc;
use log::{info, warn};
use model::{
    journey::{Journey, JourneyStatus},
    Rider,
};
use utility::id::Id;

use crate::{
    database::{
        Database, DriverJourneyRepo, JourneyRepo, ParticipantRepo, WaitingRepo,
    },
    CoordinationError, Result,
};

/// Tears down a rider's participation in a journey.
///
/// The steps run in a fixed order so no orphaned state is left behind:
/// waiting records first, then the participant row, then the conditional
/// journey-level cancellation once no active participants remain, then the
/// auxiliary driver and completion cleanups. Only the participant removal
/// is correctness-critical; every other step is best-effort and logged.
///
/// Idempotent: a second call for the same (rider, journey) pair finds no
/// rows and no-ops.
pub async fn cancel_participation<D>(
    database: &D,
    rider: &Id<Rider>,
    journey: &Id<Journey>,
) -> Result<()>
where
    D: Database,
{
    let mut ops = database.auto();
    let mut aux_failed = false;

    // 1. waiting records tied to this journey
    match ops.delete_waiting_for_journey(rider, journey).await {
        Ok(deleted) if deleted > 0 => {
            info!("removed {} waiting record(s) for rider {}", deleted, rider)
        }
        Ok(_) => {}
        Err(why) => {
            warn!(
                "could not delete waiting records for rider {} on journey {}: {:?}",
                rider, journey, why
            );
            aux_failed = true;
        }
    }

    // 2. the participant row itself
    let removed = ops
        .delete_participant(journey, rider)
        .await
        .map_err(CoordinationError::ParticipantRemovalFailed)?;
    if removed == 0 {
        info!(
            "rider {} was not a participant of journey {} (already cancelled?)",
            rider, journey
        );
    }

    // 3 + 4. cancel the journey itself if nobody is left, so it does not
    // linger as in-progress and block future join-or-create queries
    match ops.active_participants(journey).await {
        Ok(remaining) if remaining.is_empty() => {
            let journey_state = ops.journey(journey).await;
            let still_in_progress = matches!(
                &journey_state,
                Ok(j) if j.content.status == JourneyStatus::InProgress
            );
            if still_in_progress {
                match ops
                    .set_journey_status(
                        journey,
                        JourneyStatus::Cancelled,
                        Some(Utc::now()),
                    )
                    .await
                {
                    Ok(()) => info!(
                        "journey {} cancelled, last participant {} left",
                        journey, rider
                    ),
                    Err(why) => {
                        warn!(
                            "could not cancel empty journey {}: {:?}",
                            journey, why
                        );
                        aux_failed = true;
                    }
                }
            }
        }
        Ok(remaining) => {
            info!(
                "journey {} continues with {} participant(s)",
                journey,
                remaining.len()
            );
        }
        Err(why) => {
            warn!(
                "could not count participants of journey {}: {:?}",
                journey, why
            );
            aux_failed = true;
        }
    }

    // 5. driver-facing mirror record, if the rider drives this journey
    match ops.driver_journey(journey, rider).await {
        Ok(Some(driver_journey)) => {
            if let Err(why) = ops
                .set_driver_journey_status(
                    &driver_journey.id,
                    JourneyStatus::Cancelled,
                )
                .await
            {
                warn!(
                    "could not cancel driver journey {}: {:?}",
                    driver_journey.id, why
                );
                aux_failed = true;
            }
        }
        Ok(None) => {}
        Err(why) => {
            warn!(
                "driver lookup for rider {} on journey {} failed: {:?}",
                rider, journey, why
            );
            aux_failed = true;
        }
    }

    // 6. leftover completion record from a partial prior completion
    match ops.delete_completed_journey(journey, rider).await {
        Ok(_) => {}
        Err(why) => {
            warn!(
                "could not remove completion record for rider {} on journey {}: {:?}",
                rider, journey, why
            );
            aux_failed = true;
        }
    }

    if aux_failed {
        Err(CoordinationError::CancellationPartialFailure)
    } else {
        Ok(())
    }
}
