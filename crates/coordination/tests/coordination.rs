//! End-to-end tests of the join/waiting/cancellation flows against the
//! in-memory database, with paused tokio time so timer behavior is
//! deterministic.

use std::time::Duration;

use chrono::Utc;
use coordination::{
    cancellation,
    database::{
        Database, DatabaseError, DatabaseTransaction, JourneyRepo, ParticipantRepo,
        RouteRepo, StopRepo, WaitingRepo,
    },
    journey::JourneyCoordinator,
    memory::InMemoryDatabase,
    presence::PresencePoller,
    waiting::{CountdownDisplay, WaitingLifecycleManager, WaitingPhase},
    CoordinationConfig, CoordinationError,
};
use model::{
    journey::{CompletedJourney, DriverJourney, Journey, JourneyStatus},
    route::Route,
    stop::{Location, Stop},
    waiting::DEFAULT_WAITING_TTL_SECS,
    Rider, TransportType,
};
use utility::id::Id;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn rider(name: &str) -> Id<Rider> {
    Id::new(name.to_owned())
}

fn stop_id(name: &str) -> Id<Stop> {
    Id::new(name.to_owned())
}

fn route_id(name: &str) -> Id<Route> {
    Id::new(name.to_owned())
}

/// Route "route-x" with five stops, sequences 1 through 5.
async fn seeded_database() -> InMemoryDatabase {
    let database = InMemoryDatabase::new();
    let route = route_id("route-x");
    database
        .seed_route(
            "route-x",
            Route {
                name: "Linie 100".to_owned(),
                transport_type: TransportType::Bus,
                stop_ids: (1..=5).map(|i| stop_id(&format!("stop-{i}"))).collect(),
            },
        )
        .await;
    for sequence in 1..=5 {
        database
            .seed_stop(
                &format!("stop-{sequence}"),
                Stop {
                    name: format!("Stop {sequence}"),
                    location: Location {
                        latitude: 54.32 + sequence as f64 * 0.01,
                        longitude: 10.12,
                        address: None,
                    },
                    route_id: route.clone(),
                    sequence,
                },
            )
            .await;
    }
    database
}

fn manager(
    database: &InMemoryDatabase,
    rider_name: &str,
) -> WaitingLifecycleManager<InMemoryDatabase> {
    WaitingLifecycleManager::new(
        database.clone(),
        rider(rider_name),
        CoordinationConfig::default(),
    )
}

#[tokio::test(start_paused = true)]
async fn mark_waiting_creates_exactly_one_record() {
    init_logging();
    let database = seeded_database().await;
    let lifecycle = manager(&database, "anna");

    let created_at = lifecycle
        .mark_waiting(&stop_id("stop-3"), &route_id("route-x"), TransportType::Bus)
        .await
        .unwrap();

    let rows = database.raw_waiting_rows().await;
    assert_eq!(rows.len(), 1);
    let record = &rows[0];
    assert_eq!(record.user_id, rider("anna"));
    assert_eq!(record.stop_id, stop_id("stop-3"));
    assert_eq!(
        record.expires_at - record.created_at,
        chrono::Duration::seconds(DEFAULT_WAITING_TTL_SECS)
    );
    assert_eq!(record.created_at, created_at);
    assert!(record.journey_id.is_some());
    assert_eq!(
        lifecycle.phase().await,
        WaitingPhase::Waiting { created_at }
    );

    // the unexpired record is visible through the rider-scoped query
    let visible = database
        .auto()
        .waiting_for_rider(&rider("anna"), created_at)
        .await
        .unwrap();
    assert_eq!(visible.unwrap().content.stop_id, stop_id("stop-3"));

    // riders can push the shared stop pointer forward
    let journey = record.journey_id.clone().unwrap();
    lifecycle
        .coordinator()
        .report_progress(&journey, 4)
        .await
        .unwrap();
    assert_eq!(
        database.raw_journeys().await[0].content.current_stop_sequence,
        4
    );
}

#[tokio::test(start_paused = true)]
async fn seeded_reference_data_reads_back_in_sequence_order() {
    init_logging();
    let database = seeded_database().await;

    let route = database.auto().route(&route_id("route-x")).await.unwrap();
    assert_eq!(route.content.transport_type, TransportType::Bus);
    assert_eq!(route.content.stop_ids.len(), 5);

    let stops = database
        .auto()
        .stops_on_route(&route_id("route-x"))
        .await
        .unwrap();
    let sequences: Vec<i32> = stops.iter().map(|s| s.content.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
}

#[tokio::test(start_paused = true)]
async fn downstream_rider_joins_existing_journey() {
    init_logging();
    let database = seeded_database().await;
    let coordinator = JourneyCoordinator::new(database.clone());

    let journey_a = coordinator
        .join_or_create(&rider("anna"), &route_id("route-x"), 3)
        .await
        .unwrap();
    let journey_b = coordinator
        .join_or_create(&rider("ben"), &route_id("route-x"), 5)
        .await
        .unwrap();

    assert_eq!(journey_a, journey_b);
    let journeys = database.raw_journeys().await;
    assert_eq!(journeys.len(), 1);
    assert_eq!(journeys[0].content.current_stop_sequence, 3);
    assert_eq!(journeys[0].content.status, JourneyStatus::InProgress);
    assert_eq!(journeys[0].content.created_by, rider("anna"));

    let participants = database
        .auto()
        .active_participants(&journey_a)
        .await
        .unwrap();
    assert_eq!(participants.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn join_or_create_is_idempotent_per_rider() {
    init_logging();
    let database = seeded_database().await;
    let coordinator = JourneyCoordinator::new(database.clone());

    let first = coordinator
        .join_or_create(&rider("anna"), &route_id("route-x"), 3)
        .await
        .unwrap();
    let second = coordinator
        .join_or_create(&rider("anna"), &route_id("route-x"), 3)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(database.raw_journeys().await.len(), 1);
    let participants = database.auto().active_participants(&first).await.unwrap();
    assert_eq!(participants.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn journey_past_the_stop_is_not_joinable() {
    init_logging();
    let database = seeded_database().await;
    let coordinator = JourneyCoordinator::new(database.clone());

    // vehicle is already at sequence 5
    let journey = coordinator
        .join_or_create(&rider("anna"), &route_id("route-x"), 5)
        .await
        .unwrap();
    coordinator.report_progress(&journey, 5).await.unwrap();

    // a rider at sequence 3 has been left behind; the open-journey query
    // must not return the passed journey
    let open = database
        .auto()
        .find_open_journey(&route_id("route-x"), 3)
        .await
        .unwrap();
    assert!(open.is_none());

    // and the single-journey-per-route rule blocks a replacement journey
    // while the old one is still in progress
    let result = coordinator
        .join_or_create(&rider("ben"), &route_id("route-x"), 3)
        .await;
    assert!(matches!(
        result,
        Err(CoordinationError::JourneyResolutionFailed(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn duplicate_journey_insert_conflicts() {
    init_logging();
    let database = seeded_database().await;
    let now = Utc::now();

    database
        .auto()
        .insert_journey(Journey::started_by(
            rider("anna"),
            route_id("route-x"),
            3,
            now,
        ))
        .await
        .unwrap();
    let second = database
        .auto()
        .insert_journey(Journey::started_by(
            rider("ben"),
            route_id("route-x"),
            3,
            now,
        ))
        .await;

    assert!(matches!(second, Err(DatabaseError::Conflict)));

    // join_or_create recovers from losing the race by joining the winner
    let coordinator = JourneyCoordinator::new(database.clone());
    let joined = coordinator
        .join_or_create(&rider("ben"), &route_id("route-x"), 5)
        .await
        .unwrap();
    assert_eq!(database.raw_journeys().await.len(), 1);
    assert_eq!(database.raw_journeys().await[0].id, joined);
}

#[tokio::test(start_paused = true)]
async fn transactions_commit_through_the_shared_handle() {
    init_logging();
    let database = seeded_database().await;
    let journey = Journey::started_by(rider("anna"), route_id("route-x"), 3, Utc::now());

    let mut tx = database.transaction().await.unwrap();
    let inserted = tx.insert_journey(journey).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(database.raw_journeys().await.len(), 1);
    assert_eq!(database.raw_journeys().await[0].id, inserted.id);
}

#[tokio::test(start_paused = true)]
async fn marking_twice_surfaces_active_journey_conflict() {
    init_logging();
    let database = seeded_database().await;
    let lifecycle = manager(&database, "anna");

    lifecycle
        .mark_waiting(&stop_id("stop-2"), &route_id("route-x"), TransportType::Bus)
        .await
        .unwrap();

    let second = lifecycle
        .mark_waiting(&stop_id("stop-4"), &route_id("route-x"), TransportType::Bus)
        .await;
    match second {
        Err(CoordinationError::ActiveJourneyConflict { journey_id }) => {
            assert_eq!(database.raw_journeys().await[0].id, journey_id);
        }
        other => panic!("expected ActiveJourneyConflict, got {:?}", other),
    }
    // still exactly one record, for the first stop
    let rows = database.raw_waiting_rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].stop_id, stop_id("stop-2"));
}

#[tokio::test(start_paused = true)]
async fn remarking_at_another_stop_replaces_the_previous_record() {
    init_logging();
    let database = seeded_database().await;
    let lifecycle = manager(&database, "anna");

    // a stop outside the reference data: journey resolution fails, the
    // record is still written, and no participation blocks a re-mark
    lifecycle
        .mark_waiting(&stop_id("stop-99"), &route_id("route-x"), TransportType::Bus)
        .await
        .unwrap();
    let rows = database.raw_waiting_rows().await;
    assert_eq!(rows.len(), 1);
    assert!(rows[0].journey_id.is_none());

    let created_at = lifecycle
        .mark_waiting(&stop_id("stop-3"), &route_id("route-x"), TransportType::Bus)
        .await
        .unwrap();

    // one live record per rider system-wide, at the new stop
    let rows = database.raw_waiting_rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].stop_id, stop_id("stop-3"));
    assert_eq!(
        lifecycle.phase().await,
        WaitingPhase::Waiting { created_at }
    );
}

#[tokio::test(start_paused = true)]
async fn completed_journey_no_longer_counts_as_active_participation() {
    init_logging();
    let database = seeded_database().await;
    let coordinator = JourneyCoordinator::new(database.clone());

    let journey = coordinator
        .join_or_create(&rider("anna"), &route_id("route-x"), 3)
        .await
        .unwrap();
    // the completion collaborator finishes the trip; the participant row
    // stays is_active
    database
        .auto()
        .set_journey_status(&journey, JourneyStatus::Completed, Some(Utc::now()))
        .await
        .unwrap();

    let participation = database
        .auto()
        .active_participation_for(&rider("anna"))
        .await
        .unwrap();
    assert!(participation.is_none());

    // the rider is not blocked from waiting for the next trip
    let lifecycle = manager(&database, "anna");
    lifecycle
        .mark_waiting(&stop_id("stop-3"), &route_id("route-x"), TransportType::Bus)
        .await
        .unwrap();
    assert_eq!(database.raw_waiting_rows().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_record_write_leaves_the_machine_idle() {
    init_logging();
    let database = seeded_database().await;
    let lifecycle = manager(&database, "anna");
    database.fail_waiting_writes(true).await;

    let result = lifecycle
        .mark_waiting(&stop_id("stop-3"), &route_id("route-x"), TransportType::Bus)
        .await;

    assert!(matches!(
        result,
        Err(CoordinationError::WaitingRecordWriteFailed(_))
    ));
    assert_eq!(lifecycle.phase().await, WaitingPhase::Idle);
    assert!(database.raw_waiting_rows().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_pickup_deletion_rolls_back_to_waiting() {
    init_logging();
    let database = seeded_database().await;
    let lifecycle = manager(&database, "anna");

    let created_at = lifecycle
        .mark_waiting(&stop_id("stop-3"), &route_id("route-x"), TransportType::Bus)
        .await
        .unwrap();
    lifecycle.confirm_picked_up().await.unwrap();
    database.fail_waiting_writes(true).await;

    tokio::time::sleep(Duration::from_secs(6)).await;

    // the deletion failed, so the machine must not assume it happened
    assert_eq!(
        lifecycle.phase().await,
        WaitingPhase::Waiting { created_at }
    );
    assert_eq!(database.raw_waiting_rows().await.len(), 1);

    // once the store is healthy again the record expires on its own
    database.fail_waiting_writes(false).await;
    tokio::time::sleep(Duration::from_secs(301)).await;
    assert!(database.raw_waiting_rows().await.is_empty());
    assert_eq!(lifecycle.phase().await, WaitingPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn waiting_record_expires_after_ttl() {
    init_logging();
    let database = seeded_database().await;
    let lifecycle = manager(&database, "anna");

    let created_at = lifecycle
        .mark_waiting(&stop_id("stop-3"), &route_id("route-x"), TransportType::Bus)
        .await
        .unwrap();

    // queries already hide the record once past its expiry, even before
    // the auto-delete timer fires
    let visible = database
        .auto()
        .waiting_at_stop(
            &stop_id("stop-3"),
            created_at + chrono::Duration::seconds(301),
        )
        .await
        .unwrap();
    assert!(visible.is_empty());

    tokio::time::sleep(Duration::from_secs(301)).await;

    assert!(database.raw_waiting_rows().await.is_empty());
    assert_eq!(lifecycle.phase().await, WaitingPhase::Idle);
    assert_eq!(
        *lifecycle.subscribe_countdown().borrow(),
        CountdownDisplay::Inactive
    );
}

#[tokio::test(start_paused = true)]
async fn pickup_confirmation_deletes_record_after_grace_period() {
    init_logging();
    let database = seeded_database().await;
    let lifecycle = manager(&database, "anna");

    lifecycle
        .mark_waiting(&stop_id("stop-3"), &route_id("route-x"), TransportType::Bus)
        .await
        .unwrap();
    lifecycle.confirm_picked_up().await.unwrap();
    assert!(matches!(
        lifecycle.phase().await,
        WaitingPhase::PickedUp { .. }
    ));
    assert_eq!(database.raw_waiting_rows().await.len(), 1);

    tokio::time::sleep(Duration::from_secs(6)).await;

    assert!(database.raw_waiting_rows().await.is_empty());
    assert_eq!(lifecycle.phase().await, WaitingPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn pickup_can_be_undone_within_grace_period() {
    init_logging();
    let database = seeded_database().await;
    let lifecycle = manager(&database, "anna");

    lifecycle
        .mark_waiting(&stop_id("stop-3"), &route_id("route-x"), TransportType::Bus)
        .await
        .unwrap();
    lifecycle.confirm_picked_up().await.unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;
    lifecycle.undo_pickup().await.unwrap();

    assert!(matches!(
        lifecycle.phase().await,
        WaitingPhase::Waiting { .. }
    ));

    // well past the original grace period: the record must still be there
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(database.raw_waiting_rows().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn remark_after_cancel_arms_fresh_timers() {
    init_logging();
    let database = seeded_database().await;
    let lifecycle = manager(&database, "anna");

    lifecycle
        .mark_waiting(&stop_id("stop-3"), &route_id("route-x"), TransportType::Bus)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(100)).await;
    lifecycle.cancel().await.unwrap();
    assert!(database.raw_waiting_rows().await.is_empty());

    let second_created = lifecycle
        .mark_waiting(&stop_id("stop-3"), &route_id("route-x"), TransportType::Bus)
        .await
        .unwrap();
    assert_eq!(database.raw_waiting_rows().await.len(), 1);

    // 250 s after the re-mark: the first record's timer (which would have
    // fired by now) must not have touched the new record
    tokio::time::sleep(Duration::from_secs(250)).await;
    assert_eq!(database.raw_waiting_rows().await.len(), 1);
    assert_eq!(
        lifecycle.phase().await,
        WaitingPhase::Waiting {
            created_at: second_created
        }
    );

    // and the new record still expires on its own schedule
    tokio::time::sleep(Duration::from_secs(51)).await;
    assert!(database.raw_waiting_rows().await.is_empty());
    assert_eq!(lifecycle.phase().await, WaitingPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn last_participant_cancellation_cancels_journey() {
    init_logging();
    let database = seeded_database().await;
    let coordinator = JourneyCoordinator::new(database.clone());

    let journey = coordinator
        .join_or_create(&rider("anna"), &route_id("route-x"), 3)
        .await
        .unwrap();

    cancellation::cancel_participation(&database, &rider("anna"), &journey)
        .await
        .unwrap();

    let journeys = database.raw_journeys().await;
    assert_eq!(journeys[0].content.status, JourneyStatus::Cancelled);
    assert!(journeys[0].content.completed_at.is_some());

    // idempotent: the second call finds nothing and succeeds
    cancellation::cancel_participation(&database, &rider("anna"), &journey)
        .await
        .unwrap();
    assert_eq!(database.raw_journeys().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn journey_survives_cancellation_with_remaining_participants() {
    init_logging();
    let database = seeded_database().await;
    let coordinator = JourneyCoordinator::new(database.clone());

    let journey = coordinator
        .join_or_create(&rider("anna"), &route_id("route-x"), 3)
        .await
        .unwrap();
    coordinator
        .join_or_create(&rider("ben"), &route_id("route-x"), 4)
        .await
        .unwrap();

    cancellation::cancel_participation(&database, &rider("anna"), &journey)
        .await
        .unwrap();

    let journeys = database.raw_journeys().await;
    assert_eq!(journeys[0].content.status, JourneyStatus::InProgress);
    let remaining = database.auto().active_participants(&journey).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].content.user_id, rider("ben"));
}

#[tokio::test(start_paused = true)]
async fn cancellation_cleans_up_driver_and_completion_records() {
    init_logging();
    let database = seeded_database().await;
    let coordinator = JourneyCoordinator::new(database.clone());

    let journey = coordinator
        .join_or_create(&rider("anna"), &route_id("route-x"), 3)
        .await
        .unwrap();
    database
        .seed_driver_journey(
            "driver-journey-1",
            DriverJourney {
                journey_id: journey.clone(),
                driver_id: rider("anna"),
                status: JourneyStatus::InProgress,
            },
        )
        .await;
    database
        .seed_completed_journey(
            "completed-1",
            CompletedJourney {
                journey_id: journey.clone(),
                user_id: rider("anna"),
                completed_at: Utc::now(),
            },
        )
        .await;

    cancellation::cancel_participation(&database, &rider("anna"), &journey)
        .await
        .unwrap();

    let driver_journeys = database.raw_driver_journeys().await;
    assert_eq!(driver_journeys[0].content.status, JourneyStatus::Cancelled);
    assert!(database.raw_completed_journeys().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn full_lifecycle_cancel_resets_everything() {
    init_logging();
    let database = seeded_database().await;
    let lifecycle = manager(&database, "anna");

    lifecycle
        .mark_waiting(&stop_id("stop-3"), &route_id("route-x"), TransportType::Bus)
        .await
        .unwrap();
    lifecycle.cancel().await.unwrap();

    assert!(database.raw_waiting_rows().await.is_empty());
    assert_eq!(lifecycle.phase().await, WaitingPhase::Idle);
    let journeys = database.raw_journeys().await;
    assert_eq!(journeys[0].content.status, JourneyStatus::Cancelled);
    // cancelling again is a no-op
    lifecycle.cancel().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn presence_poller_reflects_joins_within_one_interval() {
    init_logging();
    let database = seeded_database().await;
    let coordinator = JourneyCoordinator::new(database.clone());

    let journey = coordinator
        .join_or_create(&rider("anna"), &route_id("route-x"), 3)
        .await
        .unwrap();

    let poller = PresencePoller::spawn(
        database.clone(),
        journey.clone(),
        stop_id("stop-3"),
        Duration::from_secs(30),
    );
    let mut snapshots = poller.subscribe();
    snapshots.changed().await.unwrap();
    assert_eq!(snapshots.borrow().unwrap().active_participants, 1);

    coordinator
        .join_or_create(&rider("ben"), &route_id("route-x"), 4)
        .await
        .unwrap();

    // the next poll, at most one interval later, must see the join
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(poller.latest().unwrap().active_participants, 2);
}

#[tokio::test(start_paused = true)]
async fn countdown_publishes_waiting_remaining() {
    init_logging();
    let database = seeded_database().await;
    let lifecycle = manager(&database, "anna");
    let mut countdown = lifecycle.subscribe_countdown();

    lifecycle
        .mark_waiting(&stop_id("stop-3"), &route_id("route-x"), TransportType::Bus)
        .await
        .unwrap();

    countdown.changed().await.unwrap();
    match *countdown.borrow() {
        CountdownDisplay::WaitingRemaining { seconds } => {
            assert!((0..=DEFAULT_WAITING_TTL_SECS).contains(&seconds));
        }
        other => panic!("expected waiting countdown, got {:?}", other),
    }

    lifecycle.confirm_picked_up().await.unwrap();
    countdown.changed().await.unwrap();
    match *countdown.borrow() {
        CountdownDisplay::PickupConfirmIn { seconds } => {
            assert!((0..=5).contains(&seconds));
        }
        other => panic!("expected pickup countdown, got {:?}", other),
    };
}
