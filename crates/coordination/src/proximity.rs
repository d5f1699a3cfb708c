use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use log::debug;
use model::{
    stop::{Location, Stop},
    WithDistance,
};
use tokio::{sync::watch, task::JoinHandle};
use utility::geo;

/// Source of the rider's device position. Returns `None` when no fix is
/// available (permissions, cold GPS, airplane mode).
#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn current_location(&self) -> Option<(f64, f64)>;
}

/// Outcome of a proximity check. `Unknown` (no location fix) is distinct
/// from `TooFar`: the UI renders it as a neutral loading state, never as
/// "you are too far away".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    TooFar,
    Unknown,
}

/// Decides whether a rider is close enough to a stop to interact with it.
///
/// Rather than watching the GPS continuously, the gate re-samples the
/// location on a fixed interval (default 30 s) for as long as it is alive;
/// eligibility is a coarse gate, not tracking. The sampling task is aborted
/// on drop.
pub struct ProximityGate {
    radius_km: f64,
    fix: watch::Receiver<Option<(f64, f64)>>,
    sampler: JoinHandle<()>,
}

impl ProximityGate {
    pub fn new(
        source: Arc<dyn LocationSource>,
        radius_km: f64,
        sample_interval: Duration,
    ) -> Self {
        let (tx, rx) = watch::channel(None);

        let sampler = tokio::spawn(async move {
            let mut interval = tokio::time::interval(sample_interval);
            loop {
                interval.tick().await;
                let fix = source.current_location().await;
                debug!("location sample: {:?}", fix);
                if tx.send(fix).is_err() {
                    break;
                }
            }
        });

        Self {
            radius_km,
            fix: rx,
            sampler,
        }
    }

    /// Latest sampled position, if any.
    pub fn last_fix(&self) -> Option<(f64, f64)> {
        *self.fix.borrow()
    }

    pub fn evaluate(&self, stop_location: &Location) -> Eligibility {
        match self.last_fix() {
            None => Eligibility::Unknown,
            Some((lat, lon)) => {
                if geo::within_radius(
                    lat,
                    lon,
                    stop_location.latitude,
                    stop_location.longitude,
                    self.radius_km,
                ) {
                    Eligibility::Eligible
                } else {
                    Eligibility::TooFar
                }
            }
        }
    }

    /// Whether interaction with the stop is allowed. Fails closed: no fix
    /// means no interaction.
    pub fn allows(&self, stop_location: &Location) -> bool {
        self.evaluate(stop_location) == Eligibility::Eligible
    }

    /// Orders stops by distance from the current fix, closest first, for
    /// the stop picker. Empty when no fix is available.
    pub fn stops_by_distance(&self, stops: Vec<Stop>) -> Vec<WithDistance<Stop>> {
        let Some((lat, lon)) = self.last_fix() else {
            return Vec::new();
        };
        let mut stops: Vec<_> = stops
            .into_iter()
            .map(|stop| stop.with_distance_to(lat, lon))
            .collect();
        stops.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        stops
    }

    /// Waits until at least one sample has been taken. Mostly useful in
    /// tests and right after mounting the gate.
    pub async fn sampled(&mut self) {
        // the channel starts at None before the first tick resolves
        let _ = self.fix.changed().await;
    }
}

impl Drop for ProximityGate {
    fn drop(&mut self) {
        self.sampler.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLocation(Option<(f64, f64)>);

    #[async_trait]
    impl LocationSource for FixedLocation {
        async fn current_location(&self) -> Option<(f64, f64)> {
            self.0
        }
    }

    fn stop_location() -> Location {
        Location {
            latitude: 54.32,
            longitude: 10.12,
            address: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn within_radius_is_eligible() {
        // ~400 m north of the stop
        let source = Arc::new(FixedLocation(Some((54.32 + 0.0036, 10.12))));
        let mut gate =
            ProximityGate::new(source, 0.5, Duration::from_secs(30));
        gate.sampled().await;

        assert_eq!(gate.evaluate(&stop_location()), Eligibility::Eligible);
        assert!(gate.allows(&stop_location()));
    }

    #[tokio::test(start_paused = true)]
    async fn beyond_radius_is_too_far() {
        // ~600 m north of the stop
        let source = Arc::new(FixedLocation(Some((54.32 + 0.0054, 10.12))));
        let mut gate =
            ProximityGate::new(source, 0.5, Duration::from_secs(30));
        gate.sampled().await;

        assert_eq!(gate.evaluate(&stop_location()), Eligibility::TooFar);
        assert!(!gate.allows(&stop_location()));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_are_ordered_closest_first() {
        let source = Arc::new(FixedLocation(Some((54.32, 10.12))));
        let mut gate =
            ProximityGate::new(source, 0.5, Duration::from_secs(30));
        gate.sampled().await;

        let stop = |name: &str, latitude: f64| Stop {
            name: name.to_owned(),
            location: Location {
                latitude,
                longitude: 10.12,
                address: None,
            },
            route_id: utility::id::Id::new("route-x".to_owned()),
            sequence: 1,
        };
        let ordered = gate.stops_by_distance(vec![
            stop("far", 54.32 + 0.0054),
            stop("near", 54.32 + 0.0036),
        ]);

        assert_eq!(ordered[0].content.name, "near");
        assert_eq!(ordered[1].content.name, "far");
        assert!(ordered[0].distance_km < ordered[1].distance_km);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_fix_fails_closed() {
        let source = Arc::new(FixedLocation(None));
        let mut gate =
            ProximityGate::new(source, 0.5, Duration::from_secs(30));
        gate.sampled().await;

        assert_eq!(gate.evaluate(&stop_location()), Eligibility::Unknown);
        assert!(!gate.allows(&stop_location()));
    }
}
