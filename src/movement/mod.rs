//! Movement tracking and spawn decisions
//!
//! The tracker turns an ordered stream of position samples into distance
//! totals and spawn requests. It performs no I/O: committing a spawn is the
//! caller's job, and only a confirmed commit resets the spawn counter.

use crate::config::LootConfig;
use crate::geo::{self, Position};

/// Lifecycle of a tracking session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    Tracking,
}

/// Per-session distance bookkeeping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovementState {
    pub last_position: Option<Position>,
    /// Never decreases within a session
    pub cumulative_distance: f64,
    /// Reset only by a confirmed spawn
    pub distance_since_last_spawn: f64,
    pub last_spawn_origin: Option<Position>,
}

/// What a position sample caused
#[derive(Debug, Clone, PartialEq)]
pub enum MovementEvent {
    /// First fix of the session
    Located(Position),
    /// Distance was added
    Moved {
        cumulative: f64,
        since_last_spawn: f64,
    },
    /// Enough distance has accumulated for a new box at `at`
    SpawnRequested { at: Position },
}

/// Distance state machine for one tracking session
#[derive(Debug, Clone)]
pub struct MovementTracker {
    state: TrackerState,
    movement: MovementState,
    available: bool,
    spawn_threshold_m: f64,
    max_accuracy_m: f64,
}

impl MovementTracker {
    pub fn new(spawn_threshold_m: f64, max_accuracy_m: f64) -> Self {
        Self {
            state: TrackerState::Idle,
            movement: MovementState::default(),
            available: true,
            spawn_threshold_m,
            max_accuracy_m,
        }
    }

    pub fn from_config(config: &LootConfig) -> Self {
        Self::new(config.spawn_threshold_m, config.max_accuracy_m)
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn is_tracking(&self) -> bool {
        self.state == TrackerState::Tracking
    }

    pub fn movement(&self) -> &MovementState {
        &self.movement
    }

    pub fn cumulative_distance(&self) -> f64 {
        self.movement.cumulative_distance
    }

    pub fn distance_since_last_spawn(&self) -> f64 {
        self.movement.distance_since_last_spawn
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Begin a fresh session
    pub fn start(&mut self) {
        self.state = TrackerState::Tracking;
        self.movement = MovementState::default();
        self.available = true;
        log::debug!("Movement tracking started");
    }

    /// End the session and hand back its final state
    pub fn stop(&mut self) -> MovementState {
        self.state = TrackerState::Idle;
        log::debug!(
            "Movement tracking stopped after {}",
            geo::format_distance(self.movement.cumulative_distance)
        );
        std::mem::take(&mut self.movement)
    }

    /// Record provider liveness. While unavailable, samples are ignored and
    /// the accumulated state is left exactly as it was.
    pub fn set_available(&mut self, available: bool) {
        if self.available != available {
            log::debug!("Location availability changed: {available}");
        }
        self.available = available;
    }

    /// Whether `on_position` would take this sample into account
    pub fn accepts(&self, position: &Position) -> bool {
        self.is_tracking() && self.available && Self::is_usable(position, self.max_accuracy_m)
    }

    /// Feed one sample
    pub fn on_position(&mut self, position: Position) -> Vec<MovementEvent> {
        if !self.is_tracking() || !self.available {
            return Vec::new();
        }
        if !Self::is_usable(&position, self.max_accuracy_m) {
            log::debug!(
                "Ignoring sample at {} with accuracy {}m",
                geo::format_coordinates(&position),
                position.accuracy
            );
            return Vec::new();
        }

        let Some(last) = self.movement.last_position else {
            self.movement.last_position = Some(position);
            self.movement.last_spawn_origin = Some(position);
            log::debug!("Located at {}", geo::format_coordinates(&position));
            return vec![MovementEvent::Located(position)];
        };

        let mut events = Vec::with_capacity(2);
        let d = geo::distance(&last, &position);
        if d > 0.0 {
            self.movement.cumulative_distance += d;
            self.movement.distance_since_last_spawn += d;
            self.movement.last_position = Some(position);
            events.push(MovementEvent::Moved {
                cumulative: self.movement.cumulative_distance,
                since_last_spawn: self.movement.distance_since_last_spawn,
            });
        }

        if self.movement.distance_since_last_spawn >= self.spawn_threshold_m {
            log::debug!(
                "Spawn requested after {}",
                geo::format_distance(self.movement.distance_since_last_spawn)
            );
            events.push(MovementEvent::SpawnRequested { at: position });
        }

        events
    }

    /// Record that a spawn requested at `at` was committed
    pub fn confirm_spawn(&mut self, at: Position) {
        if !self.is_tracking() {
            return;
        }
        self.movement.distance_since_last_spawn = 0.0;
        self.movement.last_spawn_origin = Some(at);
        log::debug!("Spawn confirmed at {}", geo::format_coordinates(&at));
    }

    fn is_usable(position: &Position, max_accuracy_m: f64) -> bool {
        position.latitude.is_finite()
            && position.longitude.is_finite()
            && position.accuracy < max_accuracy_m
    }
}

impl Default for MovementTracker {
    fn default() -> Self {
        Self::from_config(&LootConfig::default())
    }
}
