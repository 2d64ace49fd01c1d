//! Traffic signal phase machine
//!
//! A signalised intersection owns one [`SignalGroup`] per registered incoming
//! road and gives each a GREEN/YELLOW turn in registration order.

use log::trace;

use super::types::{RoadId, SignalGroupId};

/// State of one signal head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightState {
    Green,
    Yellow,
    Red,
}

/// The light protecting a single incoming road
#[derive(Debug, Clone, PartialEq)]
pub struct SignalGroup {
    pub id: SignalGroupId,
    pub road: RoadId,
    pub state: LightState,
}

/// Round-robin phase controller
#[derive(Debug, Clone)]
pub struct SignalController {
    total_cycle_time: f64,
    yellow_duration: f64,
    green_duration: f64,
    /// Groups in cycle order; the active phase indexes into this
    cycle: Vec<SignalGroup>,
    current_phase: usize,
    phase_timer: f64,
}

impl SignalController {
    pub fn new(total_cycle_time: f64, yellow_duration: f64) -> Self {
        let mut controller = Self {
            total_cycle_time,
            yellow_duration,
            green_duration: 0.0,
            cycle: Vec::new(),
            current_phase: 0,
            phase_timer: 0.0,
        };
        controller.recalculate_durations();
        controller
    }

    pub fn total_cycle_time(&self) -> f64 {
        self.total_cycle_time
    }

    pub fn yellow_duration(&self) -> f64 {
        self.yellow_duration
    }

    pub fn green_duration(&self) -> f64 {
        self.green_duration
    }

    /// Length of one phase: green followed by yellow
    pub fn phase_duration(&self) -> f64 {
        self.green_duration + self.yellow_duration
    }

    pub fn current_phase(&self) -> usize {
        self.current_phase
    }

    pub fn phase_timer(&self) -> f64 {
        self.phase_timer
    }

    pub fn phase_count(&self) -> usize {
        self.cycle.len()
    }

    pub fn groups(&self) -> &[SignalGroup] {
        &self.cycle
    }

    /// The road whose group currently holds the phase
    pub fn active_road(&self) -> Option<RoadId> {
        self.cycle.get(self.current_phase).map(|group| group.road)
    }

    pub fn set_total_cycle_time(&mut self, total_cycle_time: f64) {
        self.total_cycle_time = total_cycle_time;
        self.recalculate_durations();
    }

    pub fn set_yellow_duration(&mut self, yellow_duration: f64) {
        self.yellow_duration = yellow_duration;
        self.recalculate_durations();
    }

    /// Appends a group for `road` to the cycle.
    ///
    /// The first group registered starts GREEN, later ones RED. Registering
    /// the same road twice is a no-op.
    pub fn register_incoming_road(&mut self, road: RoadId, group_id: SignalGroupId) {
        if self.cycle.iter().any(|group| group.road == road) {
            return;
        }
        let state = if self.cycle.is_empty() {
            LightState::Green
        } else {
            LightState::Red
        };
        self.cycle.push(SignalGroup {
            id: group_id,
            road,
            state,
        });
        self.recalculate_durations();
    }

    /// Removes the group protecting `road`, if any.
    ///
    /// If the active group goes away the phase passes to whichever group now
    /// occupies its slot (wrapping to the start), restarting the phase timer.
    pub fn unregister_incoming_road(&mut self, road: RoadId) {
        let Some(index) = self.cycle.iter().position(|group| group.road == road) else {
            return;
        };
        self.cycle.remove(index);
        self.recalculate_durations();

        if self.cycle.is_empty() {
            self.current_phase = 0;
            self.phase_timer = 0.0;
            return;
        }

        if index < self.current_phase {
            self.current_phase -= 1;
        } else if index == self.current_phase {
            if self.current_phase >= self.cycle.len() {
                self.current_phase = 0;
            }
            self.phase_timer = 0.0;
            for (i, group) in self.cycle.iter_mut().enumerate() {
                group.state = if i == self.current_phase {
                    LightState::Green
                } else {
                    LightState::Red
                };
            }
        }
    }

    /// Advances the phase machine by `delta_secs`
    pub fn update(&mut self, delta_secs: f64) {
        if self.cycle.is_empty() {
            return;
        }
        if self.current_phase >= self.cycle.len() {
            self.current_phase = 0;
        }

        self.phase_timer += delta_secs;

        let phase_length = self.phase_duration();
        let current = self.current_phase;
        if self.phase_timer < self.green_duration {
            self.cycle[current].state = LightState::Green;
        } else if self.phase_timer < phase_length {
            self.cycle[current].state = LightState::Yellow;
        } else {
            self.cycle[current].state = LightState::Red;
            self.current_phase = (current + 1) % self.cycle.len();
            self.cycle[self.current_phase].state = LightState::Green;
            self.phase_timer = 0.0;
            trace!(
                "signal phase {} -> {} (road {:?})",
                current,
                self.current_phase,
                self.cycle[self.current_phase].road
            );
        }
    }

    /// Light shown to vehicles on `road`; unknown roads see RED
    pub fn state_for(&self, road: RoadId) -> LightState {
        self.cycle
            .iter()
            .find(|group| group.road == road)
            .map(|group| group.state)
            .unwrap_or(LightState::Red)
    }

    fn recalculate_durations(&mut self) {
        self.green_duration = if self.cycle.is_empty() {
            0.0
        } else {
            (self.total_cycle_time / self.cycle.len() as f64 - self.yellow_duration).max(0.0)
        };
    }
}
