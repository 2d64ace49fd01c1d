//! Fixed-rate simulation engine
//!
//! Any thread may post [`SimCommand`]s through a [`SimClient`]. Only the
//! engine drains the queue, once per tick and before the tick's entity
//! updates, so the world has exactly one writer.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::car::CarParams;
use super::command::{ItemId, ItemMut, SimChange, SimCommand, VehicleSpawn};
use super::intersection::IntersectionParams;
use super::snapshot::SimSnapshot;
use super::types::{CarId, IdAllocator, IntersectionId, RoadId, Vec2, TICK_MS};
use super::world::SimWorld;

/// Engine settings
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Simulated time per tick, also the wall-clock period of the engine thread
    pub tick: Duration,
    /// Seed for route choice; `None` draws one from the OS
    pub seed: Option<u64>,
    /// How long shutdown waits for the engine thread before detaching it
    pub shutdown_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(TICK_MS),
            seed: None,
            shutdown_timeout: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Paused,
    Running,
}

/// Cloneable handle for posting commands from any thread
#[derive(Clone)]
pub struct SimClient {
    sender: Sender<SimCommand>,
    ids: IdAllocator,
}

impl SimClient {
    /// Queue a command for the next tick. Returns `false` once the engine is gone.
    pub fn post(&self, command: SimCommand) -> bool {
        match self.sender.send(command) {
            Ok(()) => true,
            Err(mpsc::SendError(command)) => {
                debug!("engine is gone, dropping {:?}", command);
                false
            }
        }
    }

    pub fn start(&self) -> bool {
        self.post(SimCommand::Start)
    }

    pub fn pause(&self) -> bool {
        self.post(SimCommand::Pause)
    }

    pub fn stop(&self) -> bool {
        self.post(SimCommand::Stop)
    }

    pub fn clear_all(&self) -> bool {
        self.post(SimCommand::ClearAll)
    }

    pub fn add_intersection(&self, position: Vec2, params: IntersectionParams) -> IntersectionId {
        let id = IntersectionId(self.ids.next_sim_id());
        self.post(SimCommand::AddIntersection {
            id,
            position,
            params,
        });
        id
    }

    pub fn add_road(&self, from: IntersectionId, to: IntersectionId, speed_limit: f64) -> RoadId {
        let id = RoadId(self.ids.next_sim_id());
        self.post(SimCommand::AddRoad {
            id,
            from,
            to,
            speed_limit,
        });
        id
    }

    /// Two opposing roads between `a` and `b`
    pub fn add_two_way_road(
        &self,
        a: IntersectionId,
        b: IntersectionId,
        speed_limit: f64,
    ) -> (RoadId, RoadId) {
        (
            self.add_road(a, b, speed_limit),
            self.add_road(b, a, speed_limit),
        )
    }

    pub fn add_vehicle(&self, params: CarParams, spawn: VehicleSpawn) -> CarId {
        let id = CarId(self.ids.next_sim_id());
        self.post(SimCommand::AddVehicle { id, params, spawn });
        id
    }

    pub fn delete(&self, item: impl Into<ItemId>) {
        self.post(SimCommand::Delete(item.into()));
    }

    /// Run `apply` against `item` on the simulation thread
    pub fn update(&self, item: impl Into<ItemId>, apply: impl FnOnce(ItemMut<'_>) + Send + 'static) {
        self.post(SimCommand::Update {
            item: item.into(),
            apply: Box::new(apply),
        });
    }
}

/// The world plus its clock and command queue
pub struct SimEngine {
    world: SimWorld,
    commands: Receiver<SimCommand>,
    state: RunState,
    sim_time_us: u64,
    tick_us: u64,
}

impl SimEngine {
    /// Creates a paused engine and the client that feeds it
    pub fn new(config: &EngineConfig) -> (Self, SimClient) {
        let (sender, commands) = mpsc::channel();
        let ids = IdAllocator::new();
        let engine = Self {
            world: SimWorld::with_allocator(ids.clone(), config.seed),
            commands,
            state: RunState::Paused,
            sim_time_us: 0,
            tick_us: config.tick.as_micros() as u64,
        };
        (engine, SimClient { sender, ids })
    }

    pub fn world(&self) -> &SimWorld {
        &self.world
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn simulation_time_us(&self) -> u64 {
        self.sim_time_us
    }

    pub fn simulation_time_ms(&self) -> u64 {
        self.sim_time_us / 1000
    }

    pub fn simulation_time_seconds(&self) -> f64 {
        self.sim_time_us as f64 / 1_000_000.0
    }

    /// Seconds simulated per tick
    pub fn tick_secs(&self) -> f64 {
        self.tick_us as f64 / 1_000_000.0
    }

    pub fn drain_changes(&mut self) -> Vec<SimChange> {
        self.world.drain_changes()
    }

    pub fn snapshot(&self) -> SimSnapshot {
        SimSnapshot::capture(&self.world, self.sim_time_us, self.is_running())
    }

    /// One tick: apply every queued command, then advance the world if running.
    /// Returns whether simulated time advanced.
    pub fn step(&mut self) -> bool {
        self.drain_commands();
        if self.state != RunState::Running {
            return false;
        }

        self.sim_time_us += self.tick_us;
        self.world.tick(self.tick_secs());
        true
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.apply(command);
        }
    }

    fn apply(&mut self, command: SimCommand) {
        debug!("applying {:?}", command);
        match command {
            SimCommand::Start => {
                self.state = RunState::Running;
                info!("simulation running at {:.3}s", self.simulation_time_seconds());
            }
            SimCommand::Pause => {
                self.state = RunState::Paused;
                info!("simulation paused at {:.3}s", self.simulation_time_seconds());
            }
            SimCommand::Stop => {
                self.state = RunState::Paused;
                self.sim_time_us = 0;
                self.world.reset_cars();
                info!("simulation stopped, {} cars reset", self.world.cars.len());
            }
            SimCommand::AddIntersection {
                id,
                position,
                params,
            } => ignore_stale(self.world.insert_intersection(id, position, params)),
            SimCommand::AddRoad {
                id,
                from,
                to,
                speed_limit,
            } => ignore_stale(self.world.insert_road(id, from, to, speed_limit)),
            SimCommand::AddVehicle { id, params, spawn } => {
                ignore_stale(self.world.insert_vehicle(id, params, spawn))
            }
            SimCommand::Delete(item) => {
                if !self.world.remove(item) {
                    debug!("delete of {:?} ignored, already gone", item);
                }
            }
            SimCommand::Update { item, apply } => {
                if !self.world.update_item(item, apply) {
                    debug!("update of {:?} ignored, already gone", item);
                }
            }
            SimCommand::ClearAll => {
                self.state = RunState::Paused;
                self.sim_time_us = 0;
                self.world.clear();
                info!("simulation cleared");
            }
        }
    }
}

fn ignore_stale(result: Result<()>) {
    if let Err(err) = result {
        debug!("command ignored: {:#}", err);
    }
}

/// An engine running on its own thread at a fixed rate
pub struct EngineHandle {
    client: SimClient,
    snapshot: Arc<RwLock<Arc<SimSnapshot>>>,
    changes: Mutex<Receiver<SimChange>>,
    alive: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl EngineHandle {
    /// Starts the `simulation` thread. The engine begins paused.
    pub fn spawn(config: EngineConfig) -> Result<Self> {
        let (mut engine, client) = SimEngine::new(&config);
        let snapshot = Arc::new(RwLock::new(Arc::new(engine.snapshot())));
        let (change_sender, changes) = mpsc::channel();
        let alive = Arc::new(AtomicBool::new(true));

        let thread = {
            let snapshot = Arc::clone(&snapshot);
            let alive = Arc::clone(&alive);
            let period = config.tick;
            thread::Builder::new()
                .name("simulation".to_string())
                .spawn(move || {
                    info!("simulation thread started, tick {:?}", period);
                    while alive.load(Ordering::Acquire) {
                        let started = Instant::now();
                        engine.step();
                        for change in engine.drain_changes() {
                            // Nobody listening is fine
                            let _ = change_sender.send(change);
                        }
                        let published = Arc::new(engine.snapshot());
                        *snapshot.write().unwrap_or_else(PoisonError::into_inner) = published;

                        if let Some(rest) = period.checked_sub(started.elapsed()) {
                            thread::sleep(rest);
                        }
                    }
                    info!("simulation thread stopped");
                })
                .context("Failed to spawn simulation thread")?
        };

        Ok(Self {
            client,
            snapshot,
            changes: Mutex::new(changes),
            alive,
            thread: Some(thread),
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    pub fn client(&self) -> &SimClient {
        &self.client
    }

    pub fn post(&self, command: SimCommand) -> bool {
        self.client.post(command)
    }

    /// The state published at the end of the latest tick
    pub fn snapshot(&self) -> Arc<SimSnapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn simulation_time_seconds(&self) -> f64 {
        self.snapshot().simulation_time_seconds()
    }

    /// Structural changes committed since the last call, in order
    pub fn drain_changes(&self) -> Vec<SimChange> {
        let changes = self.changes.lock().unwrap_or_else(PoisonError::into_inner);
        changes.try_iter().collect()
    }

    pub fn is_alive(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Stops the tick loop and waits for the thread, detaching it if it does
    /// not finish within the configured timeout
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.alive.store(false, Ordering::Release);

        let deadline = Instant::now() + self.shutdown_timeout;
        while !thread.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }

        if thread.is_finished() {
            if thread.join().is_err() {
                warn!("simulation thread panicked");
            }
        } else {
            warn!(
                "simulation thread did not stop within {:?}, detaching it",
                self.shutdown_timeout
            );
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
