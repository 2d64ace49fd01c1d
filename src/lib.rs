//! Traffic Simulation Engine
//!
//! A microscopic traffic simulation library: intersections, roads and cars
//! advanced on a fixed tick, driven by commands from any thread.

pub mod simulation;
