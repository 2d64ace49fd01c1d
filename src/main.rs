use anyhow::Result;
use clap::Parser;
use log::info;
use std::thread;
use std::time::Duration;

use traffic_engine::simulation::{
    build_default_layout, EngineConfig, EngineHandle, SimEngine, SimSnapshot,
};

#[derive(Parser)]
#[command(name = "traffic_engine")]
#[command(about = "Headless traffic simulation on the built-in four-corner layout")]
struct Cli {
    /// Number of simulation ticks to run
    #[arg(long, default_value = "600")]
    ticks: u32,

    /// Seed for route choice, for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Run the engine on its own thread at wall-clock speed
    #[arg(long)]
    realtime: bool,

    /// Print a summary every this many ticks
    #[arg(long, default_value = "60")]
    report_every: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = EngineConfig {
        seed: cli.seed,
        ..EngineConfig::default()
    };

    let final_snapshot = if cli.realtime {
        run_realtime(config, cli.ticks, cli.report_every)?
    } else {
        run_headless(config, cli.ticks, cli.report_every)
    };

    log_statistics(&final_snapshot);
    Ok(())
}

/// Step the engine on this thread as fast as it will go
fn run_headless(config: EngineConfig, ticks: u32, report_every: u32) -> SimSnapshot {
    info!("Running traffic simulation in headless mode...");
    info!("Ticks: {}, Tick: {:?}", ticks, config.tick);

    let (mut engine, client) = SimEngine::new(&config);
    let layout = build_default_layout(&client);
    client.start();
    info!(
        "Posted default layout: {} intersections, {} roads, {} cars",
        layout.intersections.len(),
        layout.roads.len(),
        layout.cars.len()
    );

    // First step applies the layout and the start command
    for tick in 1..=ticks {
        engine.step();

        if report_every > 0 && tick % report_every == 0 {
            println!("--- After tick {} ---", tick);
            engine.world().print_summary(engine.simulation_time_seconds());
            engine.world().draw_map();
        }
    }

    println!("=== Final State ===");
    engine.world().print_summary(engine.simulation_time_seconds());
    engine.world().draw_map();
    engine.snapshot()
}

/// Let the engine thread tick at its own rate while this thread watches snapshots
fn run_realtime(config: EngineConfig, ticks: u32, report_every: u32) -> Result<SimSnapshot> {
    info!("Running traffic simulation in real time...");
    let tick = config.tick;
    let mut handle = EngineHandle::spawn(config)?;

    build_default_layout(handle.client());
    handle.client().start();

    let report_period = tick * report_every.max(1);
    let run_for = tick * ticks;
    let mut elapsed = Duration::ZERO;
    while elapsed < run_for {
        let wait = report_period.min(run_for - elapsed);
        thread::sleep(wait);
        elapsed += wait;

        let snapshot = handle.snapshot();
        info!(
            "t={:.2}s cars={} roads={}",
            snapshot.simulation_time_seconds(),
            snapshot.cars.len(),
            snapshot.network.road_count()
        );
        for car in &snapshot.cars {
            info!(
                "  car {:?}: road={:?} s={:.1} v={:.1} at ({:.1}, {:.1})",
                car.id.0 .0,
                car.road.map(|road| road.0 .0),
                car.s,
                car.v,
                car.position.x,
                car.position.y
            );
        }
    }

    handle.client().pause();
    let snapshot = handle.snapshot();
    handle.shutdown();
    Ok(SimSnapshot::clone(&snapshot))
}

fn log_statistics(snapshot: &SimSnapshot) {
    info!("=== SIMULATION COMPLETE ===");
    info!("Simulated time: {:.2}s", snapshot.simulation_time_seconds());
    info!("Total intersections: {}", snapshot.network.intersection_count());
    info!("Total roads: {}", snapshot.network.road_count());
    info!("Total cars: {}", snapshot.cars.len());
    info!("Road transitions: {}", snapshot.stats.road_transitions);
    info!("Dead end stops: {}", snapshot.stats.dead_end_stops);
}
