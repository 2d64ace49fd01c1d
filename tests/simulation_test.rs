use std::process::{Command, Output};

fn run_simulation(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_traffic_engine"))
        .args(args)
        .env("RUST_LOG", "warn,traffic_engine=info")
        .output()
        .expect("Failed to execute simulation")
}

/// Test that the simulation runs in headless mode without crashing
#[test]
fn test_headless_simulation_runs() {
    let output = run_simulation(&["--ticks", "120", "--seed", "7", "--report-every", "0"]);

    assert!(
        output.status.success(),
        "Simulation failed to run in headless mode. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("SIMULATION COMPLETE"),
        "Simulation did not complete properly. stderr: {}",
        stderr
    );
}

/// Test that simulation statistics are logged
#[test]
fn test_simulation_statistics_logged() {
    let output = run_simulation(&["--ticks", "120", "--seed", "7", "--report-every", "0"]);
    assert!(output.status.success(), "Simulation failed to run");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Total intersections: 4"), "stderr: {}", stderr);
    assert!(stderr.contains("Total roads: 8"), "stderr: {}", stderr);
    assert!(stderr.contains("Total cars: 4"), "stderr: {}", stderr);
    assert!(stderr.contains("Simulated time: 1.92s"), "stderr: {}", stderr);
}

/// Test that periodic reports print the map
#[test]
fn test_reports_draw_map() {
    let output = run_simulation(&["--ticks", "60", "--seed", "7", "--report-every", "30"]);
    assert!(output.status.success(), "Simulation failed to run");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--- After tick 30 ---"));
    assert!(stdout.contains("--- After tick 60 ---"));
    assert!(stdout.contains("=== World Map ==="));
    assert!(stdout.contains("=== Final State ==="));
}

/// Test that the threaded engine completes too
#[test]
fn test_realtime_simulation_runs() {
    let output = run_simulation(&["--realtime", "--ticks", "30", "--seed", "7", "--report-every", "10"]);
    assert!(
        output.status.success(),
        "Realtime simulation failed. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("SIMULATION COMPLETE"));
    assert!(stderr.contains("Total cars: 4"));
}
