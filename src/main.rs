use airtraffic_lib::airport::demo_airport;
use airtraffic_lib::cli::{Cli, Commands};
use airtraffic_lib::io;
use airtraffic_lib::scenario::{self, Scenario, ScenarioParams};
use airtraffic_lib::sim::SimParams;
use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::time::Instant;

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::GenerateScenarios {
            count,
            departures,
            arrivals,
            seed,
            tag,
            config,
            data_dir,
        } => {
            let params = match config {
                Some(path) => load_params(&path),
                None => Ok(ScenarioParams {
                    departures,
                    arrivals,
                    seed,
                    ..ScenarioParams::default()
                }),
            };
            params.and_then(|p| generate_stage(&data_dir, count, &tag, p))
        }
        Commands::Simulate {
            data_dir,
            ticks,
            tick_millis,
            frame_interval,
            threads,
        } => simulate_stage(&data_dir, ticks, tick_millis, frame_interval, threads),
    };

    if let Err(err) = result {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn load_params(path: &Path) -> Result<ScenarioParams, Box<dyn Error>> {
    let text = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&text)?)
}

fn generate_stage(
    data_dir: &Path,
    count: usize,
    tag: &str,
    params: ScenarioParams,
) -> Result<(), Box<dyn Error>> {
    println!("--- Scenario Generation ---");
    println!(
        "Generating {} scenario(s), {} departure(s) and {} arrival(s) each",
        count, params.departures, params.arrivals
    );
    io::ensure_data_directories(data_dir)?;

    let airport = demo_airport();
    for id in 0..count {
        let scenario = scenario::generate(&airport, id, tag, params);
        let path = io::save_json(data_dir, &scenario)?;
        println!("Saved {}", path.display());
    }
    Ok(())
}

fn simulate_stage(
    data_dir: &Path,
    ticks: usize,
    tick_millis: u64,
    frame_interval: usize,
    threads: usize,
) -> Result<(), Box<dyn Error>> {
    println!("--- Scenario Replay ---");
    io::ensure_data_directories(data_dir)?;

    let files = io::list_files::<Scenario>(data_dir, "json")?;
    if files.is_empty() {
        return Err("no scenario files found; run generate-scenarios first".into());
    }
    let mut scenarios = Vec::with_capacity(files.len());
    for path in &files {
        scenarios.push(io::load_json::<Scenario>(path)?);
    }
    println!("Replaying {} scenario(s) on {} thread(s)", scenarios.len(), threads);

    let sim_params = SimParams {
        tick_millis,
        iterations: ticks,
        frame_interval,
    };
    let airport = demo_airport();
    let started = Instant::now();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()?;
    let reports = pool.install(|| scenario::run_batch(&airport, &scenarios, sim_params));

    for report in &reports {
        io::save_json(data_dir, report)?;
        io::save_bin(data_dir, report)?;
        println!(
            "Scenario {}-{}: {} completed, {} failed, {} stalled in {} tick(s), {} transmission(s)",
            report.tag,
            report.scenario_id,
            report.completed,
            report.failed,
            report.stalled,
            report.total_steps,
            report.transmissions
        );
    }

    println!("\n--- Replay Complete ---");
    println!("Total time: {:.2} seconds", started.elapsed().as_secs_f64());
    println!("Reports saved to: {}", data_dir.join("run").display());
    Ok(())
}
