use anyhow::{Context, Result};
use log::info;
use std::env;

use navier_stokes_rs::communication::Communication;
use navier_stokes_rs::{Config, Simulation, SolverError};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 && args.len() != 4 {
        eprintln!("Usage: {} <config.dat> [i_proc j_proc]", args[0]);
        eprintln!("  config.dat    - key-value file with the case parameters");
        eprintln!("  i_proc j_proc - optional 2D process decomposition");
        std::process::exit(1);
    }

    let code = match run(&args) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{err:#}");
            match err.downcast_ref::<SolverError>() {
                Some(SolverError::DecompositionMismatch { .. }) => 2,
                _ => 1,
            }
        }
    };
    std::process::exit(code);
}

fn run(args: &[String]) -> Result<()> {
    let mut config =
        Config::from_file(&args[1]).with_context(|| format!("cannot load {}", args[1]))?;
    if args.len() == 4 {
        config.iproc = parse_proc(&args[2])?;
        config.jproc = parse_proc(&args[3])?;
    }

    let comm = build_communication(&config)?;

    if comm.rank() == 0 {
        info!("loaded configuration from {}", args[1]);
        info!("  grid: {}x{} on {}x{} processes", config.imax, config.jmax, config.iproc, config.jproc);
        info!("  nu = {}, omega = {}, eps = {}, itermax = {}", config.nu, config.omg, config.eps, config.itermax);
        info!("  t_end = {}, output every {}", config.t_end, config.dt_value);
        info!(
            "  energy equation {}, turbulence {}",
            if config.energy_eq { "on" } else { "off" },
            if config.turbulence { "on" } else { "off" }
        );
        match &config.geo_file {
            Some(path) => info!("  geometry from {path}"),
            None => info!("  built-in lid-driven cavity geometry"),
        }
    }

    let mut simulation = Simulation::new(config, comm)?;
    simulation.run().context("simulation aborted")?;
    Ok(())
}

fn parse_proc(arg: &str) -> Result<usize, SolverError> {
    arg.parse()
        .map_err(|_| SolverError::Configuration(format!("invalid process count '{arg}'")))
}

#[cfg(feature = "mpi")]
fn build_communication(config: &Config) -> Result<Box<dyn Communication>, SolverError> {
    use navier_stokes_rs::communication::MpiComm;
    Ok(Box::new(MpiComm::init(config.iproc, config.jproc)?))
}

#[cfg(not(feature = "mpi"))]
fn build_communication(config: &Config) -> Result<Box<dyn Communication>, SolverError> {
    use navier_stokes_rs::communication::SerialComm;
    if config.iproc * config.jproc != 1 {
        return Err(SolverError::DecompositionMismatch {
            iproc: config.iproc,
            jproc: config.jproc,
            size: 1,
        });
    }
    Ok(Box::new(SerialComm))
}
