use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};

use crate::boundary::Boundary;
use crate::communication::Communication;
use crate::config::{Config, PressureSolverKind, TurbulenceModel};
use crate::domain::Domain;
use crate::error::{Result, SolverError};
use crate::fields::Fields;
use crate::geometry;
use crate::gpu::JacobiGpuSolver;
use crate::grid::Grid;
use crate::output::VtkWriter;
use crate::pressure_solver::{PressureSolver, SorSolver};
use crate::viscosity_solver::KEpsModel;
use crate::Float;

/// Owns the complete per-rank state of a run and advances it one
/// fractional-step update at a time.
pub struct Simulation {
    config: Config,
    grid: Grid,
    fields: Fields,
    boundaries: Vec<Boundary>,
    pressure_solver: Box<dyn PressureSolver>,
    turbulence_model: Option<KEpsModel>,
    comm: Box<dyn Communication>,
    writer: VtkWriter,
    t: Float,
    step: usize,
    non_converged: usize,
}

impl Simulation {
    pub fn new(config: Config, comm: Box<dyn Communication>) -> Result<Self> {
        if comm.size() != config.iproc * config.jproc {
            return Err(SolverError::DecompositionMismatch {
                iproc: config.iproc,
                jproc: config.jproc,
                size: comm.size(),
            });
        }

        let (ci, cj) = comm.coords();
        let (domain, presence) = Domain::decompose(
            config.imax,
            config.jmax,
            config.xlength,
            config.ylength,
            config.iproc,
            config.jproc,
            ci,
            cj,
        );

        let raster = match &config.geo_file {
            Some(path) => geometry::from_pgm_file(path, config.imax, config.jmax)?,
            None => geometry::lid_driven_cavity(config.imax, config.jmax),
        };
        let grid = Grid::build(&raster, domain, presence)?;

        let mut fields = Fields::new(&config, grid.domain());
        let boundaries = Boundary::assemble(&grid, &config);

        let pressure_solver: Box<dyn PressureSolver> = match config.pressure_solver {
            PressureSolverKind::Sor => Box::new(SorSolver::new(config.omg)),
            PressureSolverKind::JacobiGpu => Box::new(JacobiGpuSolver::new(&grid)?),
        };

        let turbulence_model = config
            .turbulence
            .then(|| KEpsModel::new(config.model == TurbulenceModel::LowRe));
        if config.turbulence && config.model == TurbulenceModel::LowRe {
            fields.calculate_walldist(&grid);
        }

        let writer = VtkWriter::new(&config.output_dir, comm.rank(), comm.size());

        Ok(Self {
            config,
            grid,
            fields,
            boundaries,
            pressure_solver,
            turbulence_model,
            comm,
            writer,
            t: 0.0,
            step: 0,
            non_converged: 0,
        })
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn time(&self) -> Float {
        self.t
    }

    pub fn step_count(&self) -> usize {
        self.step
    }

    pub fn non_converged_steps(&self) -> usize {
        self.non_converged
    }

    /// One full fractional step: adaptive dt, boundary velocities, scalar
    /// transports, fluxes, pressure projection, velocity correction, halo
    /// refresh.
    pub fn advance(&mut self) -> Result<()> {
        let turbulence = self.turbulence_model.is_some();

        let local_dt = self.fields.calculate_dt(&self.grid, turbulence);
        let dt = self.comm.reduce_min(local_dt);
        self.fields.set_dt(dt);

        for boundary in &self.boundaries {
            boundary.apply_velocity(&self.grid, &mut self.fields);
        }

        if self.config.energy_eq {
            self.fields.calculate_temperature(&self.grid);
            self.comm.communicate(&mut self.fields.t);
            for boundary in &self.boundaries {
                boundary.apply_temperature(&self.grid, &mut self.fields);
            }
        }

        if let Some(model) = &self.turbulence_model {
            model.solve(&mut self.fields, &self.grid);
            self.comm.communicate(&mut self.fields.k);
            self.comm.communicate(&mut self.fields.e);
            self.comm.communicate(&mut self.fields.nu_t);
            for boundary in &self.boundaries {
                boundary.apply_turbulence(&self.grid, &mut self.fields);
            }
        }

        self.fields.calculate_fluxes(&self.grid, turbulence);
        for boundary in &self.boundaries {
            boundary.apply_flux(&self.grid, &mut self.fields);
        }
        self.comm.communicate(&mut self.fields.f);
        self.comm.communicate(&mut self.fields.g);

        self.fields.calculate_rs(&self.grid);

        let mut residual = Float::MAX;
        let mut iterations = 0;
        while residual > self.config.eps && iterations < self.config.itermax {
            residual = self.pressure_solver.solve(
                &mut self.fields,
                &self.grid,
                &self.boundaries,
                self.comm.as_ref(),
            )?;
            iterations += 1;
        }
        if residual > self.config.eps {
            warn!(
                "step {}: pressure iteration stopped at residual {:.3e} after {} sweeps",
                self.step, residual, iterations
            );
            self.non_converged += 1;
        } else {
            debug!(
                "step {}: pressure converged to {:.3e} in {} sweeps",
                self.step, residual, iterations
            );
        }

        self.fields.calculate_velocities(&self.grid);
        self.comm.communicate(&mut self.fields.u);
        self.comm.communicate(&mut self.fields.v);

        self.fields.check_finite(
            &self.grid,
            self.step,
            self.config.energy_eq,
            turbulence,
        )?;

        self.t += dt;
        self.step += 1;
        Ok(())
    }

    /// Runs until t_end, writing snapshots on the configured cadence.
    pub fn run(&mut self) -> Result<()> {
        info!(
            "starting simulation: {}x{} cells, {} fluid, rank {}/{}",
            self.grid.size_x(),
            self.grid.size_y(),
            self.grid.fluid_cells().len(),
            self.comm.rank(),
            self.comm.size()
        );

        if self.comm.rank() == 0 {
            if let Err(e) = self.config.write_provenance() {
                warn!("could not write case_config.json: {e}");
            }
        }
        if let Err(e) = self.writer.write_geometry(&self.grid) {
            warn!("could not write geometry file: {e}");
        }
        self.write_snapshot();

        let progress = if self.comm.rank() == 0 {
            let pb = ProgressBar::new(1000);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {percent}% {msg}",
                    )
                    .unwrap()
                    .progress_chars("#>-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut next_output = self.config.dt_value;
        while self.t < self.config.t_end {
            self.advance()?;

            progress.set_position((1000.0 * self.t / self.config.t_end) as u64);
            progress.set_message(format!(
                "t = {:.3}, dt = {:.2e}",
                self.t,
                self.fields.dt()
            ));

            if self.t >= next_output {
                self.write_snapshot();
                while next_output <= self.t {
                    next_output += self.config.dt_value;
                }
            }
        }

        self.write_snapshot();
        progress.finish_with_message(format!("finished after {} steps", self.step));

        if let Err(e) = self.writer.write_collection() {
            warn!("could not write collection file: {e}");
        }

        info!(
            "simulation complete: t = {:.4} after {} steps ({} without pressure convergence)",
            self.t, self.step, self.non_converged
        );
        info!(
            "output written to {}; open simulation.pvd in ParaView for the time series",
            self.config.output_dir
        );
        Ok(())
    }

    /// Snapshot writes are best-effort; a full disk must not kill the run.
    fn write_snapshot(&mut self) {
        let result = self.writer.write(
            &self.grid,
            &self.fields,
            self.step,
            self.t,
            self.config.energy_eq,
            self.config.turbulence,
        );
        match result {
            Ok(()) => debug!("wrote snapshot at t = {:.4}", self.t),
            Err(e) => warn!("skipping snapshot at t = {:.4}: {e}", self.t),
        }
    }
}
