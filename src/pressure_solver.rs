use crate::boundary::Boundary;
use crate::communication::Communication;
use crate::error::Result;
use crate::fields::Fields;
use crate::grid::Grid;
use crate::Float;

/// One pressure-Poisson relaxation pass: sweep, boundary pass, halo
/// exchange, globally reduced RMS residual. The driver owns the outer
/// iteration so every implementation reports a comparable residual
/// trajectory.
pub trait PressureSolver {
    fn solve(
        &mut self,
        fields: &mut Fields,
        grid: &Grid,
        boundaries: &[Boundary],
        comm: &dyn Communication,
    ) -> Result<Float>;
}

/// Successive over-relaxation in lexicographic cell order.
pub struct SorSolver {
    omega: Float,
}

impl SorSolver {
    pub fn new(omega: Float) -> Self {
        Self { omega }
    }
}

impl PressureSolver for SorSolver {
    fn solve(
        &mut self,
        fields: &mut Fields,
        grid: &Grid,
        boundaries: &[Boundary],
        comm: &dyn Communication,
    ) -> Result<Float> {
        let d = fields.discretization();
        let dx = grid.dx();
        let dy = grid.dy();
        let coeff = self.omega / (2.0 * (1.0 / (dx * dx) + 1.0 / (dy * dy)));

        for &(i, j) in grid.fluid_cells() {
            let off_center = d.sor_helper(&fields.p, i, j);
            fields.p[(i, j)] = (1.0 - self.omega) * fields.p[(i, j)]
                + coeff * (off_center - fields.rs[(i, j)]);
        }

        for boundary in boundaries {
            boundary.apply_pressure(grid, fields);
        }
        comm.communicate(&mut fields.p);

        Ok(residual_rms(fields, grid, comm))
    }
}

/// RMS of (laplacian(P) - RS) over the global fluid-cell count. Ghosts must
/// be current, which the boundary pass and halo exchange above guarantee.
pub fn residual_rms(fields: &Fields, grid: &Grid, comm: &dyn Communication) -> Float {
    let d = fields.discretization();
    let mut local = 0.0;
    for &(i, j) in grid.fluid_cells() {
        let val = d.laplacian(&fields.p, i, j) - fields.rs[(i, j)];
        local += val * val;
    }
    let total = comm.reduce_sum(local);
    let cells = comm.reduce_sum(grid.fluid_cells().len() as Float);
    (total / cells).sqrt()
}
