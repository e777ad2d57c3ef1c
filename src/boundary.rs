use std::collections::BTreeMap;

use log::warn;

use crate::config::Config;
use crate::fields::Fields;
use crate::grid::{BorderPosition, Cell, Grid};
use crate::matrix::Matrix;
use crate::Float;

/// A boundary condition applied to one group of cells. Each variant
/// dispatches on the set border bits of every owned cell; all rules read
/// interior state only, so re-applying a boundary is a no-op.
#[derive(Debug, Clone)]
pub enum Boundary {
    /// No-slip wall, optionally with Dirichlet temperatures keyed by tag.
    FixedWall {
        cells: Vec<(usize, usize)>,
        wall_temps: BTreeMap<u8, Float>,
    },
    /// No-penetration wall whose tangential velocity is prescribed per tag.
    MovingWall {
        cells: Vec<(usize, usize)>,
        wall_velocities: BTreeMap<u8, Float>,
        wall_temps: BTreeMap<u8, Float>,
    },
    /// Prescribed velocity on the inflow face, turbulence quantities pinned
    /// to the inlet values.
    Inflow {
        cells: Vec<(usize, usize)>,
        u_in: Float,
        v_in: Float,
        k_in: Float,
        e_in: Float,
    },
    /// Zero-gradient velocities, pressure pinned to a reference value.
    Outflow {
        cells: Vec<(usize, usize)>,
        p_out: Float,
    },
    /// Generalized inflow: explicit face values, Neumann pressure.
    FixedVelocity {
        cells: Vec<(usize, usize)>,
        u: Float,
        v: Float,
    },
    /// Generalized outflow: everything copied from the interior neighbor.
    ZeroGradient { cells: Vec<(usize, usize)> },
}

impl Boundary {
    /// Builds the boundary set for a grid. Hot, cold and inner-obstacle
    /// cells share the fixed-wall rules; their temperatures come from the
    /// tag-keyed table.
    pub fn assemble(grid: &Grid, config: &Config) -> Vec<Boundary> {
        let mut boundaries = Vec::new();

        let mut fixed: Vec<(usize, usize)> = Vec::new();
        fixed.extend_from_slice(grid.fixed_wall_cells());
        fixed.extend_from_slice(grid.inner_obstacle_cells());
        fixed.extend_from_slice(grid.hot_wall_cells());
        fixed.extend_from_slice(grid.cold_wall_cells());
        if !fixed.is_empty() {
            boundaries.push(Boundary::FixedWall {
                cells: fixed,
                wall_temps: config.wall_temps.clone(),
            });
        }

        if !grid.moving_wall_cells().is_empty() {
            for &(i, j) in grid.moving_wall_cells() {
                let tag = grid.cell(i, j).tag();
                if !config.wall_velocities.contains_key(&tag) {
                    warn!("moving-wall tag {tag} has no wall_vel entry, assuming 0");
                    break;
                }
            }
            boundaries.push(Boundary::MovingWall {
                cells: grid.moving_wall_cells().to_vec(),
                wall_velocities: config.wall_velocities.clone(),
                wall_temps: config.wall_temps.clone(),
            });
        }

        if !grid.inflow_cells().is_empty() {
            boundaries.push(Boundary::Inflow {
                cells: grid.inflow_cells().to_vec(),
                u_in: config.uin,
                v_in: config.vin,
                k_in: config.ki,
                e_in: config.ei,
            });
        }

        if !grid.outflow_cells().is_empty() {
            boundaries.push(Boundary::Outflow {
                cells: grid.outflow_cells().to_vec(),
                p_out: config.p_out,
            });
        }

        boundaries
    }

    fn cells(&self) -> &[(usize, usize)] {
        match self {
            Boundary::FixedWall { cells, .. }
            | Boundary::MovingWall { cells, .. }
            | Boundary::Inflow { cells, .. }
            | Boundary::Outflow { cells, .. }
            | Boundary::FixedVelocity { cells, .. }
            | Boundary::ZeroGradient { cells } => cells,
        }
    }

    pub fn apply_velocity(&self, grid: &Grid, fields: &mut Fields) {
        match self {
            Boundary::FixedWall { cells, .. } => {
                dirichlet_velocity(grid, fields, cells, |_| (0.0, 0.0));
            }
            Boundary::MovingWall {
                cells,
                wall_velocities,
                ..
            } => {
                moving_wall_velocity(grid, fields, cells, wall_velocities);
            }
            Boundary::Inflow {
                cells, u_in, v_in, ..
            } => {
                dirichlet_velocity(grid, fields, cells, |_| (*u_in, *v_in));
            }
            Boundary::FixedVelocity { cells, u, v } => {
                dirichlet_velocity(grid, fields, cells, |_| (*u, *v));
            }
            Boundary::Outflow { cells, .. } | Boundary::ZeroGradient { cells } => {
                zero_gradient_velocity(grid, fields, cells);
            }
        }
    }

    pub fn apply_pressure(&self, grid: &Grid, fields: &mut Fields) {
        match self {
            Boundary::Outflow { cells, p_out } => {
                for &(i, j) in cells {
                    let cell = grid.cell(i, j);
                    if let Some(mean) = neighbor_mean(&fields.p, cell) {
                        fields.p[(i, j)] = 2.0 * p_out - mean;
                    }
                }
            }
            _ => {
                for &(i, j) in self.cells() {
                    let cell = grid.cell(i, j);
                    if let Some(mean) = neighbor_mean(&fields.p, cell) {
                        fields.p[(i, j)] = mean;
                    }
                }
            }
        }
    }

    /// Forces F = U and G = V on every border face so the divergence seen
    /// by the pressure equation is consistent with the wall velocities.
    pub fn apply_flux(&self, grid: &Grid, fields: &mut Fields) {
        for &(i, j) in self.cells() {
            let cell = grid.cell(i, j);
            if cell.is_border(BorderPosition::Right) {
                fields.f[(i, j)] = fields.u[(i, j)];
            }
            if cell.is_border(BorderPosition::Left) {
                fields.f[(i - 1, j)] = fields.u[(i - 1, j)];
            }
            if cell.is_border(BorderPosition::Top) {
                fields.g[(i, j)] = fields.v[(i, j)];
            }
            if cell.is_border(BorderPosition::Bottom) {
                fields.g[(i, j - 1)] = fields.v[(i, j - 1)];
            }
        }
    }

    pub fn apply_temperature(&self, grid: &Grid, fields: &mut Fields) {
        let wall_temps = match self {
            Boundary::FixedWall { wall_temps, .. }
            | Boundary::MovingWall { wall_temps, .. } => Some(wall_temps),
            _ => None,
        };

        for &(i, j) in self.cells() {
            let cell = grid.cell(i, j);
            let Some(mean) = neighbor_mean(&fields.t, cell) else {
                continue;
            };
            let dirichlet = wall_temps.and_then(|m| m.get(&cell.tag()));
            fields.t[(i, j)] = match dirichlet {
                Some(t_wall) => 2.0 * t_wall - mean,
                None => mean,
            };
        }
    }

    pub fn apply_turbulence(&self, grid: &Grid, fields: &mut Fields) {
        match self {
            Boundary::FixedWall { cells, .. } | Boundary::MovingWall { cells, .. } => {
                for &(i, j) in cells {
                    let cell = grid.cell(i, j);
                    // K vanishes on the wall face, E and nu_t are flat
                    if let Some(mean) = neighbor_mean(&fields.k, cell) {
                        fields.k[(i, j)] = -mean;
                    }
                    if let Some(mean) = neighbor_mean(&fields.e, cell) {
                        fields.e[(i, j)] = mean;
                    }
                    if let Some(mean) = neighbor_mean(&fields.nu_t, cell) {
                        fields.nu_t[(i, j)] = mean;
                    }
                }
            }
            Boundary::Inflow {
                cells, k_in, e_in, ..
            } => {
                let nu_t_in = fields.c_nu() * k_in * k_in / e_in;
                for &(i, j) in cells {
                    fields.k[(i, j)] = *k_in;
                    fields.e[(i, j)] = *e_in;
                    fields.nu_t[(i, j)] = nu_t_in;
                }
            }
            Boundary::Outflow { cells, .. }
            | Boundary::FixedVelocity { cells, .. }
            | Boundary::ZeroGradient { cells } => {
                for &(i, j) in cells {
                    let cell = grid.cell(i, j);
                    if let Some(mean) = neighbor_mean(&fields.k, cell) {
                        fields.k[(i, j)] = mean;
                    }
                    if let Some(mean) = neighbor_mean(&fields.e, cell) {
                        fields.e[(i, j)] = mean;
                    }
                    if let Some(mean) = neighbor_mean(&fields.nu_t, cell) {
                        fields.nu_t[(i, j)] = mean;
                    }
                }
            }
        }
    }
}

/// Mean of the field over the fluid-side neighbors of a boundary cell;
/// None for cells that touch no fluid. For single-face cells this is the
/// neighbor value itself, for convex corners the mean of both faces.
fn neighbor_mean(m: &Matrix<Float>, cell: &Cell) -> Option<Float> {
    let (i, j) = (cell.i(), cell.j());
    let mut sum = 0.0;
    let mut count = 0;
    if cell.is_border(BorderPosition::Top) {
        sum += m[(i, j + 1)];
        count += 1;
    }
    if cell.is_border(BorderPosition::Bottom) {
        sum += m[(i, j - 1)];
        count += 1;
    }
    if cell.is_border(BorderPosition::Left) {
        sum += m[(i - 1, j)];
        count += 1;
    }
    if cell.is_border(BorderPosition::Right) {
        sum += m[(i + 1, j)];
        count += 1;
    }
    (count > 0).then(|| sum / count as Float)
}

/// Velocity rule for fixed walls and inflows, where a full face vector is
/// prescribed: tangential components mirrored around the prescribed value
/// first, then normal face components set directly so they win at convex
/// corners.
fn dirichlet_velocity(
    grid: &Grid,
    fields: &mut Fields,
    cells: &[(usize, usize)],
    wall: impl Fn(&Cell) -> (Float, Float),
) {
    for &(i, j) in cells {
        let cell = grid.cell(i, j);
        let (u_w, v_w) = wall(cell);

        if cell.is_border(BorderPosition::Top) {
            fields.u[(i, j)] = 2.0 * u_w - fields.u[(i, j + 1)];
        }
        if cell.is_border(BorderPosition::Bottom) {
            fields.u[(i, j)] = 2.0 * u_w - fields.u[(i, j - 1)];
        }
        if cell.is_border(BorderPosition::Left) {
            fields.v[(i, j)] = 2.0 * v_w - fields.v[(i - 1, j)];
        }
        if cell.is_border(BorderPosition::Right) {
            fields.v[(i, j)] = 2.0 * v_w - fields.v[(i + 1, j)];
        }

        if cell.is_border(BorderPosition::Top) {
            fields.v[(i, j)] = v_w;
        }
        if cell.is_border(BorderPosition::Bottom) {
            fields.v[(i, j - 1)] = v_w;
        }
        if cell.is_border(BorderPosition::Left) {
            fields.u[(i - 1, j)] = u_w;
        }
        if cell.is_border(BorderPosition::Right) {
            fields.u[(i, j)] = u_w;
        }
    }
}

/// Moving walls prescribe only the tangential component; the normal face
/// velocity stays zero so the wall remains impermeable.
fn moving_wall_velocity(
    grid: &Grid,
    fields: &mut Fields,
    cells: &[(usize, usize)],
    wall_velocities: &BTreeMap<u8, Float>,
) {
    for &(i, j) in cells {
        let cell = grid.cell(i, j);
        let w = wall_velocities.get(&cell.tag()).copied().unwrap_or(0.0);

        if cell.is_border(BorderPosition::Top) {
            fields.u[(i, j)] = 2.0 * w - fields.u[(i, j + 1)];
        }
        if cell.is_border(BorderPosition::Bottom) {
            fields.u[(i, j)] = 2.0 * w - fields.u[(i, j - 1)];
        }
        if cell.is_border(BorderPosition::Left) {
            fields.v[(i, j)] = 2.0 * w - fields.v[(i - 1, j)];
        }
        if cell.is_border(BorderPosition::Right) {
            fields.v[(i, j)] = 2.0 * w - fields.v[(i + 1, j)];
        }

        if cell.is_border(BorderPosition::Top) {
            fields.v[(i, j)] = 0.0;
        }
        if cell.is_border(BorderPosition::Bottom) {
            fields.v[(i, j - 1)] = 0.0;
        }
        if cell.is_border(BorderPosition::Left) {
            fields.u[(i - 1, j)] = 0.0;
        }
        if cell.is_border(BorderPosition::Right) {
            fields.u[(i, j)] = 0.0;
        }
    }
}

fn zero_gradient_velocity(grid: &Grid, fields: &mut Fields, cells: &[(usize, usize)]) {
    for &(i, j) in cells {
        let cell = grid.cell(i, j);
        if cell.is_border(BorderPosition::Top) {
            fields.u[(i, j)] = fields.u[(i, j + 1)];
            fields.v[(i, j)] = fields.v[(i, j + 1)];
        }
        if cell.is_border(BorderPosition::Bottom) {
            fields.u[(i, j)] = fields.u[(i, j - 1)];
            fields.v[(i, j - 1)] = fields.v[(i, j - 2)];
        }
        if cell.is_border(BorderPosition::Left) {
            fields.u[(i - 1, j)] = fields.u[(i - 2, j)];
            fields.v[(i, j)] = fields.v[(i - 1, j)];
        }
        if cell.is_border(BorderPosition::Right) {
            fields.u[(i, j)] = fields.u[(i + 1, j)];
            fields.v[(i, j)] = fields.v[(i + 1, j)];
        }
    }
}
