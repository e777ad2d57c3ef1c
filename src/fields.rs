use crate::config::Config;
use crate::discretization::Discretization;
use crate::domain::Domain;
use crate::error::{Result, SolverError};
use crate::grid::{CellType, Grid};
use crate::matrix::Matrix;
use crate::Float;

/// Container and modifier for the physical fields. Every matrix spans the
/// subdomain plus one ghost layer, (size_x + 2) x (size_y + 2); velocities
/// live on the east/north faces of their cell (MAC staggering).
#[derive(Debug, Clone)]
pub struct Fields {
    pub u: Matrix<Float>,
    pub v: Matrix<Float>,
    pub p: Matrix<Float>,
    pub f: Matrix<Float>,
    pub g: Matrix<Float>,
    pub rs: Matrix<Float>,

    pub t: Matrix<Float>,
    pub k: Matrix<Float>,
    pub e: Matrix<Float>,
    pub nu_t: Matrix<Float>,

    // low-Reynolds auxiliaries
    pub re_t: Matrix<Float>,
    pub damp_mu: Matrix<Float>,
    pub damp2: Matrix<Float>,
    pub yplus: Matrix<Float>,
    pub dist_x: Matrix<Float>,
    pub dist_y: Matrix<Float>,

    nu: Float,
    dt: Float,
    tau: Float,
    alpha: Float,
    beta: Float,
    gx: Float,
    gy: Float,
    c_nu: Float,
    energy_eq: bool,
    length_x: Float,
    length_y: Float,

    disc: Discretization,
}

impl Fields {
    pub fn new(config: &Config, domain: &Domain) -> Self {
        let nx = domain.size_x + 2;
        let ny = domain.size_y + 2;
        let scalar = |init: Float| Matrix::new(nx, ny, init);

        Self {
            u: scalar(config.ui),
            v: scalar(config.vi),
            p: scalar(config.pi),
            f: scalar(0.0),
            g: scalar(0.0),
            rs: scalar(0.0),
            t: scalar(config.ti),
            k: scalar(config.ki),
            e: scalar(config.ei),
            nu_t: scalar(0.09 * config.ki * config.ki / config.ei),
            re_t: scalar(0.0),
            damp_mu: scalar(1.0),
            damp2: scalar(1.0),
            yplus: scalar(0.0),
            dist_x: scalar(config.xlength),
            dist_y: scalar(config.ylength),
            nu: config.nu,
            dt: config.dt,
            tau: config.tau,
            alpha: config.alpha,
            beta: config.beta,
            gx: config.gx,
            gy: config.gy,
            c_nu: 0.09,
            energy_eq: config.energy_eq,
            length_x: config.xlength,
            length_y: config.ylength,
            disc: Discretization::new(domain.dx, domain.dy, config.gamma),
        }
    }

    pub fn dt(&self) -> Float {
        self.dt
    }

    pub fn set_dt(&mut self, dt: Float) {
        self.dt = dt;
    }

    pub fn nu(&self) -> Float {
        self.nu
    }

    pub fn c_nu(&self) -> Float {
        self.c_nu
    }

    pub fn discretization(&self) -> Discretization {
        self.disc
    }

    /// Provisional momentum fluxes F, G from the explicit momentum
    /// discretization. With turbulence the effective viscosity is
    /// face-interpolated nu + nu_t; with the energy equation the Boussinesq
    /// buoyancy term replaces part of the body force.
    pub fn calculate_fluxes(&mut self, grid: &Grid, turbulence: bool) {
        let d = self.disc;

        for j in 1..=grid.size_y() {
            for i in 1..=grid.iterm_x() {
                let nu_eff = if turbulence {
                    self.nu + 0.5 * (self.nu_t[(i, j)] + self.nu_t[(i + 1, j)])
                } else {
                    self.nu
                };
                let body = if self.energy_eq {
                    self.gx - self.beta * self.gx * 0.5 * (self.t[(i, j)] + self.t[(i + 1, j)])
                } else {
                    self.gx
                };
                self.f[(i, j)] = self.u[(i, j)]
                    + self.dt
                        * (nu_eff * d.laplacian(&self.u, i, j)
                            - d.convection_u(&self.u, &self.v, i, j)
                            + body);
            }
        }

        for j in 1..=grid.iterm_y() {
            for i in 1..=grid.size_x() {
                let nu_eff = if turbulence {
                    self.nu + 0.5 * (self.nu_t[(i, j)] + self.nu_t[(i, j + 1)])
                } else {
                    self.nu
                };
                let body = if self.energy_eq {
                    self.gy - self.beta * self.gy * 0.5 * (self.t[(i, j)] + self.t[(i, j + 1)])
                } else {
                    self.gy
                };
                self.g[(i, j)] = self.v[(i, j)]
                    + self.dt
                        * (nu_eff * d.laplacian(&self.v, i, j)
                            - d.convection_v(&self.u, &self.v, i, j)
                            + body);
            }
        }
    }

    /// Right-hand side of the pressure Poisson equation.
    pub fn calculate_rs(&mut self, grid: &Grid) {
        let dx = self.disc.dx();
        let dy = self.disc.dy();
        for j in 1..=grid.size_y() {
            for i in 1..=grid.size_x() {
                self.rs[(i, j)] = ((self.f[(i, j)] - self.f[(i - 1, j)]) / dx
                    + (self.g[(i, j)] - self.g[(i, j - 1)]) / dy)
                    / self.dt;
            }
        }
    }

    /// Projects the provisional fluxes with the pressure gradient.
    pub fn calculate_velocities(&mut self, grid: &Grid) {
        let dx = self.disc.dx();
        let dy = self.disc.dy();
        for j in 1..=grid.size_y() {
            for i in 1..=grid.iterm_x() {
                self.u[(i, j)] =
                    self.f[(i, j)] - self.dt / dx * (self.p[(i + 1, j)] - self.p[(i, j)]);
            }
        }
        for j in 1..=grid.iterm_y() {
            for i in 1..=grid.size_x() {
                self.v[(i, j)] =
                    self.g[(i, j)] - self.dt / dy * (self.p[(i, j + 1)] - self.p[(i, j)]);
            }
        }
    }

    /// Explicit temperature transport, old-state stencils.
    pub fn calculate_temperature(&mut self, grid: &Grid) {
        let d = self.disc;
        let t_old = self.t.clone();
        for &(i, j) in grid.fluid_cells() {
            self.t[(i, j)] = t_old[(i, j)]
                + self.dt
                    * (self.alpha * d.laplacian(&t_old, i, j)
                        - d.convection_scalar(&self.u, &self.v, &t_old, i, j));
        }
    }

    /// Adaptive step size from the viscous, convective and (with the energy
    /// equation) thermal stability limits. A non-positive tau keeps the
    /// configured dt.
    pub fn calculate_dt(&mut self, grid: &Grid, turbulence: bool) -> Float {
        if self.tau <= 0.0 {
            return self.dt;
        }

        let dx = grid.dx();
        let dy = grid.dy();
        let dx2 = dx * dx;
        let dy2 = dy * dy;

        let nu_eff = if turbulence {
            self.nu + self.nu_t.max_abs()
        } else {
            self.nu
        };

        let mut limit = Float::MAX;
        if nu_eff > 0.0 {
            limit = limit.min(0.5 * (dx2 * dy2) / ((dx2 + dy2) * nu_eff));
        }
        let u_max = self.u.max_abs();
        if u_max > 0.0 {
            limit = limit.min(dx / u_max);
        }
        let v_max = self.v.max_abs();
        if v_max > 0.0 {
            limit = limit.min(dy / v_max);
        }
        if self.energy_eq && self.alpha > 0.0 {
            limit = limit.min(0.5 * (dx2 * dy2) / ((dx2 + dy2) * self.alpha));
        }

        self.dt = self.tau * limit;
        self.dt
    }

    /// Eddy viscosity nu_t = f_mu * C_nu * K^2 / E. The damping matrix is
    /// identically one unless the low-Re model updated it.
    pub fn calculate_nu_t(&mut self, grid: &Grid) {
        for &(i, j) in grid.fluid_cells() {
            self.nu_t[(i, j)] =
                self.damp_mu[(i, j)] * self.c_nu * self.k[(i, j)] * self.k[(i, j)]
                    / self.e[(i, j)];
        }
    }

    /// Distance from each fluid cell center to the nearest wall face along
    /// x and y. Subdomain-local: a ghost layer is treated as open fluid.
    pub fn calculate_walldist(&mut self, grid: &Grid) {
        let dx = self.disc.dx();
        let dy = self.disc.dy();

        let is_wall = |i: usize, j: usize| {
            !matches!(
                grid.cell(i, j).cell_type(),
                CellType::Fluid | CellType::Ghost
            )
        };

        for &(i, j) in grid.fluid_cells() {
            let mut west = None;
            for n in 1..=i {
                if is_wall(i - n, j) {
                    west = Some(n);
                    break;
                }
            }
            let mut east = None;
            for n in 1..grid.size_x() + 2 - i {
                if is_wall(i + n, j) {
                    east = Some(n);
                    break;
                }
            }
            let steps_x = west.unwrap_or(usize::MAX).min(east.unwrap_or(usize::MAX));
            self.dist_x[(i, j)] = if steps_x == usize::MAX {
                self.length_x
            } else {
                (steps_x as Float - 0.5) * dx
            };

            let mut south = None;
            for n in 1..=j {
                if is_wall(i, j - n) {
                    south = Some(n);
                    break;
                }
            }
            let mut north = None;
            for n in 1..grid.size_y() + 2 - j {
                if is_wall(i, j + n) {
                    north = Some(n);
                    break;
                }
            }
            let steps_y = south.unwrap_or(usize::MAX).min(north.unwrap_or(usize::MAX));
            self.dist_y[(i, j)] = if steps_y == usize::MAX {
                self.length_y
            } else {
                (steps_y as Float - 0.5) * dy
            };
        }
    }

    /// Wall coordinate y+ = u_tau * dist / nu with u_tau = C_nu^1/4 sqrt(K).
    pub fn calculate_yplus(&mut self, grid: &Grid) {
        for &(i, j) in grid.fluid_cells() {
            let u_tau = self.c_nu.powf(0.25) * self.k[(i, j)].max(0.0).sqrt();
            let dist = self.dist_x[(i, j)].min(self.dist_y[(i, j)]);
            self.yplus[(i, j)] = u_tau * dist / self.nu;
        }
    }

    /// Lam-Bremhorst damping factors from the turbulent Reynolds number and
    /// the wall coordinate.
    pub fn calculate_damping(&mut self, grid: &Grid) {
        for &(i, j) in grid.fluid_cells() {
            let re_t = self.k[(i, j)] * self.k[(i, j)] / (self.nu * self.e[(i, j)]);
            self.re_t[(i, j)] = re_t;

            let f_mu = (1.0 - (-0.0165 * self.yplus[(i, j)]).exp()).powi(2)
                * (1.0 + 20.5 / re_t.max(1e-10));
            self.damp_mu[(i, j)] = f_mu.clamp(0.0, 1.0);
            self.damp2[(i, j)] = 1.0 - (-re_t * re_t).exp();
        }
    }

    /// Fails with the offending cell if any state read by the next step is
    /// not finite.
    pub fn check_finite(
        &self,
        grid: &Grid,
        step: usize,
        energy: bool,
        turbulence: bool,
    ) -> Result<()> {
        let scan = |name: &'static str, m: &Matrix<Float>| -> Result<()> {
            for &(i, j) in grid.fluid_cells() {
                if !m[(i, j)].is_finite() {
                    return Err(SolverError::NonFiniteState {
                        field: name,
                        i,
                        j,
                        step,
                    });
                }
            }
            Ok(())
        };

        scan("U", &self.u)?;
        scan("V", &self.v)?;
        scan("P", &self.p)?;
        scan("F", &self.f)?;
        scan("G", &self.g)?;
        scan("RS", &self.rs)?;
        if energy {
            scan("T", &self.t)?;
        }
        if turbulence {
            scan("K", &self.k)?;
            scan("E", &self.e)?;
            scan("nuT", &self.nu_t)?;
        }
        Ok(())
    }
}
