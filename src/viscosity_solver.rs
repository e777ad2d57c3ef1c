use crate::fields::Fields;
use crate::grid::Grid;
use crate::Float;

/// Lower bound keeping K and E strictly positive.
pub const TURB_FLOOR: Float = 1e-4;

/// Standard k-eps closure constants; `low_re` switches on the
/// Lam-Bremhorst damping factors maintained by the Fields container.
pub struct KEpsModel {
    c0: Float,
    c1: Float,
    c2: Float,
    sigma_k: Float,
    sigma_e: Float,
    low_re: bool,
}

impl KEpsModel {
    pub fn new(low_re: bool) -> Self {
        Self {
            c0: 0.09,
            c1: 1.44,
            c2: 1.92,
            sigma_k: 1.0,
            sigma_e: 1.3,
            low_re,
        }
    }

    pub fn c0(&self) -> Float {
        self.c0
    }

    /// Explicit Euler update of K and E over the fluid cells, followed by
    /// the eddy-viscosity update. Stencils read the previous state so the
    /// result is independent of sweep order.
    pub fn solve(&self, fields: &mut Fields, grid: &Grid) {
        if self.low_re {
            fields.calculate_yplus(grid);
            fields.calculate_damping(grid);
        }

        let d = fields.discretization();
        let dt = fields.dt();
        let nu = fields.nu();
        let k_old = fields.k.clone();
        let e_old = fields.e.clone();

        for &(i, j) in grid.fluid_cells() {
            let k_conv = d.convection_scalar(&fields.u, &fields.v, &k_old, i, j);
            let k_diff = d.turbulent_laplacian(&k_old, &fields.nu_t, nu, self.sigma_k, i, j);
            let production =
                (nu + fields.nu_t[(i, j)]) * d.strain_rate(&fields.u, &fields.v, i, j);

            let e_conv = d.convection_scalar(&fields.u, &fields.v, &e_old, i, j);
            let e_diff = d.turbulent_laplacian(&e_old, &fields.nu_t, nu, self.sigma_e, i, j);
            let f2 = if self.low_re {
                fields.damp2[(i, j)]
            } else {
                1.0
            };

            let k = k_old[(i, j)];
            let e = e_old[(i, j)];
            let k_new = k + dt * (-k_conv + k_diff + production - e);
            let e_new = e
                + dt * (-e_conv + e_diff + self.c1 * (e / k) * production
                    - self.c2 * f2 * e * e / k);

            fields.k[(i, j)] = k_new.max(TURB_FLOOR);
            fields.e[(i, j)] = e_new.max(TURB_FLOOR);
        }

        fields.calculate_nu_t(grid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::{Domain, NeighborPresence};
    use crate::geometry;
    use approx::assert_relative_eq;

    fn setup() -> (Grid, Fields) {
        let cfg = Config::from_str(
            "xlength 1.0\nylength 1.0\nimax 6\njmax 6\nt_end 1.0\nnu 0.01\n\
             omg 1.7\neps 0.001\nitermax 100\nwall_vel_8 1.0\nturbulence on\n\
             KI 0.02\nEI 0.05\n",
        )
        .unwrap();
        let domain = Domain::serial(6, 6, 1.0, 1.0);
        let raster = geometry::lid_driven_cavity(6, 6);
        let grid = Grid::build(&raster, domain, NeighborPresence::default()).unwrap();
        let fields = Fields::new(&cfg, grid.domain());
        (grid, fields)
    }

    #[test]
    fn quiescent_turbulence_decays() {
        let (grid, mut fields) = setup();
        fields.set_dt(0.01);
        let model = KEpsModel::new(false);
        model.solve(&mut fields, &grid);

        // no flow: K loses dt * E, E loses dt * C2 * E^2 / K
        let k_expected = 0.02 - 0.01 * 0.05;
        let e_expected = 0.05 - 0.01 * 1.92 * 0.05 * 0.05 / 0.02;
        assert_relative_eq!(fields.k[(3, 3)], k_expected, epsilon = 1e-12);
        assert_relative_eq!(fields.e[(3, 3)], e_expected, epsilon = 1e-12);
        // eddy viscosity follows the updated state
        assert_relative_eq!(
            fields.nu_t[(3, 3)],
            0.09 * k_expected * k_expected / e_expected,
            epsilon = 1e-12
        );
    }

    #[test]
    fn k_and_e_stay_above_the_floor() {
        let (grid, mut fields) = setup();
        fields.set_dt(10.0); // drastic step so the raw update goes negative
        let model = KEpsModel::new(false);
        model.solve(&mut fields, &grid);
        for &(i, j) in grid.fluid_cells() {
            assert!(fields.k[(i, j)] >= TURB_FLOOR);
            assert!(fields.e[(i, j)] >= TURB_FLOOR);
            assert!(fields.nu_t[(i, j)].is_finite());
        }
    }

    #[test]
    fn shear_produces_turbulent_energy() {
        let (grid, mut fields) = setup();
        fields.set_dt(0.001);
        // strong linear shear: production outweighs dissipation
        for j in 0..8 {
            for i in 0..8 {
                fields.u[(i, j)] = 5.0 * j as Float;
            }
        }
        let k_before = fields.k[(3, 3)];
        let model = KEpsModel::new(false);
        model.solve(&mut fields, &grid);
        assert!(
            fields.k[(3, 3)] > k_before,
            "shear should feed K: {} -> {}",
            k_before,
            fields.k[(3, 3)]
        );
    }

    #[test]
    fn low_re_damping_reduces_eddy_viscosity() {
        let (grid, mut fields_hi) = setup();
        let (_, mut fields_lo) = setup();
        fields_hi.set_dt(0.001);
        fields_lo.set_dt(0.001);
        fields_lo.calculate_walldist(&grid);

        KEpsModel::new(false).solve(&mut fields_hi, &grid);
        KEpsModel::new(true).solve(&mut fields_lo, &grid);

        // near-wall cell: the damped eddy viscosity must not exceed the
        // high-Re value
        assert!(fields_lo.nu_t[(1, 1)] <= fields_hi.nu_t[(1, 1)] + 1e-15);
    }
}
