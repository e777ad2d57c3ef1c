use crate::matrix::Matrix;
use crate::Float;

/// Pure stencil operators over (i, j). Cell sizes and the donor-cell blend
/// weight are fixed at construction; every method consults only the eight
/// neighbors of its center, which the caller guarantees exist.
#[derive(Debug, Clone, Copy)]
pub struct Discretization {
    dx: Float,
    dy: Float,
    gamma: Float,
}

impl Discretization {
    pub fn new(dx: Float, dy: Float, gamma: Float) -> Self {
        Self { dx, dy, gamma }
    }

    pub fn dx(&self) -> Float {
        self.dx
    }

    pub fn dy(&self) -> Float {
        self.dy
    }

    /// Five-point Laplacian.
    pub fn laplacian(&self, a: &Matrix<Float>, i: usize, j: usize) -> Float {
        (a[(i + 1, j)] - 2.0 * a[(i, j)] + a[(i - 1, j)]) / (self.dx * self.dx)
            + (a[(i, j + 1)] - 2.0 * a[(i, j)] + a[(i, j - 1)]) / (self.dy * self.dy)
    }

    /// Off-center part of the Laplacian, as used by the SOR update.
    pub fn sor_helper(&self, p: &Matrix<Float>, i: usize, j: usize) -> Float {
        (p[(i + 1, j)] + p[(i - 1, j)]) / (self.dx * self.dx)
            + (p[(i, j + 1)] + p[(i, j - 1)]) / (self.dy * self.dy)
    }

    /// d(u^2)/dx + d(uv)/dy at the u-face (i, j), Hirt donor-cell blend.
    pub fn convection_u(
        &self,
        u: &Matrix<Float>,
        v: &Matrix<Float>,
        i: usize,
        j: usize,
    ) -> Float {
        let du2_dx = ((u[(i, j)] + u[(i + 1, j)]) * (u[(i, j)] + u[(i + 1, j)])
            - (u[(i - 1, j)] + u[(i, j)]) * (u[(i - 1, j)] + u[(i, j)]))
            / (4.0 * self.dx)
            + self.gamma
                * ((u[(i, j)] + u[(i + 1, j)]).abs() * (u[(i, j)] - u[(i + 1, j)])
                    - (u[(i - 1, j)] + u[(i, j)]).abs() * (u[(i - 1, j)] - u[(i, j)]))
                / (4.0 * self.dx);

        let duv_dy = ((v[(i, j)] + v[(i + 1, j)]) * (u[(i, j)] + u[(i, j + 1)])
            - (v[(i, j - 1)] + v[(i + 1, j - 1)]) * (u[(i, j - 1)] + u[(i, j)]))
            / (4.0 * self.dy)
            + self.gamma
                * ((v[(i, j)] + v[(i + 1, j)]).abs() * (u[(i, j)] - u[(i, j + 1)])
                    - (v[(i, j - 1)] + v[(i + 1, j - 1)]).abs() * (u[(i, j - 1)] - u[(i, j)]))
                / (4.0 * self.dy);

        du2_dx + duv_dy
    }

    /// d(uv)/dx + d(v^2)/dy at the v-face (i, j), mirrored interpolations.
    pub fn convection_v(
        &self,
        u: &Matrix<Float>,
        v: &Matrix<Float>,
        i: usize,
        j: usize,
    ) -> Float {
        let dv2_dy = ((v[(i, j)] + v[(i, j + 1)]) * (v[(i, j)] + v[(i, j + 1)])
            - (v[(i, j - 1)] + v[(i, j)]) * (v[(i, j - 1)] + v[(i, j)]))
            / (4.0 * self.dy)
            + self.gamma
                * ((v[(i, j)] + v[(i, j + 1)]).abs() * (v[(i, j)] - v[(i, j + 1)])
                    - (v[(i, j - 1)] + v[(i, j)]).abs() * (v[(i, j - 1)] - v[(i, j)]))
                / (4.0 * self.dy);

        let duv_dx = ((u[(i, j)] + u[(i, j + 1)]) * (v[(i, j)] + v[(i + 1, j)])
            - (u[(i - 1, j)] + u[(i - 1, j + 1)]) * (v[(i - 1, j)] + v[(i, j)]))
            / (4.0 * self.dx)
            + self.gamma
                * ((u[(i, j)] + u[(i, j + 1)]).abs() * (v[(i, j)] - v[(i + 1, j)])
                    - (u[(i - 1, j)] + u[(i - 1, j + 1)]).abs() * (v[(i - 1, j)] - v[(i, j)]))
                / (4.0 * self.dx);

        dv2_dy + duv_dx
    }

    /// d(u phi)/dx + d(v phi)/dy for a cell-centered scalar.
    pub fn convection_scalar(
        &self,
        u: &Matrix<Float>,
        v: &Matrix<Float>,
        phi: &Matrix<Float>,
        i: usize,
        j: usize,
    ) -> Float {
        let dup_dx = (u[(i, j)] * (phi[(i, j)] + phi[(i + 1, j)])
            - u[(i - 1, j)] * (phi[(i - 1, j)] + phi[(i, j)]))
            / (2.0 * self.dx)
            + self.gamma
                * (u[(i, j)].abs() * (phi[(i, j)] - phi[(i + 1, j)])
                    - u[(i - 1, j)].abs() * (phi[(i - 1, j)] - phi[(i, j)]))
                / (2.0 * self.dx);

        let dvp_dy = (v[(i, j)] * (phi[(i, j)] + phi[(i, j + 1)])
            - v[(i, j - 1)] * (phi[(i, j - 1)] + phi[(i, j)]))
            / (2.0 * self.dy)
            + self.gamma
                * (v[(i, j)].abs() * (phi[(i, j)] - phi[(i, j + 1)])
                    - v[(i, j - 1)].abs() * (phi[(i, j - 1)] - phi[(i, j)]))
                / (2.0 * self.dy);

        dup_dx + dvp_dy
    }

    /// Squared strain-rate magnitude at the cell center,
    /// 2 (du/dx)^2 + 2 (dv/dy)^2 + (du/dy + dv/dx)^2.
    pub fn strain_rate(
        &self,
        u: &Matrix<Float>,
        v: &Matrix<Float>,
        i: usize,
        j: usize,
    ) -> Float {
        let du_dx = (u[(i, j)] - u[(i - 1, j)]) / self.dx;
        let dv_dy = (v[(i, j)] - v[(i, j - 1)]) / self.dy;
        let du_dy = ((u[(i - 1, j + 1)] + u[(i, j + 1)]) - (u[(i - 1, j - 1)] + u[(i, j - 1)]))
            / (4.0 * self.dy);
        let dv_dx = ((v[(i + 1, j - 1)] + v[(i + 1, j)]) - (v[(i - 1, j - 1)] + v[(i - 1, j)]))
            / (4.0 * self.dx);

        2.0 * du_dx * du_dx + 2.0 * dv_dy * dv_dy + (du_dy + dv_dx) * (du_dy + dv_dx)
    }

    /// div((nu + nu_t/sigma) grad phi) with face-interpolated diffusivities.
    pub fn turbulent_laplacian(
        &self,
        phi: &Matrix<Float>,
        nu_t: &Matrix<Float>,
        nu: Float,
        sigma: Float,
        i: usize,
        j: usize,
    ) -> Float {
        let nu_e = nu + 0.5 * (nu_t[(i, j)] + nu_t[(i + 1, j)]) / sigma;
        let nu_w = nu + 0.5 * (nu_t[(i - 1, j)] + nu_t[(i, j)]) / sigma;
        let nu_n = nu + 0.5 * (nu_t[(i, j)] + nu_t[(i, j + 1)]) / sigma;
        let nu_s = nu + 0.5 * (nu_t[(i, j - 1)] + nu_t[(i, j)]) / sigma;

        (nu_e * (phi[(i + 1, j)] - phi[(i, j)]) - nu_w * (phi[(i, j)] - phi[(i - 1, j)]))
            / (self.dx * self.dx)
            + (nu_n * (phi[(i, j + 1)] - phi[(i, j)]) - nu_s * (phi[(i, j)] - phi[(i, j - 1)]))
                / (self.dy * self.dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn matrix_from(f: impl Fn(usize, usize) -> Float, nx: usize, ny: usize) -> Matrix<Float> {
        let mut m = Matrix::new(nx, ny, 0.0);
        for j in 0..ny {
            for i in 0..nx {
                m[(i, j)] = f(i, j);
            }
        }
        m
    }

    #[test]
    fn laplacian_of_quadratic_is_constant() {
        // phi = x^2 with dx = 0.5 -> lap = 2
        let phi = matrix_from(|i, _| (0.5 * i as Float).powi(2), 5, 5);
        let d = Discretization::new(0.5, 0.5, 0.5);
        assert_relative_eq!(d.laplacian(&phi, 2, 2), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn sor_helper_is_off_center_laplacian() {
        let phi = matrix_from(|i, j| (i * 10 + j) as Float, 5, 5);
        let d = Discretization::new(1.0, 2.0, 0.0);
        let expected =
            d.laplacian(&phi, 2, 2) + 2.0 * phi[(2, 2)] * (1.0 / 1.0 + 1.0 / 4.0);
        assert_relative_eq!(d.sor_helper(&phi, 2, 2), expected, epsilon = 1e-12);
    }

    #[test]
    fn convection_vanishes_for_uniform_flow() {
        let u = matrix_from(|_, _| 0.7, 5, 5);
        let v = matrix_from(|_, _| -0.3, 5, 5);
        let d = Discretization::new(0.1, 0.2, 0.9);
        assert_relative_eq!(d.convection_u(&u, &v, 2, 2), 0.0, epsilon = 1e-12);
        assert_relative_eq!(d.convection_v(&u, &v, 2, 2), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn convection_u_linear_profile() {
        // u = x, v = 0, dx = 1: central part gives d(u^2)/dx = 2x, the
        // donor correction contributes -gamma/2 on a linear profile
        let u = matrix_from(|i, _| i as Float, 5, 5);
        let v = matrix_from(|_, _| 0.0, 5, 5);

        let central = Discretization::new(1.0, 1.0, 0.0);
        assert_relative_eq!(central.convection_u(&u, &v, 2, 2), 4.0, epsilon = 1e-12);

        let upwind = Discretization::new(1.0, 1.0, 1.0);
        assert_relative_eq!(upwind.convection_u(&u, &v, 2, 2), 3.5, epsilon = 1e-12);
    }

    #[test]
    fn convection_v_mirrors_convection_u() {
        // v = y, u = 0 must reproduce the transposed linear-profile case
        let u = matrix_from(|_, _| 0.0, 5, 5);
        let v = matrix_from(|_, j| j as Float, 5, 5);
        let d = Discretization::new(1.0, 1.0, 0.0);
        assert_relative_eq!(d.convection_v(&u, &v, 2, 2), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn scalar_convection_advects_linear_gradient() {
        // unit velocity, phi = y: d(v phi)/dy = 1 regardless of gamma
        let u = matrix_from(|_, _| 1.0, 5, 5);
        let v = matrix_from(|_, _| 1.0, 5, 5);
        let phi = matrix_from(|_, j| j as Float, 5, 5);
        let d = Discretization::new(1.0, 1.0, 0.7);
        assert_relative_eq!(d.convection_scalar(&u, &v, &phi, 2, 2), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn strain_rate_of_pure_shear() {
        // u = y, v = 0: |S|^2 = (du/dy)^2 = 1
        let u = matrix_from(|_, j| j as Float, 5, 5);
        let v = matrix_from(|_, _| 0.0, 5, 5);
        let d = Discretization::new(1.0, 1.0, 0.0);
        assert_relative_eq!(d.strain_rate(&u, &v, 2, 2), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn turbulent_laplacian_reduces_to_molecular() {
        let phi = matrix_from(|i, j| (i + 2 * j) as Float * (i as Float), 5, 5);
        let nu_t = matrix_from(|_, _| 0.0, 5, 5);
        let d = Discretization::new(0.5, 0.5, 0.0);
        let nu = 0.01;
        assert_relative_eq!(
            d.turbulent_laplacian(&phi, &nu_t, nu, 1.3, 2, 2),
            nu * d.laplacian(&phi, 2, 2),
            epsilon = 1e-12
        );
    }
}
