pub mod boundary;
pub mod communication;
pub mod config;
pub mod discretization;
pub mod domain;
pub mod error;
pub mod fields;
pub mod geometry;
pub mod gpu;
pub mod grid;
pub mod matrix;
pub mod output;
pub mod pressure_solver;
pub mod solver;
pub mod viscosity_solver;

pub use communication::Communication;
pub use config::Config;
pub use error::SolverError;
pub use fields::Fields;
pub use grid::Grid;
pub use matrix::Matrix;
pub use output::VtkWriter;
pub use pressure_solver::{PressureSolver, SorSolver};
pub use solver::Simulation;

pub type Float = f64;
