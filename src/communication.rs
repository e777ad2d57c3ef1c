use crate::domain::NeighborPresence;
use crate::matrix::Matrix;
use crate::Float;

/// The four halo-exchange partners of a subdomain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Down,
    Up,
}

pub const DIRECTIONS: [Direction; 4] = [
    Direction::Right,
    Direction::Left,
    Direction::Up,
    Direction::Down,
];

/// Process-decomposition context: rank identity, neighbor links, halo
/// exchange and the two collectives the solver needs. Serial runs use
/// [`SerialComm`]; the `mpi` cargo feature provides an rsmpi-backed
/// implementation with identical semantics.
pub trait Communication {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn coords(&self) -> (usize, usize);
    fn neighbor(&self, dir: Direction) -> Option<usize>;

    fn presence(&self) -> NeighborPresence {
        NeighborPresence {
            left: self.neighbor(Direction::Left).is_some(),
            right: self.neighbor(Direction::Right).is_some(),
            bottom: self.neighbor(Direction::Down).is_some(),
            top: self.neighbor(Direction::Up).is_some(),
        }
    }

    /// Exchanges the one-cell halo with every present neighbor: the
    /// outermost owned column/row is sent, the ghost column/row received.
    /// Left/right first, then up/down, so halo corners are filled
    /// transitively.
    fn communicate(&self, matrix: &mut Matrix<Float>);

    fn reduce_min(&self, value: Float) -> Float;
    fn reduce_sum(&self, value: Float) -> Float;
}

/// Row-major rank layout of the Cartesian process grid.
pub fn cart_rank(ci: usize, cj: usize, jproc: usize) -> usize {
    ci * jproc + cj
}

pub fn cart_coords(rank: usize, jproc: usize) -> (usize, usize) {
    (rank / jproc, rank % jproc)
}

pub fn neighbor_rank(
    ci: usize,
    cj: usize,
    iproc: usize,
    jproc: usize,
    dir: Direction,
) -> Option<usize> {
    match dir {
        Direction::Left => (ci > 0).then(|| cart_rank(ci - 1, cj, jproc)),
        Direction::Right => (ci + 1 < iproc).then(|| cart_rank(ci + 1, cj, jproc)),
        Direction::Down => (cj > 0).then(|| cart_rank(ci, cj - 1, jproc)),
        Direction::Up => (cj + 1 < jproc).then(|| cart_rank(ci, cj + 1, jproc)),
    }
}

/// Which column/row index is sent to, and received from, a neighbor.
pub fn send_index(matrix: &Matrix<Float>, dir: Direction) -> usize {
    match dir {
        Direction::Left | Direction::Down => 1,
        Direction::Right => matrix.num_cols() - 2,
        Direction::Up => matrix.num_rows() - 2,
    }
}

pub fn recv_index(matrix: &Matrix<Float>, dir: Direction) -> usize {
    match dir {
        Direction::Left | Direction::Down => 0,
        Direction::Right => matrix.num_cols() - 1,
        Direction::Up => matrix.num_rows() - 1,
    }
}

pub fn pack(matrix: &Matrix<Float>, dir: Direction) -> Vec<Float> {
    let idx = send_index(matrix, dir);
    match dir {
        Direction::Left | Direction::Right => {
            (0..matrix.num_rows()).map(|j| matrix[(idx, j)]).collect()
        }
        Direction::Down | Direction::Up => {
            (0..matrix.num_cols()).map(|i| matrix[(i, idx)]).collect()
        }
    }
}

pub fn unpack(matrix: &mut Matrix<Float>, dir: Direction, buffer: &[Float]) {
    let idx = recv_index(matrix, dir);
    match dir {
        Direction::Left | Direction::Right => {
            debug_assert_eq!(buffer.len(), matrix.num_rows());
            for (j, &v) in buffer.iter().enumerate() {
                matrix[(idx, j)] = v;
            }
        }
        Direction::Down | Direction::Up => {
            debug_assert_eq!(buffer.len(), matrix.num_cols());
            for (i, &v) in buffer.iter().enumerate() {
                matrix[(i, idx)] = v;
            }
        }
    }
}

/// Single-process context: no neighbors, identity reductions.
#[derive(Debug, Default)]
pub struct SerialComm;

impl Communication for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn coords(&self) -> (usize, usize) {
        (0, 0)
    }

    fn neighbor(&self, _dir: Direction) -> Option<usize> {
        None
    }

    fn communicate(&self, _matrix: &mut Matrix<Float>) {}

    fn reduce_min(&self, value: Float) -> Float {
        value
    }

    fn reduce_sum(&self, value: Float) -> Float {
        value
    }
}

#[cfg(feature = "mpi")]
pub use self::mpi_backend::MpiComm;

#[cfg(feature = "mpi")]
mod mpi_backend {
    use mpi::collective::SystemOperation;
    use mpi::topology::Communicator;
    use mpi::traits::*;

    use super::{
        cart_coords, neighbor_rank, pack, unpack, Communication, Direction, DIRECTIONS,
    };
    use crate::error::{Result, SolverError};
    use crate::matrix::Matrix;
    use crate::Float;

    /// rsmpi-backed context. The Cartesian layout is computed locally in
    /// row-major rank order; transport goes through the world communicator.
    pub struct MpiComm {
        universe: mpi::environment::Universe,
        rank: usize,
        size: usize,
        coords: (usize, usize),
        neighbors: [Option<usize>; 4],
    }

    impl MpiComm {
        pub fn init(iproc: usize, jproc: usize) -> Result<Self> {
            let universe = mpi::initialize().ok_or(SolverError::DecompositionMismatch {
                iproc,
                jproc,
                size: 0,
            })?;
            let world = universe.world();
            let size = world.size() as usize;
            if size != iproc * jproc {
                return Err(SolverError::DecompositionMismatch { iproc, jproc, size });
            }

            let rank = world.rank() as usize;
            let (ci, cj) = cart_coords(rank, jproc);
            let neighbors = [
                neighbor_rank(ci, cj, iproc, jproc, Direction::Right),
                neighbor_rank(ci, cj, iproc, jproc, Direction::Left),
                neighbor_rank(ci, cj, iproc, jproc, Direction::Up),
                neighbor_rank(ci, cj, iproc, jproc, Direction::Down),
            ];

            Ok(Self {
                universe,
                rank,
                size,
                coords: (ci, cj),
                neighbors,
            })
        }

        fn neighbor_slot(dir: Direction) -> usize {
            DIRECTIONS.iter().position(|&d| d == dir).unwrap()
        }
    }

    impl Communication for MpiComm {
        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn coords(&self) -> (usize, usize) {
            self.coords
        }

        fn neighbor(&self, dir: Direction) -> Option<usize> {
            self.neighbors[Self::neighbor_slot(dir)]
        }

        fn communicate(&self, matrix: &mut Matrix<Float>) {
            let world = self.universe.world();
            for dir in DIRECTIONS {
                let Some(peer) = self.neighbor(dir) else {
                    continue;
                };
                let send_buf = pack(matrix, dir);
                let mut recv_buf = vec![0.0 as Float; send_buf.len()];
                mpi::request::scope(|scope| {
                    let req = world
                        .process_at_rank(peer as i32)
                        .immediate_receive_into(scope, &mut recv_buf[..]);
                    world.process_at_rank(peer as i32).send(&send_buf[..]);
                    req.wait();
                });
                unpack(matrix, dir, &recv_buf);
            }
        }

        fn reduce_min(&self, value: Float) -> Float {
            let mut global = value;
            self.universe
                .world()
                .all_reduce_into(&value, &mut global, SystemOperation::min());
            global
        }

        fn reduce_sum(&self, value: Float) -> Float {
            let mut global = value;
            self.universe
                .world()
                .all_reduce_into(&value, &mut global, SystemOperation::sum());
            global
        }
    }
}
