use crate::domain::{Domain, NeighborPresence};
use crate::error::{Result, SolverError};
use crate::geometry::tags;
use crate::matrix::Matrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    Fluid,
    FixedWall,
    MovingWall,
    Inflow,
    Outflow,
    /// Generalized inflow with explicit face values.
    FixedVelocity,
    /// Generalized outflow copying from the interior.
    ZeroGradient,
    HotWall,
    ColdWall,
    InnerObstacle,
    /// Subdomain-edge cell owned by a neighbor process; filled by halo
    /// exchange instead of boundary rules.
    Ghost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderPosition {
    Top,
    Bottom,
    Left,
    Right,
}

impl BorderPosition {
    fn bit(self) -> u8 {
        match self {
            BorderPosition::Top => 1,
            BorderPosition::Bottom => 2,
            BorderPosition::Left => 4,
            BorderPosition::Right => 8,
        }
    }
}

/// One entry of the cell arena. Groups reference cells by (i, j) index
/// pairs, never by address.
#[derive(Debug, Clone, Copy)]
pub struct Cell {
    i: usize,
    j: usize,
    cell_type: CellType,
    /// Original geometry tag; wall velocity/temperature tables key on it.
    tag: u8,
    borders: u8,
}

impl Cell {
    pub fn i(&self) -> usize {
        self.i
    }

    pub fn j(&self) -> usize {
        self.j
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    pub fn tag(&self) -> u8 {
        self.tag
    }

    pub fn is_border(&self, pos: BorderPosition) -> bool {
        self.borders & pos.bit() != 0
    }

    pub fn border_count(&self) -> u32 {
        self.borders.count_ones()
    }
}

/// The geometric model: a cell arena plus index lists grouping cells by
/// role. Built once, immutable afterwards.
#[derive(Debug, Clone)]
pub struct Grid {
    cells: Matrix<Cell>,
    domain: Domain,
    fluid_cells: Vec<(usize, usize)>,
    fixed_wall_cells: Vec<(usize, usize)>,
    moving_wall_cells: Vec<(usize, usize)>,
    inflow_cells: Vec<(usize, usize)>,
    outflow_cells: Vec<(usize, usize)>,
    hot_wall_cells: Vec<(usize, usize)>,
    cold_wall_cells: Vec<(usize, usize)>,
    inner_obstacle_cells: Vec<(usize, usize)>,
    ghost_cells: Vec<(usize, usize)>,
}

impl Grid {
    /// Classifies the local slice of the global geometry raster. The raster
    /// includes the global boundary ring, so the slice for a subdomain
    /// starting at (imin, jmin) covers global columns imin-1 ..= imin+size_x
    /// and the analogous rows.
    pub fn build(
        geometry: &Matrix<u8>,
        domain: Domain,
        presence: NeighborPresence,
    ) -> Result<Self> {
        let nx = domain.size_x + 2;
        let ny = domain.size_y + 2;
        let (imin, jmin) = (domain.imin, domain.jmin);

        let tag_at = move |i: usize, j: usize| -> u8 { geometry[(imin - 1 + i, jmin - 1 + j)] };

        let on_ring = |i: usize, j: usize| i == 0 || i == nx - 1 || j == 0 || j == ny - 1;
        let ghost_side = |i: usize, j: usize| {
            (i == 0 && presence.left)
                || (i == nx - 1 && presence.right)
                || (j == 0 && presence.bottom)
                || (j == ny - 1 && presence.top)
        };

        let classify = |i: usize, j: usize| -> Result<CellType> {
            if ghost_side(i, j) {
                return Ok(CellType::Ghost);
            }
            let tag = tag_at(i, j);
            Ok(match tag {
                tags::FLUID => {
                    if on_ring(i, j) {
                        return Err(SolverError::InvalidGeometry(format!(
                            "fluid cell ({i}, {j}) on the domain boundary"
                        )));
                    }
                    CellType::Fluid
                }
                tags::INFLOW => CellType::Inflow,
                tags::OUTFLOW => CellType::Outflow,
                tags::FIXED_WALL if !on_ring(i, j) => CellType::InnerObstacle,
                tags::FIXED_WALL => CellType::FixedWall,
                tags::HOT_WALL => CellType::HotWall,
                tags::COLD_WALL => CellType::ColdWall,
                tags::MOVING_WALL | tags::LID => CellType::MovingWall,
                other => {
                    return Err(SolverError::InvalidGeometry(format!(
                        "unknown tag {other} at cell ({i}, {j})"
                    )))
                }
            })
        };

        // Border masks consult the global raster, so a cell next to the halo
        // still sees what the neighbor rank owns there.
        let fluid_at = |i: usize, j: usize| tag_at(i, j) == tags::FLUID;

        let placeholder = Cell {
            i: 0,
            j: 0,
            cell_type: CellType::Fluid,
            tag: tags::FLUID,
            borders: 0,
        };
        let mut cells = Matrix::new(nx, ny, placeholder);
        let mut grid = Grid {
            cells: Matrix::new(0, 0, placeholder),
            domain,
            fluid_cells: Vec::new(),
            fixed_wall_cells: Vec::new(),
            moving_wall_cells: Vec::new(),
            inflow_cells: Vec::new(),
            outflow_cells: Vec::new(),
            hot_wall_cells: Vec::new(),
            cold_wall_cells: Vec::new(),
            inner_obstacle_cells: Vec::new(),
            ghost_cells: Vec::new(),
        };

        for j in 0..ny {
            for i in 0..nx {
                let cell_type = classify(i, j)?;
                let mut borders = 0u8;

                if !matches!(cell_type, CellType::Fluid | CellType::Ghost) {
                    if j + 1 < ny && fluid_at(i, j + 1) {
                        borders |= BorderPosition::Top.bit();
                    }
                    if j > 0 && fluid_at(i, j - 1) {
                        borders |= BorderPosition::Bottom.bit();
                    }
                    if i > 0 && fluid_at(i - 1, j) {
                        borders |= BorderPosition::Left.bit();
                    }
                    if i + 1 < nx && fluid_at(i + 1, j) {
                        borders |= BorderPosition::Right.bit();
                    }

                    let count = borders.count_ones();
                    let opposite = borders
                        == BorderPosition::Left.bit() | BorderPosition::Right.bit()
                        || borders == BorderPosition::Top.bit() | BorderPosition::Bottom.bit();
                    if count > 2 || (count == 2 && opposite) {
                        return Err(SolverError::InvalidGeometry(format!(
                            "concave obstacle at cell ({i}, {j}): {count} fluid faces"
                        )));
                    }
                }

                let cell = Cell {
                    i,
                    j,
                    cell_type,
                    tag: tag_at(i, j),
                    borders,
                };
                cells[(i, j)] = cell;

                let group = match cell_type {
                    CellType::Fluid => &mut grid.fluid_cells,
                    CellType::FixedWall => &mut grid.fixed_wall_cells,
                    CellType::MovingWall => &mut grid.moving_wall_cells,
                    CellType::Inflow | CellType::FixedVelocity => &mut grid.inflow_cells,
                    CellType::Outflow | CellType::ZeroGradient => &mut grid.outflow_cells,
                    CellType::HotWall => &mut grid.hot_wall_cells,
                    CellType::ColdWall => &mut grid.cold_wall_cells,
                    CellType::InnerObstacle => &mut grid.inner_obstacle_cells,
                    CellType::Ghost => &mut grid.ghost_cells,
                };
                group.push((i, j));
            }
        }

        grid.cells = cells;
        Ok(grid)
    }

    pub fn cell(&self, i: usize, j: usize) -> &Cell {
        self.cells.at(i, j)
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn size_x(&self) -> usize {
        self.domain.size_x
    }

    pub fn size_y(&self) -> usize {
        self.domain.size_y
    }

    pub fn iterm_x(&self) -> usize {
        self.domain.iterm_x
    }

    pub fn iterm_y(&self) -> usize {
        self.domain.iterm_y
    }

    pub fn dx(&self) -> crate::Float {
        self.domain.dx
    }

    pub fn dy(&self) -> crate::Float {
        self.domain.dy
    }

    pub fn fluid_cells(&self) -> &[(usize, usize)] {
        &self.fluid_cells
    }

    pub fn fixed_wall_cells(&self) -> &[(usize, usize)] {
        &self.fixed_wall_cells
    }

    pub fn moving_wall_cells(&self) -> &[(usize, usize)] {
        &self.moving_wall_cells
    }

    pub fn inflow_cells(&self) -> &[(usize, usize)] {
        &self.inflow_cells
    }

    pub fn outflow_cells(&self) -> &[(usize, usize)] {
        &self.outflow_cells
    }

    pub fn hot_wall_cells(&self) -> &[(usize, usize)] {
        &self.hot_wall_cells
    }

    pub fn cold_wall_cells(&self) -> &[(usize, usize)] {
        &self.cold_wall_cells
    }

    pub fn inner_obstacle_cells(&self) -> &[(usize, usize)] {
        &self.inner_obstacle_cells
    }

    pub fn ghost_cells(&self) -> &[(usize, usize)] {
        &self.ghost_cells
    }
}
