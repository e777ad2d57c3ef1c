use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::fields::Fields;
use crate::grid::{CellType, Grid};
use crate::Float;

/// Legacy-VTK snapshot writer. Tracks every written file so a ParaView
/// collection can be emitted at the end of the run. In decomposed runs each
/// rank writes its own series.
pub struct VtkWriter {
    output_dir: String,
    rank: usize,
    size: usize,
    collection_entries: Vec<(usize, Float, String)>, // (step, time, filename)
}

impl VtkWriter {
    pub fn new(output_dir: &str, rank: usize, size: usize) -> Self {
        Self {
            output_dir: output_dir.to_string(),
            rank,
            size,
            collection_entries: Vec::new(),
        }
    }

    fn snapshot_name(&self, step: usize) -> String {
        if self.size == 1 {
            format!("{}/output_{:06}.vtk", self.output_dir, step)
        } else {
            format!("{}/output_r{}_{:06}.vtk", self.output_dir, self.rank, step)
        }
    }

    /// Writes one structured-grid snapshot with all fields interpolated to
    /// cell centers.
    pub fn write(
        &mut self,
        grid: &Grid,
        fields: &Fields,
        step: usize,
        time: Float,
        energy: bool,
        turbulence: bool,
    ) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;
        let filename = self.snapshot_name(step);
        let mut file = File::create(&filename)?;

        let domain = grid.domain();
        let nx = domain.size_x;
        let ny = domain.size_y;
        let cell_count = nx * ny;

        writeln!(file, "# vtk DataFile Version 3.0")?;
        writeln!(file, "Flow Solution - Step {} Time {:.6}", step, time)?;
        writeln!(file, "ASCII")?;
        writeln!(file, "DATASET STRUCTURED_GRID")?;
        writeln!(file, "DIMENSIONS {} {} 1", nx, ny)?;

        writeln!(file, "POINTS {} float", cell_count)?;
        for j in 1..=ny {
            for i in 1..=nx {
                let x = (domain.imin + i) as Float * domain.dx - 1.5 * domain.dx;
                let y = (domain.jmin + j) as Float * domain.dy - 1.5 * domain.dy;
                writeln!(file, "{:.6} {:.6} 0.0", x, y)?;
            }
        }

        writeln!(file, "POINT_DATA {}", cell_count)?;

        writeln!(file, "VECTORS Velocity float")?;
        for j in 1..=ny {
            for i in 1..=nx {
                let u = 0.5 * (fields.u[(i, j)] + fields.u[(i - 1, j)]);
                let v = 0.5 * (fields.v[(i, j)] + fields.v[(i, j - 1)]);
                writeln!(file, "{:.6} {:.6} 0.0", u, v)?;
            }
        }

        let scalar = |file: &mut File,
                          name: &str,
                          value: &dyn Fn(usize, usize) -> Float|
         -> Result<()> {
            writeln!(file, "SCALARS {name} float")?;
            writeln!(file, "LOOKUP_TABLE default")?;
            for j in 1..=ny {
                for i in 1..=nx {
                    writeln!(file, "{:.6}", value(i, j))?;
                }
            }
            Ok(())
        };

        scalar(&mut file, "Pressure", &|i, j| fields.p[(i, j)])?;
        if energy {
            scalar(&mut file, "Temperature", &|i, j| fields.t[(i, j)])?;
        }
        if turbulence {
            scalar(&mut file, "TurbKineticEnergy", &|i, j| fields.k[(i, j)])?;
            scalar(&mut file, "Dissipation", &|i, j| fields.e[(i, j)])?;
            scalar(&mut file, "TurbViscosity", &|i, j| fields.nu_t[(i, j)])?;
        }

        self.collection_entries.push((step, time, filename));
        Ok(())
    }

    /// Writes the cell-type raster once so the domain setup can be checked
    /// in ParaView alongside the solution series.
    pub fn write_geometry(&self, grid: &Grid) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;
        let filename = if self.size == 1 {
            format!("{}/geometry.vtk", self.output_dir)
        } else {
            format!("{}/geometry_r{}.vtk", self.output_dir, self.rank)
        };
        let mut file = File::create(&filename)?;

        let domain = grid.domain();
        let nx = domain.size_x + 2;
        let ny = domain.size_y + 2;

        writeln!(file, "# vtk DataFile Version 3.0")?;
        writeln!(file, "Flow Geometry")?;
        writeln!(file, "ASCII")?;
        writeln!(file, "DATASET STRUCTURED_GRID")?;
        writeln!(file, "DIMENSIONS {} {} 1", nx, ny)?;

        writeln!(file, "POINTS {} float", nx * ny)?;
        for j in 0..ny {
            for i in 0..nx {
                let x = (domain.imin + i) as Float * domain.dx - 1.5 * domain.dx;
                let y = (domain.jmin + j) as Float * domain.dy - 1.5 * domain.dy;
                writeln!(file, "{:.6} {:.6} 0.0", x, y)?;
            }
        }

        writeln!(file, "POINT_DATA {}", nx * ny)?;
        writeln!(file, "SCALARS CellType float")?;
        writeln!(file, "LOOKUP_TABLE default")?;
        for j in 0..ny {
            for i in 0..nx {
                let code = match grid.cell(i, j).cell_type() {
                    CellType::Fluid => 0.0,
                    CellType::FixedWall => 1.0,
                    CellType::Inflow | CellType::FixedVelocity => 2.0,
                    CellType::Outflow | CellType::ZeroGradient => 3.0,
                    CellType::MovingWall => 4.0,
                    CellType::HotWall => 5.0,
                    CellType::ColdWall => 6.0,
                    CellType::InnerObstacle => 7.0,
                    CellType::Ghost => 8.0,
                };
                writeln!(file, "{:.1}", code)?;
            }
        }
        Ok(())
    }

    /// ParaView collection grouping the snapshot series with time stamps.
    pub fn write_collection(&self) -> Result<()> {
        let filename = if self.size == 1 {
            format!("{}/simulation.pvd", self.output_dir)
        } else {
            format!("{}/simulation_r{}.pvd", self.output_dir, self.rank)
        };
        let mut file = File::create(&filename)?;

        writeln!(file, "<?xml version=\"1.0\"?>")?;
        writeln!(file, "<VTKFile type=\"Collection\" version=\"0.1\">")?;
        writeln!(file, "  <Collection>")?;
        for (_step, time, path) in &self.collection_entries {
            let basename = Path::new(path)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(path);
            writeln!(
                file,
                "    <DataSet timestep=\"{:.6}\" part=\"0\" file=\"{}\"/>",
                time, basename
            )?;
        }
        writeln!(file, "  </Collection>")?;
        writeln!(file, "</VTKFile>")?;
        Ok(())
    }

    pub fn file_count(&self) -> usize {
        self.collection_entries.len()
    }
}
