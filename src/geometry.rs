use std::path::Path;

use crate::error::{Result, SolverError};
use crate::matrix::Matrix;

/// Geometry tags as stored in PGM pixels.
pub mod tags {
    pub const FLUID: u8 = 0;
    pub const INFLOW: u8 = 1;
    pub const OUTFLOW: u8 = 2;
    pub const FIXED_WALL: u8 = 3;
    pub const HOT_WALL: u8 = 4;
    pub const COLD_WALL: u8 = 5;
    pub const MOVING_WALL: u8 = 6;
    /// Moving-wall tag used by the built-in lid-driven cavity.
    pub const LID: u8 = 8;
}

const KNOWN_TAGS: [u8; 8] = [
    tags::FLUID,
    tags::INFLOW,
    tags::OUTFLOW,
    tags::FIXED_WALL,
    tags::HOT_WALL,
    tags::COLD_WALL,
    tags::MOVING_WALL,
    tags::LID,
];

/// Built-in lid-driven cavity: moving lid on top, fixed walls elsewhere.
/// Returned raster includes the boundary ring, i.e. (imax+2) x (jmax+2).
pub fn lid_driven_cavity(imax: usize, jmax: usize) -> Matrix<u8> {
    let mut geometry = Matrix::new(imax + 2, jmax + 2, tags::FLUID);
    for i in 0..imax + 2 {
        geometry[(i, 0)] = tags::FIXED_WALL;
        geometry[(i, jmax + 1)] = tags::LID;
    }
    for j in 1..jmax + 1 {
        geometry[(0, j)] = tags::FIXED_WALL;
        geometry[(imax + 1, j)] = tags::FIXED_WALL;
    }
    geometry
}

/// Reads an ASCII (P2) or binary (P5) PGM raster and checks it against the
/// configured grid size including the boundary ring. PGM rows run top to
/// bottom; the returned matrix is flipped so j = 0 is the bottom row.
pub fn from_pgm_file<P: AsRef<Path>>(path: P, imax: usize, jmax: usize) -> Result<Matrix<u8>> {
    let bytes = std::fs::read(path.as_ref()).map_err(|e| {
        SolverError::InvalidGeometry(format!("cannot read {}: {e}", path.as_ref().display()))
    })?;
    let (width, height, pixels) = parse_pgm(&bytes)?;

    if width != imax + 2 || height != jmax + 2 {
        return Err(SolverError::InvalidGeometry(format!(
            "geometry raster is {width}x{height}, expected {}x{} for imax={imax}, jmax={jmax}",
            imax + 2,
            jmax + 2
        )));
    }

    let mut geometry = Matrix::new(width, height, tags::FLUID);
    for j in 0..height {
        for i in 0..width {
            let value = pixels[i + j * width];
            if value > 255 || !KNOWN_TAGS.contains(&(value as u8)) {
                return Err(SolverError::InvalidGeometry(format!(
                    "unknown geometry tag {value} at pixel ({i}, {j})"
                )));
            }
            geometry[(i, height - 1 - j)] = value as u8;
        }
    }
    Ok(geometry)
}

/// Parses the PGM container: magic, dimensions, maxval, then pixel data.
fn parse_pgm(bytes: &[u8]) -> Result<(usize, usize, Vec<u16>)> {
    let bad = |msg: &str| SolverError::InvalidGeometry(format!("PGM parse failure: {msg}"));

    let mut pos = 0;
    let mut next_token = |bytes: &[u8]| -> Result<String> {
        // skip whitespace and '#' comments
        loop {
            while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            if pos < bytes.len() && bytes[pos] == b'#' {
                while pos < bytes.len() && bytes[pos] != b'\n' {
                    pos += 1;
                }
            } else {
                break;
            }
        }
        let start = pos;
        while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if start == pos {
            return Err(bad("unexpected end of file"));
        }
        String::from_utf8(bytes[start..pos].to_vec()).map_err(|_| bad("non-ASCII header"))
    };

    let magic = next_token(bytes)?;
    if magic != "P2" && magic != "P5" {
        return Err(bad(&format!("unsupported magic '{magic}'")));
    }

    let parse_usize = |tok: String| -> Result<usize> {
        tok.parse().map_err(|_| bad(&format!("bad integer '{tok}'")))
    };
    let width = parse_usize(next_token(bytes)?)?;
    let height = parse_usize(next_token(bytes)?)?;
    let maxval = parse_usize(next_token(bytes)?)?;
    if width == 0 || height == 0 {
        return Err(bad("zero-sized raster"));
    }
    if maxval == 0 || maxval > 255 {
        return Err(bad(&format!("maxval {maxval} outside 1..=255")));
    }

    let count = width * height;
    let pixels = if magic == "P2" {
        let mut pixels = Vec::with_capacity(count);
        for _ in 0..count {
            let v = parse_usize(next_token(bytes)?)?;
            if v > maxval {
                return Err(bad(&format!("pixel value {v} exceeds maxval {maxval}")));
            }
            pixels.push(v as u16);
        }
        pixels
    } else {
        // exactly one whitespace byte separates maxval from binary data
        let data_start = pos + 1;
        let data = bytes
            .get(data_start..data_start + count)
            .ok_or_else(|| bad("truncated binary pixel data"))?;
        data.iter().map(|&b| b as u16).collect()
    };

    Ok((width, height, pixels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lid_cavity_layout() {
        let g = lid_driven_cavity(4, 3);
        assert_eq!(g.num_cols(), 6);
        assert_eq!(g.num_rows(), 5);
        assert_eq!(g[(2, 2)], tags::FLUID);
        assert_eq!(g[(0, 2)], tags::FIXED_WALL);
        assert_eq!(g[(5, 2)], tags::FIXED_WALL);
        assert_eq!(g[(2, 0)], tags::FIXED_WALL);
        assert_eq!(g[(2, 4)], tags::LID);
    }

    #[test]
    fn parses_ascii_pgm_with_comments() {
        let pgm = "P2\n# a channel\n4 3\n255\n3 3 3 3\n1 0 0 2\n3 3 3 3\n";
        let (w, h, px) = parse_pgm(pgm.as_bytes()).unwrap();
        assert_eq!((w, h), (4, 3));
        assert_eq!(px[0], 3);
        assert_eq!(px[4], 1);
        assert_eq!(px[7], 2);
    }

    #[test]
    fn parses_binary_pgm() {
        let mut bytes = b"P5\n3 2\n255\n".to_vec();
        bytes.extend_from_slice(&[3, 0, 3, 3, 0, 3]);
        let (w, h, px) = parse_pgm(&bytes).unwrap();
        assert_eq!((w, h), (3, 2));
        assert_eq!(px, vec![3, 0, 3, 3, 0, 3]);
    }

    #[test]
    fn rejects_truncated_binary() {
        let mut bytes = b"P5\n3 2\n255\n".to_vec();
        bytes.extend_from_slice(&[3, 0, 3]);
        assert!(parse_pgm(&bytes).is_err());
    }

    #[test]
    fn rejects_bad_magic() {
        assert!(parse_pgm(b"P6\n1 1\n255\n0").is_err());
    }

    #[test]
    fn pgm_rows_are_flipped_to_bottom_up() {
        let pgm = "P2\n3 3\n255\n6 6 6\n3 0 3\n3 3 3\n";
        let dir = std::env::temp_dir().join("ns_rs_geometry_test.pgm");
        std::fs::write(&dir, pgm).unwrap();
        let g = from_pgm_file(&dir, 1, 1).unwrap();
        std::fs::remove_file(&dir).ok();
        // top PGM row (moving wall) must land at j = jmax + 1
        assert_eq!(g[(1, 2)], tags::MOVING_WALL);
        assert_eq!(g[(1, 1)], tags::FLUID);
        assert_eq!(g[(1, 0)], tags::FIXED_WALL);
    }
}
