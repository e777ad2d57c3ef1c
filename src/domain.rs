use crate::Float;

/// Which sides of a subdomain face another process rather than the
/// physical boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NeighborPresence {
    pub left: bool,
    pub right: bool,
    pub bottom: bool,
    pub top: bool,
}

/// Geometric descriptor of one subdomain. In a serial run it simply
/// describes the whole domain.
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    /// Cell sizes, identical on every rank.
    pub dx: Float,
    pub dy: Float,

    /// Global index (1-based interior numbering) of this rank's first
    /// interior cell in each direction.
    pub imin: usize,
    pub jmin: usize,

    /// Interior cell counts of this subdomain.
    pub size_x: usize,
    pub size_y: usize,

    /// Upper iteration bounds for the staggered flux/velocity loops: one
    /// less than size on sides that end at the physical boundary, the full
    /// size where a neighbor continues the domain.
    pub iterm_x: usize,
    pub iterm_y: usize,

    /// Global interior cell counts.
    pub domain_imax: usize,
    pub domain_jmax: usize,
}

impl Domain {
    /// Splits an `imax x jmax` interior across an `iproc x jproc` process
    /// grid and describes the block owned by the process at Cartesian
    /// coordinates `(ci, cj)`. Remainder cells go to the lowest-coordinate
    /// ranks so block sizes differ by at most one.
    #[allow(clippy::too_many_arguments)]
    pub fn decompose(
        imax: usize,
        jmax: usize,
        xlength: Float,
        ylength: Float,
        iproc: usize,
        jproc: usize,
        ci: usize,
        cj: usize,
    ) -> (Self, NeighborPresence) {
        assert!(ci < iproc && cj < jproc);

        let split = |n: usize, parts: usize, c: usize| {
            let base = n / parts;
            let rem = n % parts;
            let size = base + usize::from(c < rem);
            let offset = c * base + c.min(rem);
            (size, offset)
        };

        let (size_x, off_x) = split(imax, iproc, ci);
        let (size_y, off_y) = split(jmax, jproc, cj);

        let presence = NeighborPresence {
            left: ci > 0,
            right: ci + 1 < iproc,
            bottom: cj > 0,
            top: cj + 1 < jproc,
        };

        let domain = Domain {
            dx: xlength / imax as Float,
            dy: ylength / jmax as Float,
            imin: off_x + 1,
            jmin: off_y + 1,
            size_x,
            size_y,
            iterm_x: if presence.right { size_x } else { size_x - 1 },
            iterm_y: if presence.top { size_y } else { size_y - 1 },
            domain_imax: imax,
            domain_jmax: jmax,
        };
        debug_assert!(domain.iterm_x <= domain.size_x && domain.size_x <= domain.domain_imax);
        debug_assert!(domain.iterm_y <= domain.size_y && domain.size_y <= domain.domain_jmax);

        (domain, presence)
    }

    pub fn serial(imax: usize, jmax: usize, xlength: Float, ylength: Float) -> Self {
        Self::decompose(imax, jmax, xlength, ylength, 1, 1, 0, 0).0
    }
}
