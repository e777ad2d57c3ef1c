use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Result, SolverError};
use crate::Float;

/// Which implementation serves the pressure-Poisson sub-solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureSolverKind {
    Sor,
    JacobiGpu,
}

/// Near-wall treatment of the k-eps model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurbulenceModel {
    HighRe,
    LowRe,
}

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    // fluid
    pub nu: Float,
    pub dt: Float,
    pub tau: Float,
    pub t_end: Float,
    /// Output cadence in simulated time.
    pub dt_value: Float,

    // grid
    pub imax: usize,
    pub jmax: usize,
    pub xlength: Float,
    pub ylength: Float,
    pub geo_file: Option<String>,

    // initial values
    pub ui: Float,
    pub vi: Float,
    pub pi: Float,
    pub ti: Float,
    pub ki: Float,
    pub ei: Float,

    // energy equation
    pub alpha: Float,
    pub beta: Float,
    pub gx: Float,
    pub gy: Float,

    // pressure solver
    pub omg: Float,
    pub eps: Float,
    pub itermax: usize,
    pub gamma: Float,
    pub pressure_solver: PressureSolverKind,
    /// Reference pressure imposed on outflow cells.
    pub p_out: Float,

    // inflow defaults (tag-keyed tables may override per tag)
    pub uin: Float,
    pub vin: Float,

    /// Wall temperatures keyed by geometry tag.
    pub wall_temps: BTreeMap<u8, Float>,
    /// Wall velocities keyed by geometry tag.
    pub wall_velocities: BTreeMap<u8, Float>,

    // model switches
    pub energy_eq: bool,
    pub turbulence: bool,
    pub model: TurbulenceModel,

    // decomposition
    pub iproc: usize,
    pub jproc: usize,

    pub output_dir: String,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            SolverError::Configuration(format!("cannot read {}: {e}", path.as_ref().display()))
        })?;
        Self::from_str(&content)
    }

    /// Parses the whitespace-separated key-value format. Lines starting with
    /// `#` (or the remainder of a line after `#`) are comments.
    pub fn from_str(content: &str) -> Result<Self> {
        let mut raw: BTreeMap<String, String> = BTreeMap::new();
        let mut wall_temps = BTreeMap::new();
        let mut wall_velocities = BTreeMap::new();

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("");
            let mut tokens = line.split_whitespace();
            let Some(key) = tokens.next() else { continue };
            let value = tokens.next().ok_or_else(|| {
                SolverError::Configuration(format!("key '{key}' has no value"))
            })?;
            if let Some(extra) = tokens.next() {
                return Err(SolverError::Configuration(format!(
                    "trailing token '{extra}' after '{key} {value}'"
                )));
            }

            if let Some(tag) = key.strip_prefix("wall_temp_") {
                wall_temps.insert(parse_tag(key, tag)?, parse_num(key, value)?);
            } else if let Some(tag) = key.strip_prefix("wall_vel_") {
                wall_velocities.insert(parse_tag(key, tag)?, parse_num(key, value)?);
            } else if raw.insert(key.to_string(), value.to_string()).is_some() {
                return Err(SolverError::Configuration(format!("duplicate key '{key}'")));
            }
        }

        let cfg = Self::build(&mut raw, wall_temps, wall_velocities)?;

        if let Some(key) = raw.keys().next() {
            return Err(SolverError::Configuration(format!("unknown key '{key}'")));
        }

        cfg.validate()?;
        Ok(cfg)
    }

    fn build(
        raw: &mut BTreeMap<String, String>,
        wall_temps: BTreeMap<u8, Float>,
        wall_velocities: BTreeMap<u8, Float>,
    ) -> Result<Self> {
        let t_end = require(raw, "t_end")?;
        Ok(Self {
            nu: require(raw, "nu")?,
            dt: optional(raw, "dt")?.unwrap_or(0.05),
            tau: optional(raw, "tau")?.unwrap_or(0.5),
            t_end,
            dt_value: optional(raw, "dt_value")?.unwrap_or(t_end),
            imax: require(raw, "imax")?,
            jmax: require(raw, "jmax")?,
            xlength: require(raw, "xlength")?,
            ylength: require(raw, "ylength")?,
            geo_file: raw.remove("geo_file"),
            ui: optional(raw, "UI")?.unwrap_or(0.0),
            vi: optional(raw, "VI")?.unwrap_or(0.0),
            pi: optional(raw, "PI")?.unwrap_or(0.0),
            ti: optional(raw, "TI")?.unwrap_or(0.0),
            ki: optional(raw, "KI")?.unwrap_or(1e-3),
            ei: optional(raw, "EI")?.unwrap_or(1e-3),
            alpha: optional(raw, "alpha")?.unwrap_or(0.0),
            beta: optional(raw, "beta")?.unwrap_or(0.0),
            gx: optional(raw, "GX")?.unwrap_or(0.0),
            gy: optional(raw, "GY")?.unwrap_or(0.0),
            omg: require(raw, "omg")?,
            eps: require(raw, "eps")?,
            itermax: require(raw, "itermax")?,
            gamma: optional(raw, "gamma")?.unwrap_or(0.5),
            pressure_solver: match raw.remove("pressure_solver").as_deref() {
                None | Some("sor") => PressureSolverKind::Sor,
                Some("jacobi_gpu") => PressureSolverKind::JacobiGpu,
                Some(other) => {
                    return Err(SolverError::Configuration(format!(
                        "pressure_solver must be 'sor' or 'jacobi_gpu', got '{other}'"
                    )))
                }
            },
            p_out: optional(raw, "P_out")?.unwrap_or(0.0),
            uin: optional(raw, "UIN")?.unwrap_or(0.0),
            vin: optional(raw, "VIN")?.unwrap_or(0.0),
            wall_temps,
            wall_velocities,
            energy_eq: switch(raw, "energy_eq")?,
            turbulence: switch(raw, "turbulence")?,
            model: match raw.remove("model").as_deref() {
                None | Some("high_re") => TurbulenceModel::HighRe,
                Some("low_re") => TurbulenceModel::LowRe,
                Some(other) => {
                    return Err(SolverError::Configuration(format!(
                        "model must be 'high_re' or 'low_re', got '{other}'"
                    )))
                }
            },
            iproc: optional(raw, "iproc")?.unwrap_or(1),
            jproc: optional(raw, "jproc")?.unwrap_or(1),
            output_dir: raw.remove("output_dir").unwrap_or_else(|| "out".to_string()),
        })
    }

    fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(SolverError::Configuration(msg));
        if self.imax < 1 || self.jmax < 1 {
            return fail(format!("grid size {}x{} must be at least 1x1", self.imax, self.jmax));
        }
        if self.xlength <= 0.0 || self.ylength <= 0.0 {
            return fail("domain lengths must be positive".into());
        }
        if self.nu < 0.0 {
            return fail(format!("kinematic viscosity {} must be non-negative", self.nu));
        }
        if !(0.0 < self.omg && self.omg < 2.0) {
            return fail(format!("SOR relaxation omg = {} must lie in (0, 2)", self.omg));
        }
        if self.eps <= 0.0 || self.itermax == 0 {
            return fail("eps and itermax must be positive".into());
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return fail(format!("donor-cell gamma = {} must lie in [0, 1]", self.gamma));
        }
        if self.dt <= 0.0 || self.t_end <= 0.0 || self.dt_value <= 0.0 {
            return fail("dt, t_end and dt_value must be positive".into());
        }
        if self.energy_eq && self.alpha <= 0.0 {
            return fail("energy_eq on requires alpha > 0".into());
        }
        if self.iproc == 0 || self.jproc == 0 {
            return fail("iproc and jproc must be at least 1".into());
        }
        Ok(())
    }

    /// Dumps the effective configuration next to the outputs so a run can be
    /// reproduced from its artifacts alone.
    pub fn write_provenance(&self) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = Path::new(&self.output_dir).join("case_config.json");
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| SolverError::Configuration(format!("cannot serialize config: {e}")))?;
        Ok(())
    }
}

fn parse_tag(key: &str, tag: &str) -> Result<u8> {
    tag.parse()
        .map_err(|_| SolverError::Configuration(format!("key '{key}' has a non-integer tag")))
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| SolverError::Configuration(format!("key '{key}': cannot parse '{value}'")))
}

fn require<T: std::str::FromStr>(raw: &mut BTreeMap<String, String>, key: &str) -> Result<T> {
    let value = raw
        .remove(key)
        .ok_or_else(|| SolverError::Configuration(format!("missing mandatory key '{key}'")))?;
    parse_num(key, &value)
}

fn optional<T: std::str::FromStr>(
    raw: &mut BTreeMap<String, String>,
    key: &str,
) -> Result<Option<T>> {
    raw.remove(key).map(|v| parse_num(key, &v)).transpose()
}

fn switch(raw: &mut BTreeMap<String, String>, key: &str) -> Result<bool> {
    match raw.remove(key).as_deref() {
        None | Some("off") => Ok(false),
        Some("on") => Ok(true),
        Some(other) => Err(SolverError::Configuration(format!(
            "key '{key}' must be 'on' or 'off', got '{other}'"
        ))),
    }
}
