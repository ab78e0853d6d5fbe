//! Configuration for FCI and CNEO calculations
//!
//! Every section is optional; missing sections and fields fall back to the
//! defaults below.

use crate::eigen_impl::Davidson;
use crate::fci_impl::Resolution;
use color_eyre::eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Main configuration structure
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// `"n"` or `"n-2"`
    pub resolution: Option<String>,
    pub davidson: Option<DavidsonParams>,
    pub cneo: Option<CneoParams>,
    /// `tracing` filter level for [`crate::io::setup_output`]
    pub log_level: Option<String>,
}

/// Davidson eigensolver parameters
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DavidsonParams {
    pub nroots: Option<usize>,
    pub max_cycle: Option<usize>,
    pub max_space: Option<usize>,
    pub max_memory: Option<usize>,
    pub conv_tol: Option<f64>,
    pub residual_tol: Option<f64>,
    pub lindep: Option<f64>,
    pub level_shift: Option<f64>,
}

impl Default for DavidsonParams {
    fn default() -> Self {
        let d = Davidson::default();
        DavidsonParams {
            nroots: Some(d.nroots),
            max_cycle: Some(d.max_cycle),
            max_space: Some(d.max_space),
            max_memory: Some(d.max_memory),
            conv_tol: Some(d.conv_tol),
            residual_tol: Some(d.residual_tol),
            lindep: Some(d.lindep),
            level_shift: Some(d.level_shift),
        }
    }
}

impl DavidsonParams {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.nroots.is_none() {
            self.nroots = defaults.nroots;
        }
        if self.max_cycle.is_none() {
            self.max_cycle = defaults.max_cycle;
        }
        if self.max_space.is_none() {
            self.max_space = defaults.max_space;
        }
        if self.max_memory.is_none() {
            self.max_memory = defaults.max_memory;
        }
        if self.conv_tol.is_none() {
            self.conv_tol = defaults.conv_tol;
        }
        if self.residual_tol.is_none() {
            self.residual_tol = defaults.residual_tol;
        }
        if self.lindep.is_none() {
            self.lindep = defaults.lindep;
        }
        if self.level_shift.is_none() {
            self.level_shift = defaults.level_shift;
        }
        self
    }
}

/// Constrained nuclear position search parameters
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CneoParams {
    pub symmetry: Option<bool>,
    pub position_tol: Option<f64>,
    pub root_xtol: Option<f64>,
    pub max_bracket_expansions: Option<usize>,
    pub max_root_iterations: Option<usize>,
    pub finite_difference_eps: Option<f64>,
}

impl Default for CneoParams {
    fn default() -> Self {
        CneoParams {
            symmetry: Some(true),
            position_tol: Some(1e-6),
            root_xtol: Some(1e-6),
            max_bracket_expansions: Some(50),
            max_root_iterations: Some(100),
            finite_difference_eps: Some(1e-2),
        }
    }
}

impl CneoParams {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.symmetry.is_none() {
            self.symmetry = defaults.symmetry;
        }
        if self.position_tol.is_none() {
            self.position_tol = defaults.position_tol;
        }
        if self.root_xtol.is_none() {
            self.root_xtol = defaults.root_xtol;
        }
        if self.max_bracket_expansions.is_none() {
            self.max_bracket_expansions = defaults.max_bracket_expansions;
        }
        if self.max_root_iterations.is_none() {
            self.max_root_iterations = defaults.max_root_iterations;
        }
        if self.finite_difference_eps.is_none() {
            self.finite_difference_eps = defaults.finite_difference_eps;
        }
        self
    }
}

impl Config {
    /// Parse YAML and fill in defaults
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config = serde_yml::from_str::<Config>(yaml)
            .wrap_err("Failed to parse configuration")?
            .with_defaults();
        config.resolution()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("Unable to read configuration file: {}", path.display()))?;
        Self::from_yaml_str(&content)
    }

    /// Apply defaults to all configuration sections
    pub fn with_defaults(mut self) -> Self {
        if self.resolution.is_none() {
            self.resolution = Some("n".to_string());
        }
        self.davidson = Some(self.davidson.take().unwrap_or_default().with_defaults());
        self.cneo = Some(self.cneo.take().unwrap_or_default().with_defaults());
        if self.log_level.is_none() {
            self.log_level = Some("info".to_string());
        }
        self
    }

    /// Get the contraction algorithm
    pub fn resolution(&self) -> Result<Resolution> {
        Resolution::from_str(self.resolution.as_deref().unwrap_or("n"))
    }

    /// Davidson solver with the configured settings
    pub fn davidson(&self) -> Davidson {
        let p = self.davidson.clone().unwrap_or_default().with_defaults();
        let d = Davidson::default();
        Davidson {
            nroots: p.nroots.unwrap_or(d.nroots),
            max_cycle: p.max_cycle.unwrap_or(d.max_cycle),
            max_space: p.max_space.unwrap_or(d.max_space),
            max_memory: p.max_memory.unwrap_or(d.max_memory),
            conv_tol: p.conv_tol.unwrap_or(d.conv_tol),
            residual_tol: p.residual_tol.unwrap_or(d.residual_tol),
            lindep: p.lindep.unwrap_or(d.lindep),
            level_shift: p.level_shift.unwrap_or(d.level_shift),
        }
    }

    /// CNEO parameters with defaults filled in
    pub fn cneo(&self) -> CneoParams {
        self.cneo.clone().unwrap_or_default().with_defaults()
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cneo_impl::CneoSolver;
    use crate::fci_impl::FciSolver;

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
resolution: n-2
davidson:
  nroots: 3
  conv_tol: 1e-10
cneo:
  symmetry: false
  max_bracket_expansions: 10
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.resolution().unwrap(), Resolution::NMinus2);

        let davidson = config.davidson();
        assert_eq!(davidson.nroots, 3);
        assert_eq!(davidson.conv_tol, 1e-10);
        assert_eq!(davidson.max_space, 12);
        assert_eq!(davidson.level_shift, 1e-4);

        let solver = CneoSolver::from_config(&config).unwrap();
        assert!(!solver.symmetry);
        assert_eq!(solver.max_bracket_expansions, 10);
        assert_eq!(solver.position_tol, 1e-6);
        assert_eq!(solver.fci.resolution, Resolution::NMinus2);
        assert_eq!(solver.fci.davidson.nroots, 3);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_yaml_str("{}").unwrap();
        assert_eq!(config.resolution.as_deref(), Some("n"));
        assert_eq!(config.log_level(), "info");
        let solver = FciSolver::from_config(&config).unwrap();
        assert_eq!(solver.resolution, Resolution::N);
        assert_eq!(solver.davidson.max_cycle, 100);
        assert_eq!(config.cneo().max_root_iterations, Some(100));
    }

    #[test]
    fn test_unknown_resolution_is_rejected() {
        assert!(Config::from_yaml_str("resolution: n-3").is_err());
        assert!(Config::from_file("/nonexistent/neo_fci.yaml").is_err());
    }
}
