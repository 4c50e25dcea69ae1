use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::force_params::{AlignmentParams, ForceParams};
use std::path::Path;

// Arena geometry, population and density limits
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ArenaConfig {
    /// Keep the arena size and shrink element counts instead of growing the arena.
    #[serde(default)]
    pub fixed_size: bool,
    /// Emit four zero-thickness wall obstacles along the arena edges.
    #[serde(default)]
    pub walls: bool,
    #[serde(default)]
    pub x_min: f64,
    #[serde(default)]
    pub y_min: f64,
    #[serde(default)]
    pub x_max: Option<f64>,
    #[serde(default)]
    pub y_max: Option<f64>,
    #[serde(default = "default_len")]
    pub len_x: f64,
    #[serde(default = "default_len")]
    pub len_y: f64,
    #[serde(default = "default_n_agents")]
    pub n_agents: usize,
    #[serde(default)]
    pub n_obstacles: usize,
    /// Agents are tagged round-robin into this many sub-swarms.
    #[serde(default = "default_n_groups")]
    pub n_groups: u32,
    /// Agent diameter.
    #[serde(default = "default_agent_size")]
    pub agent_size: f64,
    #[serde(default = "default_d_min_scale")]
    pub d_min_scale: f64,
    #[serde(default = "default_max_agent_occupation")]
    pub max_agent_occupation: f64,
    #[serde(default = "default_max_obstacle_non_access")]
    pub max_obstacle_non_access: f64,
    #[serde(default = "default_max_obstacle_occupation")]
    pub max_obstacle_occupation: f64,
}

// Configuration for timing
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    #[serde(default = "default_dt")]
    pub dt: f64,
    #[serde(default = "default_total_ticks")]
    pub total_ticks: u32,
}

// Social-force gains and radii
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ForceConfig {
    #[serde(default = "default_v_max")]
    pub v_max: f64,
    #[serde(default = "default_r_rep")]
    pub r_rep: f64,
    #[serde(default = "default_r_att")]
    pub r_att: f64,
    #[serde(default = "default_k_rep")]
    pub k_rep: f64,
    #[serde(default = "default_k_att")]
    pub k_att: f64,
    #[serde(default = "default_k_target")]
    pub k_target: f64,
    /// Multiplier on `k_rep` for obstacle repulsion.
    #[serde(default = "default_obstacle_gain")]
    pub obstacle_gain: f64,
    /// Velocity alignment term, left out of the composed velocity when absent.
    #[serde(default)]
    pub alignment: Option<AlignmentConfig>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AlignmentConfig {
    pub r_align: f64,
    pub k_align: f64,
}

// Rejection sampling settings
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PlacementConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Per-element attempt cap. `None` retries forever.
    #[serde(default)]
    pub max_attempts: Option<u64>,
}

/// Built-in waypoint generators selectable from the config file.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TargetConfig {
    Fixed { x: f64, y: f64 },
    Orbit { radius: f64, period: f64 },
    Sweep { vx: f64, vy: f64 },
}

// Configuration for output settings
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_base_filename")]
    pub base_filename: String,
    #[serde(default)]
    pub save_record: bool,
    #[serde(default)]
    pub save_positions: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
    #[serde(default = "default_record_interval")]
    pub record_interval_ticks: u32,
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct SwarmConfig {
    #[serde(default)]
    pub arena: ArenaConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub forces: ForceConfig,
    #[serde(default)]
    pub placement: PlacementConfig,
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        ArenaConfig {
            fixed_size: false,
            walls: false,
            x_min: 0.0,
            y_min: 0.0,
            x_max: None,
            y_max: None,
            len_x: default_len(),
            len_y: default_len(),
            n_agents: default_n_agents(),
            n_obstacles: 0,
            n_groups: default_n_groups(),
            agent_size: default_agent_size(),
            d_min_scale: default_d_min_scale(),
            max_agent_occupation: default_max_agent_occupation(),
            max_obstacle_non_access: default_max_obstacle_non_access(),
            max_obstacle_occupation: default_max_obstacle_occupation(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig { dt: default_dt(), total_ticks: default_total_ticks() }
    }
}

impl Default for ForceConfig {
    fn default() -> Self {
        ForceConfig {
            v_max: default_v_max(),
            r_rep: default_r_rep(),
            r_att: default_r_att(),
            k_rep: default_k_rep(),
            k_att: default_k_att(),
            k_target: default_k_target(),
            obstacle_gain: default_obstacle_gain(),
            alignment: None,
        }
    }
}

impl Default for PlacementConfig {
    fn default() -> Self {
        PlacementConfig { seed: default_seed(), max_attempts: None }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        TargetConfig::Orbit { radius: 1.0, period: 10.0 }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            base_filename: default_base_filename(),
            save_record: false,
            save_positions: false,
            format: None,
            record_interval_ticks: default_record_interval(),
        }
    }
}

impl SwarmConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: SwarmConfig = toml::from_str(config_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let arena = &self.arena;
        if !(arena.agent_size > 0.0) {
            anyhow::bail!("agent_size must be positive.");
        }
        if !(arena.d_min_scale > 0.0) {
            anyhow::bail!("d_min_scale must be positive.");
        }
        if arena.n_groups == 0 {
            anyhow::bail!("n_groups must be at least 1.");
        }
        for (name, rate) in [
            ("max_agent_occupation", arena.max_agent_occupation),
            ("max_obstacle_non_access", arena.max_obstacle_non_access),
            ("max_obstacle_occupation", arena.max_obstacle_occupation),
        ] {
            if !(rate > 0.0 && rate <= 1.0) {
                anyhow::bail!("{} must be in (0, 1], got {}.", name, rate);
            }
        }
        // Growing the arena can only push the obstacle ratio down to this quotient.
        if arena.max_obstacle_occupation >= arena.max_obstacle_non_access {
            anyhow::bail!("max_obstacle_occupation must be below max_obstacle_non_access.");
        }
        if !(self.timing.dt > 0.0) {
            anyhow::bail!("dt must be positive.");
        }
        let forces = &self.forces;
        if !(forces.v_max > 0.0) {
            anyhow::bail!("v_max must be positive.");
        }
        for (name, value) in [
            ("r_rep", forces.r_rep),
            ("r_att", forces.r_att),
            ("k_rep", forces.k_rep),
            ("k_att", forces.k_att),
            ("k_target", forces.k_target),
            ("obstacle_gain", forces.obstacle_gain),
        ] {
            if !(value >= 0.0) {
                anyhow::bail!("{} must be non-negative, got {}.", name, value);
            }
        }
        if let Some(alignment) = &forces.alignment {
            if !(alignment.r_align >= 0.0 && alignment.k_align >= 0.0) {
                anyhow::bail!("alignment radius and gain must be non-negative.");
            }
        }
        if let TargetConfig::Orbit { period, .. } = self.target {
            if !(period > 0.0) {
                anyhow::bail!("orbit period must be positive.");
            }
        }
        if self.placement.max_attempts == Some(0) {
            anyhow::bail!("max_attempts must be at least 1 when set.");
        }
        Ok(())
    }

    /// Converts the force section into runtime parameters.
    pub fn force_params(&self) -> ForceParams {
        let forces = &self.forces;
        ForceParams {
            v_max: forces.v_max,
            r_rep: forces.r_rep,
            r_att: forces.r_att,
            k_rep: forces.k_rep,
            k_att: forces.k_att,
            k_target: forces.k_target,
            k_obstacle: forces.obstacle_gain * forces.k_rep,
            alignment: forces.alignment.as_ref().map(|a| AlignmentParams {
                r_align: a.r_align,
                k_align: a.k_align,
            }),
        }
    }
}

fn default_len() -> f64 {
    1.0
}

fn default_n_agents() -> usize {
    10
}

fn default_n_groups() -> u32 {
    1
}

fn default_agent_size() -> f64 {
    0.2
}

fn default_d_min_scale() -> f64 {
    1.5
}

fn default_max_agent_occupation() -> f64 {
    0.45
}

fn default_max_obstacle_non_access() -> f64 {
    0.5
}

fn default_max_obstacle_occupation() -> f64 {
    0.2
}

fn default_dt() -> f64 {
    0.01
}

fn default_total_ticks() -> u32 {
    1000
}

fn default_v_max() -> f64 {
    3.0
}

fn default_r_rep() -> f64 {
    0.5
}

fn default_r_att() -> f64 {
    1.0
}

fn default_k_rep() -> f64 {
    8.0
}

fn default_k_att() -> f64 {
    0.2
}

fn default_k_target() -> f64 {
    1.5
}

fn default_obstacle_gain() -> f64 {
    1.5 // obstacles cannot yield, so they push harder than neighbours
}

fn default_seed() -> u64 {
    42
}

fn default_base_filename() -> String {
    "swarm".to_string()
}

fn default_record_interval() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = SwarmConfig::from_toml_str("").unwrap();
        assert_eq!(config.arena.n_agents, 10);
        assert_eq!(config.arena.n_obstacles, 0);
        assert!((config.timing.dt - 0.01).abs() < 1e-12);
        assert!(config.forces.alignment.is_none());
        assert!(config.placement.max_attempts.is_none());
    }

    #[test]
    fn partial_sections_are_merged_with_defaults() {
        let config = SwarmConfig::from_toml_str(
            r#"
            [arena]
            n_agents = 25
            walls = true

            [forces.alignment]
            r_align = 0.4
            k_align = 0.5

            [target]
            kind = "fixed"
            x = 2.0
            y = 3.0
            "#,
        )
        .unwrap();
        assert_eq!(config.arena.n_agents, 25);
        assert!(config.arena.walls);
        assert!((config.arena.len_x - 1.0).abs() < 1e-12);
        let params = config.force_params();
        assert!((params.k_obstacle - 12.0).abs() < 1e-12);
        assert_eq!(params.alignment.map(|a| a.k_align), Some(0.5));
        assert!(matches!(config.target, TargetConfig::Fixed { x, y } if x == 2.0 && y == 3.0));
    }

    #[test]
    fn rejects_zero_groups() {
        let err = SwarmConfig::from_toml_str("[arena]\nn_groups = 0\n").unwrap_err();
        assert!(err.to_string().contains("n_groups"));
    }

    #[test]
    fn rejects_non_positive_dt() {
        assert!(SwarmConfig::from_toml_str("[timing]\ndt = 0.0\n").is_err());
    }

    #[test]
    fn rejects_occupancy_above_one() {
        assert!(SwarmConfig::from_toml_str("[arena]\nmax_agent_occupation = 1.5\n").is_err());
    }
}
