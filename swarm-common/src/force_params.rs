use serde::{Deserialize, Serialize};

/// Force-field parameters derived from the configuration, read on every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForceParams {
    pub v_max: f64,
    pub r_rep: f64, // Repulsion cut-off radius
    pub r_att: f64, // Attraction onset radius
    pub k_rep: f64,
    pub k_att: f64,
    pub k_target: f64,
    pub k_obstacle: f64, // Already multiplied by the obstacle gain
    pub alignment: Option<AlignmentParams>,
}

/// Pulls an agent's velocity toward the mean velocity of its close neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentParams {
    pub r_align: f64,
    pub k_align: f64,
}

impl ForceParams {
    /// Parameters with every gain switched off except target tracking.
    pub fn target_only(k_target: f64, v_max: f64) -> Self {
        ForceParams {
            v_max,
            r_rep: 0.0,
            r_att: f64::INFINITY,
            k_rep: 0.0,
            k_att: 0.0,
            k_target,
            k_obstacle: 0.0,
            alignment: None,
        }
    }
}
