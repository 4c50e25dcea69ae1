use serde::{Deserialize, Serialize};

/// Agent and group state at one recorded tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u32,
    /// Elapsed simulation time (`tick * dt`).
    pub time: f64,
    /// Agent centers, ordered by agent index.
    pub positions: Vec<(f64, f64)>,
    /// One center per existing group, ascending by group tag.
    pub centers_of_mass: Vec<(f64, f64)>,
    /// Waypoint the swarm was steering toward; absent for the initial tick.
    pub target: Option<(f64, f64)>,
}

/// Axis-aligned obstacle box as seen by a renderer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ObstacleBox {
    pub is_wall: bool,
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

/// Static arena geometry after placement (and any rescale).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaLayout {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
    pub agent_radius: f64,
    pub groups: Vec<u32>,
    pub obstacles: Vec<ObstacleBox>,
}

/// Everything a renderer needs to replay a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub dt: f64,
    pub layout: ArenaLayout,
    pub snapshots: Vec<Snapshot>,
}
