pub mod config;
pub mod force_params;
pub mod snapshot;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{
    AlignmentConfig, ArenaConfig, ForceConfig, OutputConfig, PlacementConfig, SwarmConfig,
    TargetConfig, TimingConfig,
};
pub use force_params::{AlignmentParams, ForceParams};
pub use snapshot::{ArenaLayout, ObstacleBox, RunRecord, Snapshot};
pub use vecmath::{clamp, mean, Vec2};
