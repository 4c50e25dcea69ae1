//! Social-force swarm simulation over a rectangular arena with axis-aligned
//! obstacles.
//!
//! [`placement`] populates an [`arena::Arena`] by rejection sampling, growing
//! the arena when the requested density is infeasible. Each tick the
//! [`forces::ForceField`] computes a desired velocity per agent and the
//! [`integrator`] commits it. [`simulation::SwarmSimulation`] ties them
//! together with a [`target::TargetPath`].

pub mod arena;
pub mod forces;
pub mod geometry;
pub mod integrator;
pub mod placement;
pub mod simulation;
pub mod target;

pub use arena::Arena;
pub use forces::{DesiredVelocity, ForceField, PairwiseField, TickPlan};
pub use geometry::{Agent, Obstacle, ObstacleId, Rect, TrackSample};
pub use placement::{ElementKind, Feasibility, PlacementError, PlacementGenerator, PlacementReport};
pub use simulation::SwarmSimulation;
pub use target::TargetPath;
