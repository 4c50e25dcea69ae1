//! Rejection-sampling population of an [`Arena`].
//!
//! Obstacles are placed first, then agents. Before each phase the occupancy
//! ratio of that resource is checked; an infeasible density either shrinks the
//! element count (fixed-size arenas) or grows the arena by the smallest scale
//! factor that brings the ratio back to at most one.

use crate::arena::Arena;
use crate::geometry::{Agent, Obstacle, ObstacleId, Rect};
use log::{debug, info, warn};
use rand::distr::uniform::Error as UniformError;
use rand::distr::Uniform;
use rand::Rng;
use std::fmt;
use swarm_common::Vec2;
use thiserror::Error;

/// Which population a feasibility check or placement concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Obstacle,
    Agent,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Obstacle => write!(f, "obstacles"),
            ElementKind::Agent => write!(f, "agents"),
        }
    }
}

impl ElementKind {
    fn ratio(self, arena: &Arena) -> f64 {
        match self {
            ElementKind::Obstacle => arena.obstacle_ratio(),
            ElementKind::Agent => arena.agent_ratio(),
        }
    }

    fn count(self, arena: &Arena) -> usize {
        match self {
            ElementKind::Obstacle => arena.n_obstacles,
            ElementKind::Agent => arena.n_agents,
        }
    }

    fn set_count(self, arena: &mut Arena, count: usize) {
        match self {
            ElementKind::Obstacle => arena.n_obstacles = count,
            ElementKind::Agent => arena.n_agents = count,
        }
    }
}

#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("gave up placing {kind} #{index} after {attempts} attempts")]
    Exhausted { kind: ElementKind, index: usize, attempts: u64 },
    #[error("obstacle side {side:.3} does not fit in a {len_x:.3} x {len_y:.3} arena")]
    ObstacleTooLarge { side: f64, len_x: f64, len_y: f64 },
    #[error("invalid sampling range: {0}")]
    Range(#[from] UniformError),
}

/// Outcome of a feasibility check.
#[derive(Debug, Clone, PartialEq)]
pub enum Feasibility {
    Unchanged,
    CountReduced { from: usize, to: usize },
    /// `scale` is the product of every factor applied, `passes` how many were applied.
    Rescaled { scale: f64, passes: u32 },
}

/// Advisory statistics for one placement phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacementReport {
    pub placed: usize,
    pub total_attempts: u64,
    pub worst_streak: u64,
    pub worst_index: usize,
    /// `(i, j, distance)` of the closest realised agent pair.
    pub closest_pair: Option<(usize, usize, f64)>,
}

impl PlacementReport {
    fn record(&mut self, index: usize, attempts: u64) {
        self.placed += 1;
        self.total_attempts += attempts;
        if attempts > self.worst_streak {
            self.worst_streak = attempts;
            self.worst_index = index;
        }
    }
}

/// Both phases of one populate run.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementSummary {
    pub obstacle_feasibility: Feasibility,
    pub agent_feasibility: Feasibility,
    pub obstacles: PlacementReport,
    pub agents: PlacementReport,
}

/// Rounds up to the next hundredth, always moving strictly upward.
pub fn round_up_hundredth(value: f64) -> f64 {
    (100.0 * value).floor() / 100.0 + 0.01
}

/// Real roots of `a s^2 + b s + c`, degrading to the linear case when `a == 0`.
pub fn quadratic_roots(a: f64, b: f64, c: f64) -> Vec<f64> {
    if a == 0.0 {
        return if b != 0.0 { vec![-c / b] } else { Vec::new() };
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 || !disc.is_finite() {
        return Vec::new();
    }
    // Stable form: avoids cancellation between -b and sqrt(disc).
    let q = -0.5 * (b + b.signum() * disc.sqrt());
    if q == 0.0 {
        return vec![0.0];
    }
    vec![q / a, c / q]
}

/// Smallest scale factor above one that brings `kind`'s ratio down to one.
/// The agent quadratic also has a root below one (the arena shrinking past the
/// walls); it never qualifies.
pub fn solve_scale(arena: &Arena, kind: ElementKind, ratio: f64) -> Option<f64> {
    if !ratio.is_finite() {
        return None;
    }
    let p = ratio;
    let n = arena.n_obstacles as f64;
    let d = arena.d_min_ao;
    let a_obsts = arena.obstacle_area();
    let perimeter_term = 2.0 * d * (a_obsts * n).sqrt();

    let (a, b, c) = match kind {
        ElementKind::Obstacle => {
            let c = p * d * d * n;
            let b = p * perimeter_term;
            let a = (p - 1.0) * a_obsts - (b + c) / p;
            (a, b, c)
        }
        ElementKind::Agent => {
            let a = arena.area() - a_obsts;
            let b = (arena.len_x() + arena.len_y()) * arena.d_signed - perimeter_term;
            let c0 = arena.d_signed * arena.d_signed - n * d * d;
            let c = (1.0 - p) * c0 - p * (a + b);
            (a, b, c)
        }
    };
    debug!("Rescale polynomial for {}: a={:.6} b={:.6} c={:.6}", kind, a, b, c);

    quadratic_roots(a, b, c)
        .into_iter()
        .filter(|s| s.is_finite() && *s > 1.0)
        .min_by(|x, y| x.total_cmp(y))
}

/// Brings `kind`'s occupancy ratio to at most one, shrinking counts in a
/// fixed-size arena and growing the arena otherwise.
///
/// The growth fallback has no iteration cap; it terminates because both
/// ratios decrease monotonically as the arena grows.
pub fn ensure_feasible(arena: &mut Arena, kind: ElementKind) -> Feasibility {
    let ratio = kind.ratio(arena);
    if ratio.is_nan() {
        warn!("Occupancy ratio for {} is undefined, leaving arena unchanged.", kind);
        return Feasibility::Unchanged;
    }
    if ratio <= 1.0 {
        return Feasibility::Unchanged;
    }

    if arena.fixed_size {
        let from = kind.count(arena);
        let to = (from as f64 / ratio) as usize;
        kind.set_count(arena, to);
        info!("Too many {} for a fixed-size arena (ratio {:.3}), reducing {} -> {}.", kind, ratio, from, to);
        return Feasibility::CountReduced { from, to };
    }

    let mut applied = 1.0;
    let mut passes = 0;
    if let Some(scale) = solve_scale(arena, kind, ratio) {
        let rounded = round_up_hundredth(scale);
        arena.rescale(rounded);
        applied *= rounded;
        passes += 1;
        info!("Too many {}, rescaling arena using n = {:.2}", kind, rounded);
    }

    let mut ratio = kind.ratio(arena);
    while ratio > 1.0 {
        let step = if ratio.is_finite() { round_up_hundredth(ratio) } else { 2.0 };
        arena.rescale(step);
        applied *= step;
        passes += 1;
        info!("Too many {}, rescaling arena using p = {:.2}", kind, step);
        ratio = kind.ratio(arena);
    }

    Feasibility::Rescaled { scale: applied, passes }
}

/// Rejection sampler with an optional per-element attempt cap.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlacementGenerator {
    max_attempts: Option<u64>,
}

impl PlacementGenerator {
    pub fn new(max_attempts: Option<u64>) -> Self {
        PlacementGenerator { max_attempts }
    }

    /// Clears the arena and fills it with obstacles then agents.
    pub fn populate<R: Rng + ?Sized>(
        &self,
        arena: &mut Arena,
        rng: &mut R,
    ) -> Result<PlacementSummary, PlacementError> {
        arena.agents.clear();
        arena.obstacles.clear();
        arena.com_history.clear();
        arena.tick = 0;

        let obstacle_feasibility = ensure_feasible(arena, ElementKind::Obstacle);
        let obstacles = self.generate_obstacles(arena, rng)?;
        let agent_feasibility = ensure_feasible(arena, ElementKind::Agent);
        let agents = self.generate_agents(arena, rng)?;

        Ok(PlacementSummary { obstacle_feasibility, agent_feasibility, obstacles, agents })
    }

    fn check_budget(&self, kind: ElementKind, index: usize, attempts: u64) -> Result<(), PlacementError> {
        match self.max_attempts {
            Some(max) if attempts >= max => Err(PlacementError::Exhausted { kind, index, attempts }),
            _ => Ok(()),
        }
    }

    /// Emits the walls (if enabled) and places every interior obstacle so that
    /// no two footprints, inflated by `d_min_oo / 2`, overlap.
    pub fn generate_obstacles<R: Rng + ?Sized>(
        &self,
        arena: &mut Arena,
        rng: &mut R,
    ) -> Result<PlacementReport, PlacementError> {
        let bounds = arena.bounds;
        if arena.walls {
            arena.obstacles.extend([
                Obstacle::new(ObstacleId::LeftWall, Rect::new(bounds.x_min, bounds.y_min, bounds.x_min, bounds.y_max)),
                Obstacle::new(ObstacleId::RightWall, Rect::new(bounds.x_max, bounds.y_min, bounds.x_max, bounds.y_max)),
                Obstacle::new(ObstacleId::DownWall, Rect::new(bounds.x_min, bounds.y_min, bounds.x_max, bounds.y_min)),
                Obstacle::new(ObstacleId::UpWall, Rect::new(bounds.x_min, bounds.y_max, bounds.x_max, bounds.y_max)),
            ]);
        }

        let mut report = PlacementReport::default();
        if arena.n_obstacles == 0 {
            return Ok(report);
        }

        let side = arena.obstacle_side;
        if side > bounds.len_x() || side > bounds.len_y() {
            return Err(PlacementError::ObstacleTooLarge { side, len_x: bounds.len_x(), len_y: bounds.len_y() });
        }
        let dist_x = Uniform::new_inclusive(bounds.x_min, bounds.x_max - side)?;
        let dist_y = Uniform::new_inclusive(bounds.y_min, bounds.y_max - side)?;
        let margin = arena.d_min_oo / 2.0;

        for i in 0..arena.n_obstacles {
            let mut attempts = 0u64;
            let candidate = loop {
                self.check_budget(ElementKind::Obstacle, i, attempts)?;
                attempts += 1;
                let x = rng.sample(&dist_x);
                let y = rng.sample(&dist_y);
                let rect = Rect::new(x, y, x + side, y + side);
                let footprint = rect.inflated(margin);
                let clear = arena
                    .obstacles
                    .iter()
                    .all(|o| !o.bounds.inflated(margin).overlaps(&footprint));
                if clear {
                    break rect;
                }
            };
            arena.obstacles.push(Obstacle::new(ObstacleId::Interior(i), candidate));
            report.record(i, attempts);
        }

        info!(
            "Placed {} obstacles in {} attempts (worst streak {} at #{}).",
            report.placed, report.total_attempts, report.worst_streak, report.worst_index
        );
        Ok(report)
    }

    /// Places every agent at least `d_min_aa` from other agents and more than
    /// `d_min_ao` from every obstacle.
    pub fn generate_agents<R: Rng + ?Sized>(
        &self,
        arena: &mut Arena,
        rng: &mut R,
    ) -> Result<PlacementReport, PlacementError> {
        let mut report = PlacementReport::default();
        let bounds = arena.bounds;
        let dist_x = Uniform::new_inclusive(bounds.x_min, bounds.x_max)?;
        let dist_y = Uniform::new_inclusive(bounds.y_min, bounds.y_max)?;
        let n_groups = arena.n_groups.max(1);
        let mut placed: Vec<Vec2> = Vec::with_capacity(arena.n_agents);

        for i in 0..arena.n_agents {
            let mut attempts = 0u64;
            let (position, nearest) = loop {
                self.check_budget(ElementKind::Agent, i, attempts)?;
                attempts += 1;
                let p = Vec2::new(rng.sample(&dist_x), rng.sample(&dist_y));

                let nearest = placed
                    .iter()
                    .enumerate()
                    .map(|(j, q)| (j, p.distance(*q)))
                    .min_by(|a, b| a.1.total_cmp(&b.1));
                if matches!(nearest, Some((_, d)) if d < arena.d_min_aa) {
                    continue;
                }
                if arena.obstacles.iter().any(|o| o.bounds.intersects_circle(p, arena.d_min_ao)) {
                    continue;
                }
                break (p, nearest);
            };

            if let Some((j, d)) = nearest {
                if report.closest_pair.map_or(true, |(_, _, best)| d < best) {
                    report.closest_pair = Some((i, j, d));
                }
            }
            placed.push(position);
            arena.agents.push(Agent::new(i, i as u32 % n_groups, arena.agent_radius, position));
            report.record(i, attempts);
        }

        match report.closest_pair {
            Some((i, j, d)) => info!(
                "Placed {} agents in {} attempts (worst streak {} at #{}), closest pair {}-{} at {:.4}.",
                report.placed, report.total_attempts, report.worst_streak, report.worst_index, i, j, d
            ),
            None => info!("Placed {} agents in {} attempts.", report.placed, report.total_attempts),
        }
        Ok(report)
    }
}
