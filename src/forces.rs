//! Social-force velocity field.
//!
//! Every tick the field is evaluated once from the latest position of every
//! agent: a dense pairwise displacement/distance table, the group centers of
//! mass and one shared target waypoint. Each agent's desired velocity is the
//! clipped sum of repulsion, attraction, obstacle avoidance and target
//! tracking, plus velocity alignment when it is configured.

use crate::arena::Arena;
use crate::geometry::Obstacle;
use crate::target::TargetPath;
use rayon::prelude::*;
use swarm_common::{AlignmentParams, ForceParams, Vec2};

/// Dense `N x N` displacement and distance tables, row-major.
/// `diff(i, j) = p_j - p_i`; both tables are symmetric up to sign with a zero diagonal.
#[derive(Debug, Clone)]
pub struct PairwiseField {
    n: usize,
    diffs: Vec<Vec2>,
    dists: Vec<f64>,
}

impl PairwiseField {
    pub fn compute(positions: &[Vec2]) -> Self {
        let n = positions.len();
        let mut diffs = vec![Vec2::zero(); n * n];
        let mut dists = vec![0.0; n * n];
        if n > 0 {
            diffs
                .par_chunks_mut(n)
                .zip(dists.par_chunks_mut(n))
                .enumerate()
                .for_each(|(i, (diff_row, dist_row))| {
                    let p_i = positions[i];
                    for (j, p_j) in positions.iter().enumerate() {
                        let d = *p_j - p_i;
                        diff_row[j] = d;
                        dist_row[j] = d.length();
                    }
                });
        }
        PairwiseField { n, diffs, dists }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    #[inline]
    pub fn diff(&self, i: usize, j: usize) -> Vec2 {
        self.diffs[i * self.n + j]
    }

    #[inline]
    pub fn dist(&self, i: usize, j: usize) -> f64 {
        self.dists[i * self.n + j]
    }

    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, Vec2, f64)> + '_ {
        let start = i * self.n;
        (0..self.n)
            .filter(move |&j| j != i)
            .map(move |j| (j, self.diffs[start + j], self.dists[start + j]))
    }
}

/// Short-range push away from every neighbour closer than `r_rep`.
pub fn repulsion(i: usize, field: &PairwiseField, params: &ForceParams) -> Vec2 {
    let mut v = Vec2::zero();
    for (_, diff, dist) in field.row(i) {
        if dist > 0.0 && dist < params.r_rep {
            // (dist - r_rep) < 0 flips the unit vector toward j into a push away from j.
            v += (diff / dist) * (params.k_rep * (dist - params.r_rep));
        }
    }
    v
}

/// Long-range cohesion toward every neighbour farther than `r_att`,
/// averaged over the population so strength does not depend on `N`.
pub fn attraction(i: usize, field: &PairwiseField, params: &ForceParams) -> Vec2 {
    let n = field.len() as f64;
    let mut v = Vec2::zero();
    for (_, diff, dist) in field.row(i) {
        if dist > params.r_att && dist > 0.0 {
            v += (diff / dist) * (params.k_att / n * (dist - params.r_att));
        }
    }
    v
}

/// Repulsion from the closest point of every obstacle box within `r_rep`.
pub fn obstacle_avoidance(position: Vec2, obstacles: &[Obstacle], params: &ForceParams) -> Vec2 {
    let mut v = Vec2::zero();
    for obstacle in obstacles {
        let diff = obstacle.bounds.closest_point(position) - position;
        let dist = diff.length();
        if dist > 0.0 && dist < params.r_rep {
            v += (diff / dist) * (params.k_obstacle * (dist - params.r_rep));
        }
    }
    v
}

/// Steering of a whole group: identical for every member.
pub fn target_tracking(target: Vec2, center_of_mass: Vec2, k_target: f64) -> Vec2 {
    (target - center_of_mass) * k_target
}

/// Pulls `velocities[i]` toward the mean velocity of neighbours with `0 < d < r_align`.
pub fn alignment(i: usize, velocities: &[Vec2], field: &PairwiseField, params: &AlignmentParams) -> Vec2 {
    let mut sum = Vec2::zero();
    let mut count = 0usize;
    for (j, _, dist) in field.row(i) {
        if dist > 0.0 && dist < params.r_align {
            sum += velocities[j];
            count += 1;
        }
    }
    if count == 0 {
        return Vec2::zero();
    }
    (sum / count as f64 - velocities[i]) * params.k_align
}

/// Per-agent output of one field evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DesiredVelocity {
    /// Neighbour, obstacle and (optional) alignment terms.
    pub field: Vec2,
    pub target: Vec2,
    /// `field + target` clipped to `v_max`.
    pub desired: Vec2,
}

impl DesiredVelocity {
    pub fn compose(field: Vec2, target: Vec2, v_max: f64) -> Self {
        DesiredVelocity { field, target, desired: (field + target).clamp_length(v_max) }
    }
}

/// Result of evaluating the field for one tick.
#[derive(Debug, Clone)]
pub struct TickPlan {
    pub target: Vec2,
    pub centers_of_mass: Vec<Vec2>,
    pub velocities: Vec<DesiredVelocity>,
}

/// Evaluates the composed velocity field over an arena.
#[derive(Debug, Clone)]
pub struct ForceField {
    params: ForceParams,
}

impl ForceField {
    pub fn new(params: ForceParams) -> Self {
        ForceField { params }
    }

    pub fn params(&self) -> &ForceParams {
        &self.params
    }

    /// Desired velocity of agent `i` given the shared per-tick inputs.
    pub fn desired_velocity(
        &self,
        i: usize,
        position: Vec2,
        field: &PairwiseField,
        velocities: &[Vec2],
        obstacles: &[Obstacle],
        target: Vec2,
        center_of_mass: Vec2,
    ) -> DesiredVelocity {
        let params = &self.params;
        let mut v_field = repulsion(i, field, params)
            + attraction(i, field, params)
            + obstacle_avoidance(position, obstacles, params);
        if let Some(align) = &params.alignment {
            v_field += alignment(i, velocities, field, align);
        }
        let v_target = target_tracking(target, center_of_mass, params.k_target);
        DesiredVelocity::compose(v_field, v_target, params.v_max)
    }

    /// Computes this tick's plan and appends the group centers to the arena's
    /// center-of-mass history. The waypoint is shared by every group.
    pub fn evaluate(&self, arena: &mut Arena, target_path: &dyn TargetPath) -> TickPlan {
        let positions: Vec<Vec2> = arena.agents().iter().map(|a| a.position()).collect();
        let velocities: Vec<Vec2> = arena.agents().iter().map(|a| a.velocity()).collect();
        let field = PairwiseField::compute(&positions);

        let groups = arena.groups();
        let centers = arena.group_centers_at(arena.tick() as usize);
        arena.com_history.push(centers.clone());

        let origin = arena.com_history.first().map(Vec::as_slice).unwrap_or(&[]);
        let target = target_path.waypoint(origin, arena.elapsed());

        let obstacles = arena.obstacles();
        let velocities_out: Vec<DesiredVelocity> = arena
            .agents()
            .par_iter()
            .enumerate()
            .map(|(i, agent)| {
                // Every agent's tag is in `groups`, so the lookup cannot miss.
                let center = groups
                    .binary_search(&agent.group)
                    .ok()
                    .and_then(|g| centers.get(g).copied())
                    .unwrap_or(positions[i]);
                self.desired_velocity(i, positions[i], &field, &velocities, obstacles, target, center)
            })
            .collect();

        TickPlan { target, centers_of_mass: centers, velocities: velocities_out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ObstacleId, Rect};

    fn params() -> ForceParams {
        ForceParams {
            v_max: 3.0,
            r_rep: 0.5,
            r_att: 1.0,
            k_rep: 8.0,
            k_att: 0.2,
            k_target: 1.5,
            k_obstacle: 12.0,
            alignment: None,
        }
    }

    #[test]
    fn pairwise_tables_are_antisymmetric_with_zero_diagonal() {
        let field = PairwiseField::compute(&[Vec2::new(0.0, 0.0), Vec2::new(3.0, 4.0), Vec2::new(1.0, 0.0)]);
        assert_eq!(field.dist(0, 0), 0.0);
        assert!((field.dist(0, 1) - 5.0).abs() < 1e-12);
        assert_eq!(field.dist(1, 2), field.dist(2, 1));
        assert_eq!(field.diff(0, 1), -field.diff(1, 0));
    }

    #[test]
    fn close_agents_repel_in_exactly_opposite_directions() {
        let field = PairwiseField::compute(&[Vec2::new(0.0, 0.0), Vec2::new(0.3, 0.0)]);
        let p = params();
        let v0 = repulsion(0, &field, &p);
        let v1 = repulsion(1, &field, &p);
        assert!(v0.length() > 0.0);
        assert!(v0.x < 0.0 && v1.x > 0.0);
        assert_eq!(v0, -v1);
        // k_rep * (0.3 - 0.5) = -1.6 along +x for agent 0
        assert!((v0.x + 1.6).abs() < 1e-12);
    }

    #[test]
    fn coincident_agents_contribute_nothing() {
        let field = PairwiseField::compute(&[Vec2::new(1.0, 1.0), Vec2::new(1.0, 1.0)]);
        assert_eq!(repulsion(0, &field, &params()), Vec2::zero());
        assert_eq!(attraction(0, &field, &params()), Vec2::zero());
    }

    #[test]
    fn attraction_is_averaged_over_population() {
        let field = PairwiseField::compute(&[Vec2::new(0.0, 0.0), Vec2::new(3.0, 0.0)]);
        let v = attraction(0, &field, &params());
        // 0.2 / 2 * (3 - 1) = 0.2 toward the neighbour
        assert!((v.x - 0.2).abs() < 1e-12 && v.y == 0.0);
    }

    #[test]
    fn obstacles_push_harder_than_agents() {
        let wall = Obstacle::new(ObstacleId::Interior(0), Rect::new(1.0, -1.0, 2.0, 1.0));
        let v = obstacle_avoidance(Vec2::new(0.7, 0.0), &[wall.clone()], &params());
        // 12 * (0.3 - 0.5) along +x
        assert!((v.x + 2.4).abs() < 1e-12);
        let inside = obstacle_avoidance(Vec2::new(1.5, 0.0), &[wall], &params());
        assert_eq!(inside, Vec2::zero());
    }

    #[test]
    fn composed_velocity_is_clipped_and_zero_stays_zero() {
        let big = DesiredVelocity::compose(Vec2::new(10.0, 0.0), Vec2::new(0.0, 10.0), 3.0);
        assert!((big.desired.length() - 3.0).abs() < 1e-12);
        assert!((big.desired.x - big.desired.y).abs() < 1e-12);
        let none = DesiredVelocity::compose(Vec2::new(1.0, 0.0), Vec2::new(-1.0, 0.0), 3.0);
        assert_eq!(none.desired, Vec2::zero());
    }

    #[test]
    fn alignment_moves_toward_neighbour_mean() {
        let field = PairwiseField::compute(&[Vec2::new(0.0, 0.0), Vec2::new(0.1, 0.0), Vec2::new(5.0, 0.0)]);
        let velocities = [Vec2::zero(), Vec2::new(2.0, 0.0), Vec2::new(0.0, 100.0)];
        let a = AlignmentParams { r_align: 0.5, k_align: 0.5 };
        assert_eq!(alignment(0, &velocities, &field, &a), Vec2::new(1.0, 0.0));
        assert_eq!(alignment(2, &velocities, &field, &a), Vec2::zero());
    }

    #[test]
    fn alignment_only_enters_when_configured() {
        let field = PairwiseField::compute(&[Vec2::new(0.0, 0.0), Vec2::new(0.6, 0.0)]);
        let velocities = [Vec2::zero(), Vec2::new(0.0, 1.0)];
        let mut p = ForceParams::target_only(0.0, 3.0);
        let off = ForceField::new(p.clone()).desired_velocity(0, Vec2::zero(), &field, &velocities, &[], Vec2::zero(), Vec2::zero());
        assert_eq!(off.desired, Vec2::zero());
        p.alignment = Some(AlignmentParams { r_align: 1.0, k_align: 1.0 });
        let on = ForceField::new(p).desired_velocity(0, Vec2::zero(), &field, &velocities, &[], Vec2::zero(), Vec2::zero());
        assert_eq!(on.desired, Vec2::new(0.0, 1.0));
    }
}
