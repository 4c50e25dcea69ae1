use swarm_common::{ObstacleBox, Vec2};

/// Identity of an obstacle: interior index or one of the reserved boundary walls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObstacleId {
    Interior(usize),
    LeftWall,
    RightWall,
    DownWall,
    UpWall,
}

impl ObstacleId {
    pub fn is_wall(self) -> bool {
        !matches!(self, ObstacleId::Interior(_))
    }
}

/// Axis-aligned rectangle `[x_min, x_max] x [y_min, y_max]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl Rect {
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Rect { x_min, y_min, x_max, y_max }
    }

    pub fn len_x(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn len_y(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// The rectangle grown by `margin` on every side.
    pub fn inflated(&self, margin: f64) -> Rect {
        Rect {
            x_min: self.x_min - margin,
            y_min: self.y_min - margin,
            x_max: self.x_max + margin,
            y_max: self.y_max + margin,
        }
    }

    /// Overlap test; rectangles that merely touch count as overlapping.
    pub fn overlaps(&self, other: &Rect) -> bool {
        !(self.x_max < other.x_min
            || self.x_min > other.x_max
            || self.y_max < other.y_min
            || self.y_min > other.y_max)
    }

    /// Closest point of the rectangle to `p` (coordinate-wise clamp).
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        p.clamp_to_box(Vec2::new(self.x_min, self.y_min), Vec2::new(self.x_max, self.y_max))
    }

    /// Distance from `p` to the rectangle, zero when `p` is inside.
    pub fn distance_to(&self, p: Vec2) -> f64 {
        self.closest_point(p).distance(p)
    }

    /// True when a circle of `radius` around `center` reaches the rectangle.
    pub fn intersects_circle(&self, center: Vec2, radius: f64) -> bool {
        self.distance_to(center) <= radius
    }
}

/// A static rectangular region agents must avoid.
#[derive(Debug, Clone, PartialEq)]
pub struct Obstacle {
    pub id: ObstacleId,
    pub bounds: Rect,
}

impl Obstacle {
    pub fn new(id: ObstacleId, bounds: Rect) -> Self {
        Obstacle { id, bounds }
    }

    pub fn to_box(&self) -> ObstacleBox {
        ObstacleBox {
            is_wall: self.id.is_wall(),
            x_min: self.bounds.x_min,
            y_min: self.bounds.y_min,
            x_max: self.bounds.x_max,
            y_max: self.bounds.y_max,
        }
    }
}

/// One committed tick of an agent's trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackSample {
    pub position: Vec2,
    /// Velocity valid for the interval that starts at this sample.
    pub velocity: Vec2,
    /// Neighbour, obstacle and alignment contributions before clipping.
    pub field_velocity: Vec2,
    pub target_velocity: Vec2,
    /// Clipped sum, equal to `velocity` for every sample after the first.
    pub desired_velocity: Vec2,
    pub target_point: Vec2,
}

/// A disc-shaped mobile agent and its append-only history.
#[derive(Debug, Clone)]
pub struct Agent {
    pub id: usize,
    pub group: u32,
    pub radius: f64,
    history: Vec<TrackSample>,
}

impl Agent {
    /// Creates an agent at rest at `position`.
    pub fn new(id: usize, group: u32, radius: f64, position: Vec2) -> Self {
        Agent {
            id,
            group,
            radius,
            history: vec![TrackSample { position, ..TrackSample::default() }],
        }
    }

    pub fn history(&self) -> &[TrackSample] {
        &self.history
    }

    pub fn latest(&self) -> &TrackSample {
        // The constructor seeds one sample and reset never drops it.
        &self.history[self.history.len() - 1]
    }

    pub fn position(&self) -> Vec2 {
        self.latest().position
    }

    pub fn velocity(&self) -> Vec2 {
        self.latest().velocity
    }

    pub fn initial_position(&self) -> Vec2 {
        self.history[0].position
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec2> + '_ {
        self.history.iter().map(|s| s.position)
    }

    pub fn target_points(&self) -> impl Iterator<Item = Vec2> + '_ {
        self.history.iter().skip(1).map(|s| s.target_point)
    }

    pub(crate) fn push(&mut self, sample: TrackSample) {
        self.history.push(sample);
    }

    /// Drops everything after the first sample and puts the agent at rest.
    pub(crate) fn truncate_to_initial(&mut self) {
        self.history.truncate(1);
        let position = self.history[0].position;
        self.history[0] = TrackSample { position, ..TrackSample::default() };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_rectangles_overlap() {
        let a = Rect::new(0.0, 0.0, 1.0, 1.0);
        let b = Rect::new(1.0, 0.0, 2.0, 1.0);
        let c = Rect::new(1.01, 0.0, 2.0, 1.0);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn inflated_rectangles_catch_near_misses() {
        let a = Rect::new(0.0, 0.0, 1.0, 1.0);
        let b = Rect::new(1.2, 0.0, 2.0, 1.0);
        assert!(!a.overlaps(&b));
        assert!(a.inflated(0.15).overlaps(&b.inflated(0.15)));
    }

    #[test]
    fn circle_test_uses_clamped_distance() {
        let r = Rect::new(0.0, 0.0, 1.0, 1.0);
        assert!(r.intersects_circle(Vec2::new(0.5, 0.5), 0.0));
        assert!(r.intersects_circle(Vec2::new(1.2, 0.5), 0.2));
        assert!(!r.intersects_circle(Vec2::new(1.2, 1.2), 0.2));
        assert!((r.distance_to(Vec2::new(1.3, 1.4)) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn truncation_keeps_only_a_resting_first_sample() {
        let mut agent = Agent::new(0, 0, 0.1, Vec2::new(1.0, 2.0));
        agent.push(TrackSample {
            position: Vec2::new(1.5, 2.0),
            velocity: Vec2::new(1.0, 0.0),
            ..TrackSample::default()
        });
        assert_eq!(agent.history().len(), 2);
        agent.truncate_to_initial();
        assert_eq!(agent.history().len(), 1);
        assert_eq!(agent.position(), Vec2::new(1.0, 2.0));
        assert_eq!(agent.velocity(), Vec2::zero());
    }

    #[test]
    fn walls_are_distinguished_by_id() {
        assert!(ObstacleId::UpWall.is_wall());
        assert!(!ObstacleId::Interior(3).is_wall());
    }
}
