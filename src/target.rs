use swarm_common::{mean, TargetConfig, Vec2};

/// Time-parameterised waypoint generator.
///
/// `origin` is the first recorded frame of group centers (ascending group tag)
/// and `elapsed` the simulation time. Implementations must be pure so runs are
/// reproducible.
pub trait TargetPath: Send + Sync {
    fn waypoint(&self, origin: &[Vec2], elapsed: f64) -> Vec2;
}

impl<F> TargetPath for F
where
    F: Fn(&[Vec2], f64) -> Vec2 + Send + Sync,
{
    fn waypoint(&self, origin: &[Vec2], elapsed: f64) -> Vec2 {
        self(origin, elapsed)
    }
}

fn origin_center(origin: &[Vec2]) -> Vec2 {
    mean(origin.iter().copied()).unwrap_or_default()
}

/// A waypoint that never moves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedWaypoint(pub Vec2);

impl TargetPath for FixedWaypoint {
    fn waypoint(&self, _origin: &[Vec2], _elapsed: f64) -> Vec2 {
        self.0
    }
}

/// Circles the initial swarm center, starting `radius` to its right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orbit {
    pub radius: f64,
    pub period: f64,
}

impl TargetPath for Orbit {
    fn waypoint(&self, origin: &[Vec2], elapsed: f64) -> Vec2 {
        let phase = std::f64::consts::TAU * elapsed / self.period;
        origin_center(origin) + Vec2::new(phase.cos(), phase.sin()) * self.radius
    }
}

/// Moves away from the initial swarm center at constant velocity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sweep {
    pub velocity: Vec2,
}

impl TargetPath for Sweep {
    fn waypoint(&self, origin: &[Vec2], elapsed: f64) -> Vec2 {
        origin_center(origin) + self.velocity * elapsed
    }
}

/// Builds the configured built-in path.
pub fn from_config(config: &TargetConfig) -> Box<dyn TargetPath> {
    match *config {
        TargetConfig::Fixed { x, y } => Box::new(FixedWaypoint(Vec2::new(x, y))),
        TargetConfig::Orbit { radius, period } => Box::new(Orbit { radius, period }),
        TargetConfig::Sweep { vx, vy } => Box::new(Sweep { velocity: Vec2::new(vx, vy) }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orbit_starts_right_of_the_center_and_closes() {
        let orbit = Orbit { radius: 2.0, period: 4.0 };
        let origin = [Vec2::new(0.0, 0.0), Vec2::new(2.0, 2.0)];
        let start = orbit.waypoint(&origin, 0.0);
        assert!((start.x - 3.0).abs() < 1e-12 && (start.y - 1.0).abs() < 1e-12);
        let quarter = orbit.waypoint(&origin, 1.0);
        assert!((quarter.x - 1.0).abs() < 1e-9 && (quarter.y - 3.0).abs() < 1e-9);
        assert!(orbit.waypoint(&origin, 4.0).distance(start) < 1e-9);
    }

    #[test]
    fn sweep_is_linear_in_time() {
        let sweep = Sweep { velocity: Vec2::new(1.0, -0.5) };
        assert_eq!(sweep.waypoint(&[Vec2::new(1.0, 1.0)], 2.0), Vec2::new(3.0, 0.0));
    }

    #[test]
    fn empty_origin_falls_back_to_zero() {
        let sweep = Sweep { velocity: Vec2::new(1.0, 0.0) };
        assert_eq!(sweep.waypoint(&[], 1.0), Vec2::new(1.0, 0.0));
    }

    #[test]
    fn closures_are_target_paths() {
        let path = |_: &[Vec2], t: f64| Vec2::new(t, t);
        assert_eq!(path.waypoint(&[], 0.5), Vec2::new(0.5, 0.5));
        let boxed = from_config(&TargetConfig::Fixed { x: 1.0, y: 2.0 });
        assert_eq!(boxed.waypoint(&[], 10.0), Vec2::new(1.0, 2.0));
    }
}
