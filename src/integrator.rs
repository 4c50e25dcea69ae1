use crate::arena::Arena;
use crate::forces::TickPlan;
use crate::geometry::TrackSample;
use rayon::prelude::*;

/// Commits one tick: every agent moves with the velocity valid during the
/// interval just elapsed (explicit Euler), then stores the freshly computed
/// desired velocity for the next interval. The order matters.
pub fn advance(arena: &mut Arena, plan: &TickPlan) {
    let dt = arena.dt;
    let target_point = plan.target;
    arena
        .agents
        .par_iter_mut()
        .zip(plan.velocities.par_iter())
        .for_each(|(agent, v)| {
            let previous = *agent.latest();
            agent.push(TrackSample {
                position: previous.position + previous.velocity * dt,
                velocity: v.desired,
                field_velocity: v.field,
                target_velocity: v.target,
                desired_velocity: v.desired,
                target_point,
            });
        });
    arena.tick += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forces::DesiredVelocity;
    use crate::geometry::Agent;
    use swarm_common::{ArenaConfig, Vec2};

    #[test]
    fn position_uses_previous_velocity_and_new_velocity_is_stored() {
        let mut arena = Arena::from_config(&ArenaConfig::default(), 0.5);
        arena.agents = vec![Agent::new(0, 0, 0.1, Vec2::new(1.0, 1.0))];
        let plan = |v: Vec2| TickPlan {
            target: Vec2::new(9.0, 9.0),
            centers_of_mass: vec![],
            velocities: vec![DesiredVelocity { field: Vec2::zero(), target: v, desired: v }],
        };

        advance(&mut arena, &plan(Vec2::new(2.0, 0.0)));
        // Initial velocity is zero, so the first step does not move the agent.
        assert_eq!(arena.agents()[0].position(), Vec2::new(1.0, 1.0));
        assert_eq!(arena.agents()[0].velocity(), Vec2::new(2.0, 0.0));

        advance(&mut arena, &plan(Vec2::new(0.0, 4.0)));
        assert_eq!(arena.agents()[0].position(), Vec2::new(2.0, 1.0));
        assert_eq!(arena.agents()[0].velocity(), Vec2::new(0.0, 4.0));
        assert_eq!(arena.agents()[0].history().len(), 3);
        assert_eq!(arena.tick(), 2);
        assert_eq!(arena.agents()[0].latest().target_point, Vec2::new(9.0, 9.0));
    }
}
