use crate::arena::Arena;
use crate::forces::{ForceField, TickPlan};
use crate::integrator;
use crate::placement::{PlacementGenerator, PlacementSummary};
use crate::target::{self, TargetPath};
use anyhow::{Context, Result};
use log::{debug, info, trace};
use rand::rngs::StdRng;
use rand::SeedableRng;
use swarm_common::{RunRecord, Snapshot, SwarmConfig};

/// Owns a populated arena and drives it tick by tick.
pub struct SwarmSimulation {
    /// The simulation configuration the arena was built from.
    config: SwarmConfig,
    arena: Arena,
    field: ForceField,
    target: Box<dyn TargetPath>,
    /// Host-side RNG for placement; reinitialisation keeps drawing from it.
    rng: StdRng,
    placement: PlacementGenerator,
    last_placement: PlacementSummary,
}

impl SwarmSimulation {
    /// Builds and populates an arena, steering toward the configured target path.
    pub fn new(config: SwarmConfig) -> Result<Self> {
        let target = target::from_config(&config.target);
        Self::with_target(config, target)
    }

    /// Same as [`SwarmSimulation::new`] with a caller-supplied target path.
    pub fn with_target(config: SwarmConfig, target: Box<dyn TargetPath>) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.placement.seed);
        let placement = PlacementGenerator::new(config.placement.max_attempts);
        let (arena, last_placement) = Self::build_arena(&config, &placement, &mut rng)?;
        let field = ForceField::new(config.force_params());
        debug!("Force parameters: {:#?}", field.params());

        Ok(Self { config, arena, field, target, rng, placement, last_placement })
    }

    fn build_arena(
        config: &SwarmConfig,
        placement: &PlacementGenerator,
        rng: &mut StdRng,
    ) -> Result<(Arena, PlacementSummary)> {
        let mut arena = Arena::from_config(&config.arena, config.timing.dt);
        let summary = placement
            .populate(&mut arena, rng)
            .context("Failed to populate the arena")?;
        info!(
            "Arena [{:.2}, {:.2}] x [{:.2}, {:.2}] holds {} agents in {} groups and {} obstacles.",
            arena.bounds.x_min,
            arena.bounds.x_max,
            arena.bounds.y_min,
            arena.bounds.y_max,
            arena.agents().len(),
            arena.groups().len(),
            arena.obstacles().len()
        );
        Ok((arena, summary))
    }

    /// Advances the simulation by one tick and returns the plan that was applied.
    pub fn step(&mut self) -> TickPlan {
        let plan = self.field.evaluate(&mut self.arena, self.target.as_ref());
        integrator::advance(&mut self.arena, &plan);
        trace!("Tick {} committed, target ({:.3}, {:.3}).", self.arena.tick(), plan.target.x, plan.target.y);
        plan
    }

    /// Runs `ticks` steps.
    pub fn run(&mut self, ticks: u32) {
        for _ in 0..ticks {
            self.step();
        }
    }

    /// Truncates every history to the initial placement; geometry is kept.
    pub fn reset(&mut self) {
        self.arena.reset();
        info!("Simulation reset to the initial configuration.");
    }

    /// Discards the arena and runs placement again from the configuration.
    pub fn reinitialize(&mut self) -> Result<()> {
        let (arena, summary) = Self::build_arena(&self.config, &self.placement, &mut self.rng)?;
        self.arena = arena;
        self.last_placement = summary;
        info!("Simulation reinitialized.");
        Ok(())
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    pub fn placement_summary(&self) -> &PlacementSummary {
        &self.last_placement
    }

    pub fn tick(&self) -> u32 {
        self.arena.tick()
    }

    pub fn current_agent_count(&self) -> usize {
        self.arena.agents().len()
    }

    /// Renderer view of a past tick.
    pub fn record(&self, tick: u32) -> Option<Snapshot> {
        self.arena.snapshot(tick)
    }

    /// Layout plus every `interval`-th tick and the last one.
    pub fn run_record(&self, interval: u32) -> RunRecord {
        let interval = interval.max(1);
        let last = self.arena.tick();
        let snapshots = (0..=last)
            .filter(|t| t % interval == 0 || *t == last)
            .filter_map(|t| self.arena.snapshot(t))
            .collect();
        RunRecord { dt: self.arena.dt, layout: self.arena.layout(), snapshots }
    }

    /// Final agent positions as `(x, y)` pairs.
    pub fn get_results(&self) -> Vec<(f64, f64)> {
        self.arena.agents().iter().map(|a| a.position().as_tuple()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::FixedWaypoint;
    use swarm_common::{ArenaConfig, Vec2};

    fn config(n_agents: usize) -> SwarmConfig {
        let mut config = SwarmConfig::default();
        config.arena = ArenaConfig { len_x: 4.0, len_y: 4.0, n_agents, ..ArenaConfig::default() };
        config
    }

    #[test]
    fn histories_stay_aligned_across_ticks() {
        let mut sim = SwarmSimulation::new(config(6)).unwrap();
        sim.run(5);
        assert_eq!(sim.tick(), 5);
        for agent in sim.arena().agents() {
            assert_eq!(agent.history().len(), 6);
        }
        assert_eq!(sim.arena().com_history().len(), 5);
    }

    #[test]
    fn velocity_bound_holds_every_tick() {
        let mut sim = SwarmSimulation::new(config(12)).unwrap();
        let v_max = sim.config().forces.v_max;
        for _ in 0..20 {
            let plan = sim.step();
            for v in &plan.velocities {
                assert!(v.desired.length() <= v_max + 1e-9);
                if v.field + v.target == Vec2::zero() {
                    assert_eq!(v.desired, Vec2::zero());
                }
            }
        }
    }

    #[test]
    fn reset_restores_first_sample() {
        let mut sim = SwarmSimulation::new(config(5)).unwrap();
        let initial = sim.arena().initial_positions();
        sim.run(10);
        sim.reset();
        assert_eq!(sim.tick(), 0);
        for (agent, p0) in sim.arena().agents().iter().zip(&initial) {
            assert_eq!(agent.history().len(), 1);
            assert_eq!(agent.position(), *p0);
            assert_eq!(agent.velocity(), Vec2::zero());
        }
        // Replaying after reset is deterministic.
        sim.run(3);
        let replay = sim.get_results();
        sim.reset();
        sim.run(3);
        assert_eq!(sim.get_results(), replay);
    }

    #[test]
    fn reinitialize_places_a_fresh_swarm() {
        let mut sim = SwarmSimulation::with_target(config(5), Box::new(FixedWaypoint(Vec2::new(2.0, 2.0)))).unwrap();
        let before = sim.arena().initial_positions();
        sim.run(2);
        sim.reinitialize().unwrap();
        assert_eq!(sim.tick(), 0);
        assert_eq!(sim.current_agent_count(), 5);
        assert_ne!(sim.arena().initial_positions(), before);
    }

    #[test]
    fn run_record_keeps_interval_and_last_tick() {
        let mut sim = SwarmSimulation::new(config(3)).unwrap();
        sim.run(7);
        let record = sim.run_record(3);
        let ticks: Vec<u32> = record.snapshots.iter().map(|s| s.tick).collect();
        assert_eq!(ticks, vec![0, 3, 6, 7]);
        assert!(record.snapshots[0].target.is_none());
        assert!(record.snapshots[1].target.is_some());
        assert_eq!(record.layout.groups.len(), 3);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut bad = config(3);
        bad.timing.dt = -1.0;
        assert!(SwarmSimulation::new(bad).is_err());
    }
}
