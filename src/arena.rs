use crate::geometry::{Agent, Obstacle, ObstacleId, Rect};
use log::warn;
use std::collections::BTreeMap;
use swarm_common::{mean, ArenaConfig, ArenaLayout, Snapshot, Vec2};

/// Occupancy maxima the feasibility ratios are normalised against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityLimits {
    pub max_agent_occupation: f64,
    pub max_obstacle_non_access: f64,
    pub max_obstacle_occupation: f64,
}

/// The bounded rectangular domain, its entities and the swarm-level history.
#[derive(Debug, Clone)]
pub struct Arena {
    pub fixed_size: bool,
    pub walls: bool,
    pub dt: f64,
    /// Requested agent count (may be reduced by the feasibility check).
    pub n_agents: usize,
    /// Requested interior obstacle count, walls excluded.
    pub n_obstacles: usize,
    pub n_groups: u32,
    pub bounds: Rect,
    pub agent_radius: f64,
    pub d_min_aa: f64,
    pub d_min_ao: f64,
    pub d_min_oo: f64,
    /// Accessible-area margin: negative with walls, positive in open arenas.
    pub d_signed: f64,
    /// Side length of every interior obstacle (they are square).
    pub obstacle_side: f64,
    pub limits: DensityLimits,
    pub(crate) agents: Vec<Agent>,
    pub(crate) obstacles: Vec<Obstacle>,
    pub(crate) com_history: Vec<Vec<Vec2>>,
    pub(crate) tick: u32,
}

impl Arena {
    /// Builds an empty arena from its configuration section.
    pub fn from_config(config: &ArenaConfig, dt: f64) -> Self {
        let agent_size = config.agent_size;
        let agent_radius = agent_size / 2.0;
        let d_min_aa = config.d_min_scale * 2.0 * agent_radius;
        let d_min_ao = d_min_aa - agent_radius;

        let len_x = config.len_x.max(agent_size);
        let len_y = config.len_y.max(agent_size);
        let x_max = match config.x_max {
            Some(x_max) if x_max - config.x_min > agent_size => x_max,
            Some(x_max) => {
                warn!("x_max {} leaves less than one agent diameter, using len_x {}.", x_max, len_x);
                config.x_min + len_x
            }
            None => config.x_min + len_x,
        };
        let y_max = match config.y_max {
            Some(y_max) if y_max - config.y_min > agent_size => y_max,
            Some(y_max) => {
                warn!("y_max {} leaves less than one agent diameter, using len_y {}.", y_max, len_y);
                config.y_min + len_y
            }
            None => config.y_min + len_y,
        };
        let bounds = Rect::new(config.x_min, config.y_min, x_max, y_max);

        let obstacle_side = if config.n_obstacles > 0 {
            let total = bounds.len_x() * bounds.len_y() * config.max_obstacle_occupation;
            (total / config.n_obstacles as f64).sqrt()
        } else {
            0.0
        };

        Arena {
            fixed_size: config.fixed_size,
            walls: config.walls,
            dt,
            n_agents: config.n_agents,
            n_obstacles: config.n_obstacles,
            n_groups: config.n_groups,
            bounds,
            agent_radius,
            d_min_aa,
            d_min_ao,
            d_min_oo: d_min_aa,
            d_signed: if config.walls { -d_min_aa } else { d_min_aa },
            obstacle_side,
            limits: DensityLimits {
                max_agent_occupation: config.max_agent_occupation,
                max_obstacle_non_access: config.max_obstacle_non_access,
                max_obstacle_occupation: config.max_obstacle_occupation,
            },
            agents: Vec::new(),
            obstacles: Vec::new(),
            com_history: Vec::new(),
            tick: 0,
        }
    }

    pub fn len_x(&self) -> f64 {
        self.bounds.len_x()
    }

    pub fn len_y(&self) -> f64 {
        self.bounds.len_y()
    }

    pub fn area(&self) -> f64 {
        self.len_x() * self.len_y()
    }

    /// Total interior obstacle area.
    pub fn obstacle_area(&self) -> f64 {
        self.n_obstacles as f64 * self.obstacle_side * self.obstacle_side
    }

    /// Area reachable by agent centers once the signed margin is applied.
    pub fn accessible_area(&self) -> f64 {
        (self.len_x() + self.d_signed).max(0.0) * (self.len_y() + self.d_signed).max(0.0)
    }

    /// Obstacle area including the agent clearance band around each box.
    pub fn obstacle_non_access_area(&self) -> f64 {
        let side = self.obstacle_side + self.d_min_ao;
        self.n_obstacles as f64 * side * side
    }

    pub fn free_area(&self) -> f64 {
        self.accessible_area() - self.obstacle_non_access_area()
    }

    /// Obstacle occupancy relative to its maximum; feasible when `<= 1`.
    pub fn obstacle_ratio(&self) -> f64 {
        let area = self.area();
        let occupation = if area > 0.0 { self.obstacle_non_access_area() / area } else { 0.0 };
        occupation / self.limits.max_obstacle_non_access
    }

    /// Agent occupancy of the free area relative to its maximum; feasible when `<= 1`.
    pub fn agent_ratio(&self) -> f64 {
        if self.n_agents == 0 {
            return 0.0;
        }
        let free = self.free_area();
        if free <= 0.0 {
            return f64::INFINITY;
        }
        let disc = std::f64::consts::PI * (self.d_min_aa / 2.0).powi(2);
        (disc * self.n_agents as f64 / free) / self.limits.max_agent_occupation
    }

    /// Grows the arena by `scale` about its fixed minimum corner.
    /// Wall obstacles keep their inner edge on the new boundary.
    pub fn rescale(&mut self, scale: f64) {
        let origin = Vec2::new(self.bounds.x_min, self.bounds.y_min);
        self.bounds.x_max = origin.x + self.len_x() * scale;
        self.bounds.y_max = origin.y + self.len_y() * scale;
        self.obstacle_side *= scale;

        let bounds = self.bounds;
        for obstacle in &mut self.obstacles {
            let b = &mut obstacle.bounds;
            match obstacle.id {
                ObstacleId::LeftWall => b.y_max = bounds.y_max,
                ObstacleId::RightWall => {
                    b.x_min = bounds.x_max;
                    b.x_max = bounds.x_max;
                    b.y_max = bounds.y_max;
                }
                ObstacleId::DownWall => b.x_max = bounds.x_max,
                ObstacleId::UpWall => {
                    b.x_max = bounds.x_max;
                    b.y_min = bounds.y_max;
                    b.y_max = bounds.y_max;
                }
                ObstacleId::Interior(_) => {
                    b.x_min = origin.x + (b.x_min - origin.x) * scale;
                    b.y_min = origin.y + (b.y_min - origin.y) * scale;
                    b.x_max = origin.x + (b.x_max - origin.x) * scale;
                    b.y_max = origin.y + (b.y_max - origin.y) * scale;
                }
            }
        }
    }

    /// Adds an agent at rest without any separation check; returns its id.
    pub fn place_agent(&mut self, group: u32, position: Vec2) -> usize {
        let id = self.agents.len();
        self.agents.push(Agent::new(id, group, self.agent_radius, position));
        id
    }

    /// Adds an obstacle without any separation check.
    pub fn place_obstacle(&mut self, id: ObstacleId, bounds: Rect) {
        self.obstacles.push(Obstacle::new(id, bounds));
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    /// Per-tick group centers used as the target path origin.
    pub fn com_history(&self) -> &[Vec<Vec2>] {
        &self.com_history
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn elapsed(&self) -> f64 {
        self.tick as f64 * self.dt
    }

    pub fn initial_positions(&self) -> Vec<Vec2> {
        self.agents.iter().map(Agent::initial_position).collect()
    }

    /// Group tags present among the agents, ascending.
    pub fn groups(&self) -> Vec<u32> {
        let mut groups: Vec<u32> = self.agents.iter().map(|a| a.group).collect();
        groups.sort_unstable();
        groups.dedup();
        groups
    }

    /// Mean position of every existing group at `tick`, ascending by tag.
    /// Groups without members never appear, so every mean is defined.
    pub fn group_centers_at(&self, tick: usize) -> Vec<Vec2> {
        let mut members: BTreeMap<u32, Vec<Vec2>> = BTreeMap::new();
        for agent in &self.agents {
            if let Some(sample) = agent.history().get(tick) {
                members.entry(agent.group).or_default().push(sample.position);
            }
        }
        members
            .into_values()
            .filter_map(|points| mean(points))
            .collect()
    }

    /// Truncates every history back to the initial placement.
    pub fn reset(&mut self) {
        for agent in &mut self.agents {
            agent.truncate_to_initial();
        }
        self.com_history.clear();
        self.tick = 0;
    }

    pub fn layout(&self) -> ArenaLayout {
        ArenaLayout {
            x_min: self.bounds.x_min,
            y_min: self.bounds.y_min,
            x_max: self.bounds.x_max,
            y_max: self.bounds.y_max,
            agent_radius: self.agent_radius,
            groups: self.agents.iter().map(|a| a.group).collect(),
            obstacles: self.obstacles.iter().map(Obstacle::to_box).collect(),
        }
    }

    /// Renderer view of tick `tick`, `None` past the current tick.
    pub fn snapshot(&self, tick: u32) -> Option<Snapshot> {
        if tick > self.tick {
            return None;
        }
        let idx = tick as usize;
        let positions = self
            .agents
            .iter()
            .filter_map(|a| a.history().get(idx).map(|s| s.position.as_tuple()))
            .collect();
        let target = if idx > 0 {
            self.agents.first().and_then(|a| a.history().get(idx)).map(|s| s.target_point.as_tuple())
        } else {
            None
        };
        Some(Snapshot {
            tick,
            time: tick as f64 * self.dt,
            positions,
            centers_of_mass: self.group_centers_at(idx).iter().map(Vec2::as_tuple).collect(),
            target,
        })
    }
}
