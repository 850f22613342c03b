//! The Swarm Policy (C5, §4.5): concurrency limits, throttling, priority scoring,
//! retry settings and auto-scale recommendations.

mod config;
mod error;

pub use config::{
    validate, AutoScalingConfig, HealthConfig, PriorityConfig, ResourceLimit, RetryConfig,
    SwarmPolicyConfig, ThrottlingConfig, ValidationOutcome,
};
pub use error::{PolicyError, PolicyResult};

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::domain::Priority;

/// `CheckSpawnCapacity` result (§4.5).
#[derive(Debug, Clone)]
pub struct SpawnCapacity {
    pub can_spawn: bool,
    pub reason: Option<String>,
    pub available_slots: u32,
    pub current_utilization: f64,
    pub remaining_budget: f64,
    pub warnings: Vec<String>,
}

/// Extra signals `CalculatePriority` considers beyond complexity/urgency (§4.5).
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityContext {
    pub is_blocking: bool,
    pub has_dependents: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleAction {
    None,
    Up,
    Down,
    Emergency,
}

#[derive(Debug, Clone)]
pub struct ScaleRecommendation {
    pub action: ScaleAction,
    pub delta: i32,
    pub reason: String,
    pub confidence: f64,
}

/// Holds the mutable spawn-capacity/throttle state that §4.5's config is a read-only
/// snapshot over: a `Mutex<VecDeque<Instant>>` of recent spawn timestamps, and
/// per-(agentType, project) counters behind an `RwLock<HashMap<..>>` (§4.5 Rust
/// addition).
pub struct SwarmPolicy {
    config: RwLock<SwarmPolicyConfig>,
    spawn_timestamps: Mutex<VecDeque<Instant>>,
    last_spawn: Mutex<Option<Instant>>,
    active_per_type: RwLock<HashMap<(Uuid, String), u32>>,
    active_per_project: RwLock<HashMap<Uuid, u32>>,
    global_active: RwLock<u32>,
    project_cost: RwLock<HashMap<Uuid, f64>>,
}

impl SwarmPolicy {
    pub fn new(config: SwarmPolicyConfig) -> Self {
        Self {
            config: RwLock::new(config),
            spawn_timestamps: Mutex::new(VecDeque::new()),
            last_spawn: Mutex::new(None),
            active_per_type: RwLock::new(HashMap::new()),
            active_per_project: RwLock::new(HashMap::new()),
            global_active: RwLock::new(0),
            project_cost: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> SwarmPolicyConfig {
        self.config.read().expect("policy config lock poisoned").clone()
    }

    pub fn replace_config(&self, config: SwarmPolicyConfig) -> ValidationOutcome {
        let outcome = validate(&config);
        if outcome.is_valid() {
            *self.config.write().expect("policy config lock poisoned") = config;
        }
        outcome
    }

    /// Record a successful spawn: bumps every counter this type/project is subject to
    /// and appends a timestamp for the throttle windows.
    pub fn record_spawn(&self, agent_type: &str, project_id: Uuid, cost: f64) {
        *self.global_active.write().expect("global active lock poisoned") += 1;
        *self
            .active_per_project
            .write()
            .expect("per-project lock poisoned")
            .entry(project_id)
            .or_insert(0) += 1;
        *self
            .active_per_type
            .write()
            .expect("per-type lock poisoned")
            .entry((project_id, agent_type.to_string()))
            .or_insert(0) += 1;
        *self
            .project_cost
            .write()
            .expect("project cost lock poisoned")
            .entry(project_id)
            .or_insert(0.0) += cost;

        let now = Instant::now();
        self.spawn_timestamps.lock().expect("spawn timestamps lock poisoned").push_back(now);
        *self.last_spawn.lock().expect("last spawn lock poisoned") = Some(now);
    }

    /// Record an agent's completion: releases its slot from every counter.
    pub fn record_completion(&self, agent_type: &str, project_id: Uuid) {
        let mut global = self.global_active.write().expect("global active lock poisoned");
        *global = global.saturating_sub(1);
        drop(global);
        let mut per_project = self.active_per_project.write().expect("per-project lock poisoned");
        if let Some(count) = per_project.get_mut(&project_id) {
            *count = count.saturating_sub(1);
        }
        drop(per_project);
        let mut per_type = self.active_per_type.write().expect("per-type lock poisoned");
        if let Some(count) = per_type.get_mut(&(project_id, agent_type.to_string())) {
            *count = count.saturating_sub(1);
        }
    }

    /// `CheckSpawnCapacity(agentType, projectId)` (§4.5): denies when global,
    /// per-project, or per-type caps are hit; warns at >=80% utilization.
    pub fn check_spawn_capacity(&self, agent_type: &str, project_id: Uuid) -> SpawnCapacity {
        let config = self.config();
        let global_active = *self.global_active.read().expect("global active lock poisoned");
        let project_active = *self
            .active_per_project
            .read()
            .expect("per-project lock poisoned")
            .get(&project_id)
            .unwrap_or(&0);
        let type_active = *self
            .active_per_type
            .read()
            .expect("per-type lock poisoned")
            .get(&(project_id, agent_type.to_string()))
            .unwrap_or(&0);
        let spent = *self.project_cost.read().expect("project cost lock poisoned").get(&project_id).unwrap_or(&0.0);

        let mut warnings = Vec::new();
        let mut reason = None;
        let mut can_spawn = true;

        if global_active >= config.max_concurrent_agents {
            can_spawn = false;
            reason = Some(format!(
                "global concurrency cap reached ({global_active}/{})",
                config.max_concurrent_agents
            ));
        } else if project_active >= config.max_agents_per_project {
            can_spawn = false;
            reason = Some(format!(
                "per-project cap reached ({project_active}/{})",
                config.max_agents_per_project
            ));
        } else if let Some(limit) = config.resource_limits.get(agent_type) {
            if type_active >= limit.max_concurrent {
                can_spawn = false;
                reason = Some(format!(
                    "per-agent-type cap reached for {agent_type} ({type_active}/{})",
                    limit.max_concurrent
                ));
            }
        }

        let remaining_budget = (config.max_cost_per_project - spent).max(0.0);
        if remaining_budget <= 0.0 {
            can_spawn = false;
            reason = Some(format!("project cost budget exhausted (spent {spent:.4})"));
        }

        let utilization = if config.max_concurrent_agents > 0 {
            global_active as f64 / config.max_concurrent_agents as f64
        } else {
            1.0
        };
        if utilization >= 0.8 {
            warnings.push(format!("global utilization at {:.0}%", utilization * 100.0));
        }
        let project_utilization = if config.max_agents_per_project > 0 {
            project_active as f64 / config.max_agents_per_project as f64
        } else {
            1.0
        };
        if project_utilization >= 0.8 {
            warnings.push(format!("project utilization at {:.0}%", project_utilization * 100.0));
        }

        let available_slots = config
            .max_concurrent_agents
            .saturating_sub(global_active)
            .min(config.max_agents_per_project.saturating_sub(project_active));

        SpawnCapacity {
            can_spawn,
            reason,
            available_slots,
            current_utilization: utilization,
            remaining_budget,
            warnings,
        }
    }

    /// `CheckThrottle()` (§4.5, §9 open question): independent 1s/60s sliding
    /// windows over the spawn-timestamp history, plus `minSpawnIntervalMs`.
    pub fn check_throttle(&self) -> PolicyResult<()> {
        let config = self.config();
        if !config.throttling.enabled {
            return Ok(());
        }
        let now = Instant::now();

        if let Some(last) = *self.last_spawn.lock().expect("last spawn lock poisoned") {
            let min_interval = Duration::from_millis(config.throttling.min_spawn_interval_ms);
            if now.duration_since(last) < min_interval {
                return Err(PolicyError::Throttled(format!(
                    "minSpawnIntervalMs not yet elapsed ({:?} < {:?})",
                    now.duration_since(last),
                    min_interval
                )));
            }
        }

        let mut timestamps = self.spawn_timestamps.lock().expect("spawn timestamps lock poisoned");
        while timestamps.front().is_some_and(|t| now.duration_since(*t) > Duration::from_secs(60)) {
            timestamps.pop_front();
        }
        let in_last_second = timestamps.iter().filter(|t| now.duration_since(**t) <= Duration::from_secs(1)).count();
        let in_last_minute = timestamps.len();

        if in_last_second as u32 >= config.throttling.max_agents_per_second {
            return Err(PolicyError::Throttled(format!(
                "maxAgentsPerSecond reached ({in_last_second}/{})",
                config.throttling.max_agents_per_second
            )));
        }
        if in_last_minute as u32 >= config.throttling.max_agents_per_minute {
            return Err(PolicyError::Throttled(format!(
                "maxAgentsPerMinute reached ({in_last_minute}/{})",
                config.throttling.max_agents_per_minute
            )));
        }
        Ok(())
    }

    /// `CalculatePriority(agentType, complexity, urgency, ctx)` (§4.5):
    /// `clamp(1, base + boosts, maxPriority)`.
    pub fn calculate_priority(&self, complexity: u8, urgency: Priority, ctx: PriorityContext) -> u8 {
        let config = self.config();
        let mut score = config.priority.default_priority as i32;
        if complexity >= 7 {
            score += config.priority.complexity_priority_boost;
        }
        score += urgency.urgency_boost(config.priority.urgent_priority_boost);
        if ctx.is_blocking {
            score += 3;
        }
        if ctx.has_dependents {
            score += 1;
        }
        score.clamp(1, config.priority.max_priority as i32) as u8
    }

    /// `RecommendAutoScale()` (§4.5): scale-up when `queueDepth > scaleUpThreshold`;
    /// scale-down when `queueDepth < scaleDownThreshold AND active > minAgents`; poor
    /// health raises a +1 recommendation if otherwise `None`.
    pub fn recommend_auto_scale(&self, queue_depth: usize, active_agents: u32, health_ok: bool) -> ScaleRecommendation {
        let config = self.config();
        if !config.auto_scaling.enabled {
            return ScaleRecommendation {
                action: ScaleAction::None,
                delta: 0,
                reason: "auto-scaling disabled".into(),
                confidence: 1.0,
            };
        }

        if queue_depth > config.auto_scaling.scale_up_threshold * 3 {
            return ScaleRecommendation {
                action: ScaleAction::Emergency,
                delta: (config.auto_scaling.scale_up_increment * 3) as i32,
                reason: format!(
                    "queue depth {queue_depth} is more than 3x scaleUpThreshold ({})",
                    config.auto_scaling.scale_up_threshold
                ),
                confidence: 0.95,
            };
        }
        if queue_depth > config.auto_scaling.scale_up_threshold {
            return ScaleRecommendation {
                action: ScaleAction::Up,
                delta: config.auto_scaling.scale_up_increment as i32,
                reason: format!(
                    "queue depth {queue_depth} exceeds scaleUpThreshold ({})",
                    config.auto_scaling.scale_up_threshold
                ),
                confidence: 0.8,
            };
        }
        if queue_depth < config.auto_scaling.scale_down_threshold && active_agents > config.auto_scaling.min_agents {
            return ScaleRecommendation {
                action: ScaleAction::Down,
                delta: -(config.auto_scaling.scale_down_increment as i32),
                reason: format!(
                    "queue depth {queue_depth} is below scaleDownThreshold ({}) with {active_agents} active",
                    config.auto_scaling.scale_down_threshold
                ),
                confidence: 0.7,
            };
        }
        if !health_ok {
            return ScaleRecommendation {
                action: ScaleAction::Up,
                delta: 1,
                reason: "success rate below health threshold".into(),
                confidence: 0.5,
            };
        }
        ScaleRecommendation {
            action: ScaleAction::None,
            delta: 0,
            reason: "within thresholds".into(),
            confidence: 0.9,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_denies_at_global_cap() {
        let mut config = SwarmPolicyConfig::default();
        config.max_concurrent_agents = 1;
        let policy = SwarmPolicy::new(config);
        let project = Uuid::new_v4();
        policy.record_spawn("MethodAgent", project, 0.0);
        let capacity = policy.check_spawn_capacity("MethodAgent", project);
        assert!(!capacity.can_spawn);
    }

    #[test]
    fn capacity_denies_when_cost_budget_exhausted() {
        let mut config = SwarmPolicyConfig::default();
        config.max_cost_per_project = 1.0;
        let policy = SwarmPolicy::new(config);
        let project = Uuid::new_v4();
        policy.record_spawn("MethodAgent", project, 1.5);
        let capacity = policy.check_spawn_capacity("MethodAgent", project);
        assert!(!capacity.can_spawn);
    }

    #[test]
    fn throttle_denies_over_per_second_cap() {
        let mut config = SwarmPolicyConfig::default();
        config.throttling.max_agents_per_second = 2;
        config.throttling.min_spawn_interval_ms = 0;
        let policy = SwarmPolicy::new(config);
        policy.record_spawn("MethodAgent", Uuid::new_v4(), 0.0);
        policy.record_spawn("MethodAgent", Uuid::new_v4(), 0.0);
        assert!(policy.check_throttle().is_err());
    }

    #[test]
    fn priority_clamps_to_max() {
        let policy = SwarmPolicy::new(SwarmPolicyConfig::default());
        let score = policy.calculate_priority(10, Priority::Critical, PriorityContext { is_blocking: true, has_dependents: true });
        assert_eq!(score, 10);
    }

    #[test]
    fn priority_never_goes_below_one() {
        let mut config = SwarmPolicyConfig::default();
        config.priority.default_priority = 1;
        let policy = SwarmPolicy::new(config);
        let score = policy.calculate_priority(1, Priority::Low, PriorityContext::default());
        assert!(score >= 1);
    }

    #[test]
    fn recommends_scale_up_over_threshold() {
        let mut config = SwarmPolicyConfig::default();
        config.auto_scaling.scale_up_threshold = 10;
        let policy = SwarmPolicy::new(config);
        let rec = policy.recommend_auto_scale(20, 5, true);
        assert_eq!(rec.action, ScaleAction::Up);
    }

    #[test]
    fn recommends_scale_down_under_threshold_with_spare_agents() {
        let mut config = SwarmPolicyConfig::default();
        config.auto_scaling.scale_down_threshold = 10;
        config.auto_scaling.min_agents = 1;
        let policy = SwarmPolicy::new(config);
        let rec = policy.recommend_auto_scale(2, 5, true);
        assert_eq!(rec.action, ScaleAction::Down);
    }

    #[test]
    fn poor_health_bumps_none_to_up() {
        let policy = SwarmPolicy::new(SwarmPolicyConfig::default());
        let rec = policy.recommend_auto_scale(20, 5, false);
        assert_eq!(rec.action, ScaleAction::Up);
        assert_eq!(rec.delta, 1);
    }
}
