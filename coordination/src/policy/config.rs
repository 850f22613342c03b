//! Swarm policy configuration (§4.5): concurrency caps, priority scoring inputs,
//! retry, throttling, auto-scaling and per-agent-type resource limits.
//!
//! Every field follows the `SwarmConfig::default()` env-var convention used
//! throughout this codebase: `std::env::var(..).ok().and_then(|s| s.parse().ok())
//! .unwrap_or(default)`, under the `MAESTRO_*` prefix.

use std::collections::HashMap;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct PriorityConfig {
    pub default_priority: u8,
    pub max_priority: u8,
    /// `+2 when rating>=7` (§4.5 "complexityPriorityBoost").
    pub complexity_priority_boost: i32,
    /// `U` in `Critical -> +2+U, High -> +U, Normal -> 0, Low -> -2` (§4.5 "urgentPriorityBoost").
    pub urgent_priority_boost: i32,
    pub high_priority_agent_types: Vec<String>,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            default_priority: env_or("MAESTRO_DEFAULT_PRIORITY", 5),
            max_priority: env_or("MAESTRO_MAX_PRIORITY", 10),
            complexity_priority_boost: env_or("MAESTRO_COMPLEXITY_PRIORITY_BOOST", 2),
            urgent_priority_boost: env_or("MAESTRO_URGENT_PRIORITY_BOOST", 1),
            high_priority_agent_types: std::env::var("MAESTRO_HIGH_PRIORITY_AGENT_TYPES")
                .ok()
                .filter(|s| !s.is_empty())
                .map(|s| s.split(',').map(|p| p.trim().to_string()).collect())
                .unwrap_or_else(|| vec!["Designer".to_string(), "MethodAgent".to_string()]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retry_attempts: u32,
    pub initial_delay_ms: u64,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: env_or("MAESTRO_MAX_RETRY_ATTEMPTS", 3),
            initial_delay_ms: env_or("MAESTRO_RETRY_INITIAL_DELAY_MS", 500),
            backoff_factor: env_or("MAESTRO_RETRY_BACKOFF_FACTOR", 2.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThrottlingConfig {
    pub enabled: bool,
    pub max_agents_per_second: u32,
    pub max_agents_per_minute: u32,
    pub min_spawn_interval_ms: u64,
}

impl Default for ThrottlingConfig {
    fn default() -> Self {
        Self {
            enabled: env_or("MAESTRO_THROTTLING_ENABLED", true),
            max_agents_per_second: env_or("MAESTRO_MAX_AGENTS_PER_SECOND", 10),
            max_agents_per_minute: env_or("MAESTRO_MAX_AGENTS_PER_MINUTE", 120),
            min_spawn_interval_ms: env_or("MAESTRO_MIN_SPAWN_INTERVAL_MS", 50),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AutoScalingConfig {
    pub enabled: bool,
    /// Queue depth above which `RecommendAutoScale` proposes `Up`.
    pub scale_up_threshold: usize,
    /// Queue depth below which `RecommendAutoScale` proposes `Down` (only when
    /// `active > minAgents`).
    pub scale_down_threshold: usize,
    pub scale_up_increment: u32,
    pub scale_down_increment: u32,
    pub min_agents: u32,
}

impl Default for AutoScalingConfig {
    fn default() -> Self {
        Self {
            enabled: env_or("MAESTRO_AUTOSCALE_ENABLED", true),
            scale_up_threshold: env_or("MAESTRO_SCALE_UP_THRESHOLD", 50),
            scale_down_threshold: env_or("MAESTRO_SCALE_DOWN_THRESHOLD", 5),
            scale_up_increment: env_or("MAESTRO_SCALE_UP_INCREMENT", 2),
            scale_down_increment: env_or("MAESTRO_SCALE_DOWN_INCREMENT", 1),
            min_agents: env_or("MAESTRO_MIN_AGENTS", 1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResourceLimit {
    pub max_tokens: u32,
    pub max_cost_per_execution: f64,
    pub max_concurrent: u32,
}

#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub min_success_rate_percent: f64,
    pub health_check_interval_seconds: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            min_success_rate_percent: env_or("MAESTRO_MIN_SUCCESS_RATE_PERCENT", 80.0),
            health_check_interval_seconds: env_or("MAESTRO_HEALTH_CHECK_INTERVAL_SECONDS", 30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SwarmPolicyConfig {
    pub max_concurrent_agents: u32,
    pub max_agents_per_project: u32,
    pub max_cost_per_project: f64,
    pub max_controllers: u32,
    pub max_method_agents_per_controller: u32,
    pub priority: PriorityConfig,
    pub retry: RetryConfig,
    pub throttling: ThrottlingConfig,
    pub auto_scaling: AutoScalingConfig,
    pub resource_limits: HashMap<String, ResourceLimit>,
    pub health: HealthConfig,
}

impl Default for SwarmPolicyConfig {
    fn default() -> Self {
        let mut resource_limits = HashMap::new();
        resource_limits.insert(
            "MethodAgent".to_string(),
            ResourceLimit {
                max_tokens: env_or("MAESTRO_METHOD_AGENT_MAX_TOKENS", 4096),
                max_cost_per_execution: env_or("MAESTRO_METHOD_AGENT_MAX_COST", 0.50),
                max_concurrent: env_or("MAESTRO_METHOD_AGENT_MAX_CONCURRENT", 10),
            },
        );
        resource_limits.insert(
            "Designer".to_string(),
            ResourceLimit {
                max_tokens: env_or("MAESTRO_DESIGNER_MAX_TOKENS", 8192),
                max_cost_per_execution: env_or("MAESTRO_DESIGNER_MAX_COST", 1.00),
                max_concurrent: env_or("MAESTRO_DESIGNER_MAX_CONCURRENT", 4),
            },
        );

        Self {
            max_concurrent_agents: env_or("MAESTRO_MAX_CONCURRENT_AGENTS", 100),
            max_agents_per_project: env_or("MAESTRO_MAX_AGENTS_PER_PROJECT", 25),
            max_cost_per_project: env_or("MAESTRO_MAX_COST_PER_PROJECT", 20.0),
            max_controllers: env_or("MAESTRO_MAX_CONTROLLERS", 8),
            max_method_agents_per_controller: env_or("MAESTRO_MAX_METHOD_AGENTS_PER_CONTROLLER", 10),
            priority: PriorityConfig::default(),
            retry: RetryConfig::default(),
            throttling: ThrottlingConfig::default(),
            auto_scaling: AutoScalingConfig::default(),
            resource_limits,
            health: HealthConfig::default(),
        }
    }
}

/// Errors, warnings and recommendations from `Validate(config)` (§4.5); the caller
/// rejects applying an invalid config.
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn validate(config: &SwarmPolicyConfig) -> ValidationOutcome {
    let mut out = ValidationOutcome::default();

    if config.max_concurrent_agents == 0 {
        out.errors.push("maxConcurrentAgents must be > 0".into());
    }
    if config.max_agents_per_project == 0 {
        out.errors.push("maxAgentsPerProject must be > 0".into());
    }
    if config.max_agents_per_project > config.max_concurrent_agents {
        out.warnings
            .push("maxAgentsPerProject exceeds maxConcurrentAgents; a single project could starve the rest".into());
    }
    if config.priority.default_priority > config.priority.max_priority {
        out.errors.push("priority.defaultPriority exceeds priority.maxPriority".into());
    }
    if config.priority.max_priority == 0 {
        out.errors.push("priority.maxPriority must be > 0".into());
    }
    if config.throttling.enabled && config.throttling.max_agents_per_second == 0 {
        out.errors.push("throttling.maxAgentsPerSecond must be > 0 when throttling is enabled".into());
    }
    if config.auto_scaling.enabled && config.auto_scaling.scale_down_threshold >= config.auto_scaling.scale_up_threshold
    {
        out.errors
            .push("autoScaling.scaleDownThreshold must be less than autoScaling.scaleUpThreshold".into());
    }
    if config.resource_limits.is_empty() {
        out.warnings.push("no per-agent-type resourceLimits configured; every agent type is unbounded".into());
    }
    if config.health.min_success_rate_percent > 100.0 {
        out.errors.push("health.minSuccessRatePercent cannot exceed 100".into());
    }
    if config.auto_scaling.enabled && config.auto_scaling.min_agents == 0 {
        out.recommendations
            .push("consider autoScaling.minAgents >= 1 to avoid scaling to zero capacity".into());
    }

    out
}
