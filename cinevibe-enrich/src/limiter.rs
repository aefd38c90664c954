// Per-service rate limiting with adaptive backoff
//
// Each external service gets one ServiceLimiter: a token bucket (governor)
// refilled at the configured request rate, plus an adaptive inter-request
// delay that grows when the service pushes back and decays toward the
// configured baseline while calls succeed.
//
// Limiters are explicit instances built from configuration and passed by
// parameter; nothing in this module is a process-global singleton. There is
// no cross-process coordination: two pipeline processes hitting the same
// service can double-burst it (documented limitation).

use cinevibe_common::config::ServiceRateSettings;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Consecutive generic errors tolerated before the adaptive delay grows
const ERROR_GROWTH_THRESHOLD: u32 = 3;

/// Geometric growth factor on an explicit rate-limit signal
const RATE_LIMIT_GROWTH: f64 = 2.0;

/// Milder growth factor for repeated generic errors
const ERROR_GROWTH: f64 = 1.5;

/// Geometric decay factor applied on success
const SUCCESS_DECAY: f64 = 0.75;

/// Adaptive state shared by all callers of one service
#[derive(Debug)]
struct AdaptiveState {
    current_delay: Duration,
    consecutive_errors: u32,
}

/// Token bucket plus adaptive delay for one external service
pub struct ServiceLimiter {
    name: String,
    bucket: DefaultDirectRateLimiter,
    base_delay: Duration,
    max_delay: Duration,
    state: Mutex<AdaptiveState>,
}

impl ServiceLimiter {
    pub fn new(name: &str, settings: &ServiceRateSettings) -> Self {
        let rps = NonZeroU32::new(settings.requests_per_second.max(1))
            .unwrap_or(NonZeroU32::MIN);
        let base_delay = Duration::from_millis(settings.delay_ms);

        Self {
            name: name.to_string(),
            bucket: RateLimiter::direct(Quota::per_second(rps)),
            base_delay,
            max_delay: Duration::from_millis(settings.max_delay_ms),
            state: Mutex::new(AdaptiveState {
                current_delay: base_delay,
                consecutive_errors: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for a token, then apply the current adaptive delay.
    ///
    /// Both waits are cooperative suspension points; callers must not hold
    /// locks across `acquire()`.
    pub async fn acquire(&self) {
        self.bucket.until_ready().await;

        let delay = {
            let state = self.state.lock().await;
            state.current_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Record a successful call: reset the error streak and decay the
    /// adaptive delay geometrically toward the baseline.
    pub async fn report_success(&self) {
        let mut state = self.state.lock().await;
        state.consecutive_errors = 0;
        state.current_delay = state.current_delay.mul_f64(SUCCESS_DECAY).max(self.base_delay);
    }

    /// Record an explicit rate-limit signal: grow the delay geometrically up
    /// to the configured cap.
    pub async fn report_rate_limit(&self) {
        let mut state = self.state.lock().await;
        state.consecutive_errors = 0;
        let grown = state
            .current_delay
            .max(Duration::from_millis(1))
            .mul_f64(RATE_LIMIT_GROWTH);
        state.current_delay = grown.min(self.max_delay).max(self.base_delay);
        tracing::warn!(
            service = %self.name,
            delay_ms = state.current_delay.as_millis() as u64,
            "Service rate limited, adaptive delay increased"
        );
    }

    /// Record a generic error: only sustained failure streaks affect the
    /// delay, with milder growth than an explicit rate-limit signal.
    pub async fn report_error(&self) {
        let mut state = self.state.lock().await;
        state.consecutive_errors += 1;
        if state.consecutive_errors >= ERROR_GROWTH_THRESHOLD {
            let grown = state
                .current_delay
                .max(Duration::from_millis(1))
                .mul_f64(ERROR_GROWTH);
            state.current_delay = grown.min(self.max_delay).max(self.base_delay);
            tracing::debug!(
                service = %self.name,
                consecutive_errors = state.consecutive_errors,
                delay_ms = state.current_delay.as_millis() as u64,
                "Repeated errors, adaptive delay increased"
            );
        }
    }

    /// Current adaptive delay (observability and tests)
    pub async fn current_delay(&self) -> Duration {
        self.state.lock().await.current_delay
    }
}

impl std::fmt::Debug for ServiceLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceLimiter")
            .field("name", &self.name)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish_non_exhaustive()
    }
}

/// Registry of per-service limiters, one instance per service name
///
/// The registry is scoped to the process and handed to the orchestrator by
/// parameter; callers must not instantiate competing limiters for the same
/// service (the shared adaptive state is the point).
#[derive(Debug, Default)]
pub struct RateLimiterRegistry {
    limiters: std::sync::Mutex<HashMap<String, Arc<ServiceLimiter>>>,
    settings: HashMap<String, ServiceRateSettings>,
}

impl RateLimiterRegistry {
    /// Build a registry from the configured per-service settings
    pub fn from_settings(settings: HashMap<String, ServiceRateSettings>) -> Self {
        Self {
            limiters: std::sync::Mutex::new(HashMap::new()),
            settings,
        }
    }

    /// Get the shared limiter for a service, creating it on first use with
    /// the configured (or default) settings.
    pub fn limiter(&self, name: &str) -> Arc<ServiceLimiter> {
        let mut limiters = self.limiters.lock().expect("limiter registry poisoned");
        limiters
            .entry(name.to_string())
            .or_insert_with(|| {
                let settings = self.settings.get(name).cloned().unwrap_or_default();
                tracing::debug!(
                    service = name,
                    requests_per_second = settings.requests_per_second,
                    delay_ms = settings.delay_ms,
                    "Creating service rate limiter"
                );
                Arc::new(ServiceLimiter::new(name, &settings))
            })
            .clone()
    }
}
