/*!
 * Prometheus exposition of breaker metrics
 *
 * Breakers keep their own counters; the exporter mirrors them into a
 * Prometheus registry on every render, so a scrape always reflects the
 * latest snapshot (including metric resets). Renders are serialized so a
 * concurrent scrape never sees a counter between its reset and refill.
 */

use crate::error::{Result, RiskGuardError};
use prometheus::{Encoder, GaugeVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use riskguard_core_resilience::{BreakerRegistry, CircuitState};
use std::sync::{Mutex, PoisonError};

/// Numeric encoding of breaker state for the state gauge
pub fn state_value(state: CircuitState) -> i64 {
    match state {
        CircuitState::Closed => 0,
        CircuitState::Open => 1,
        CircuitState::HalfOpen => 2,
    }
}

/// Renders every registered breaker in Prometheus text format
pub struct TelemetryExporter {
    registry: Registry,
    calls: IntCounterVec,
    state: IntGaugeVec,
    fallbacks: IntCounterVec,
    transitions: IntCounterVec,
    opened: IntCounterVec,
    latency_avg: GaugeVec,
    render_lock: Mutex<()>,
}

impl TelemetryExporter {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let calls = IntCounterVec::new(
            Opts::new(
                "riskguard_breaker_calls_total",
                "Calls through a circuit breaker by outcome",
            ),
            &["breaker", "outcome"],
        )?;
        let state = IntGaugeVec::new(
            Opts::new(
                "riskguard_breaker_state",
                "Circuit breaker state (0 closed, 1 open, 2 half-open)",
            ),
            &["breaker"],
        )?;
        let fallbacks = IntCounterVec::new(
            Opts::new(
                "riskguard_breaker_fallbacks_total",
                "Fallback results served in place of the protected call",
            ),
            &["breaker"],
        )?;
        let transitions = IntCounterVec::new(
            Opts::new(
                "riskguard_breaker_transitions_total",
                "Circuit breaker state transitions",
            ),
            &["breaker"],
        )?;
        let opened = IntCounterVec::new(
            Opts::new(
                "riskguard_breaker_opened_total",
                "Times a circuit breaker entered the open state",
            ),
            &["breaker"],
        )?;
        let latency_avg = GaugeVec::new(
            Opts::new(
                "riskguard_breaker_latency_seconds_avg",
                "Average latency of calls that reached the protected dependency",
            ),
            &["breaker"],
        )?;

        registry.register(Box::new(calls.clone()))?;
        registry.register(Box::new(state.clone()))?;
        registry.register(Box::new(fallbacks.clone()))?;
        registry.register(Box::new(transitions.clone()))?;
        registry.register(Box::new(opened.clone()))?;
        registry.register(Box::new(latency_avg.clone()))?;

        Ok(Self {
            registry,
            calls,
            state,
            fallbacks,
            transitions,
            opened,
            latency_avg,
            render_lock: Mutex::new(()),
        })
    }

    /// Copy the current snapshot of every breaker into the registry.
    /// Callers hold `render_lock`.
    fn collect(&self, breakers: &BreakerRegistry) {
        for breaker in breakers.breakers() {
            let name = breaker.name();
            let metrics = breaker.metrics().snapshot();

            for (outcome, value) in [
                ("success", metrics.successes),
                ("failure", metrics.failures),
                ("rejected", metrics.rejections),
                ("ignored", metrics.ignored_errors),
            ] {
                set_counter(&self.calls, &[name, outcome], value);
            }
            set_counter(&self.fallbacks, &[name], metrics.fallback_invocations);
            set_counter(&self.transitions, &[name], metrics.transition_count);
            set_counter(&self.opened, &[name], metrics.circuit_open_count);

            self.state
                .with_label_values(&[name])
                .set(state_value(breaker.state()));
            self.latency_avg
                .with_label_values(&[name])
                .set(metrics.avg_latency.as_secs_f64());
        }
    }

    /// Collect and encode in the text exposition format
    pub fn render(&self, breakers: &BreakerRegistry) -> Result<String> {
        let families = {
            let _guard = self
                .render_lock
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            self.collect(breakers);
            self.registry.gather()
        };

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| RiskGuardError::Telemetry(prometheus::Error::Msg(e.to_string())))
    }
}

fn set_counter(vec: &IntCounterVec, labels: &[&str], value: u64) {
    let counter = vec.with_label_values(labels);
    counter.reset();
    counter.inc_by(value);
}
