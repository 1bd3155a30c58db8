/*!
 * RiskGuard CLI Style System
 *
 * Tables and themed text for the operator commands.
 */

use crate::protected::{ProtectedCallResult, ServiceHealth, Source};
use crate::scoring::RiskScore;
use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use console::{style, StyledObject};
use riskguard_core_resilience::{BreakerOverview, CircuitState, HealthStatus, MetricsSnapshot};
use std::time::Duration;

/// Brand colors for consistent styling
pub struct Theme;

impl Theme {
    /// Primary accent color (cyan/blue)
    pub fn primary<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).cyan()
    }

    pub fn success<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).green()
    }

    pub fn warning<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).yellow()
    }

    pub fn error<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).red()
    }

    /// Muted/secondary text (dim)
    pub fn muted<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).dim()
    }

    /// Header style (bold cyan)
    pub fn header<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).cyan().bold()
    }
}

/// Unicode icons for visual feedback
pub struct Icons;

impl Icons {
    pub const SUCCESS: &'static str = "✓";
    pub const ERROR: &'static str = "✗";
    pub const WARNING: &'static str = "⚠";
    pub const INFO: &'static str = "ℹ";
    pub const ARROW_RIGHT: &'static str = "→";
}

/// Draw a section header with a line
pub fn section_header(title: &str) {
    let line_len = 50 - title.len().min(40);
    println!(
        "\n{} {}",
        Theme::header(title),
        Theme::muted("─".repeat(line_len))
    );
}

/// Create a styled data table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Create a minimal table (no outer borders)
pub fn create_minimal_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_NO_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Create a key-value table for stats
pub fn stats_table(items: &[(&str, String)]) -> Table {
    let mut table = create_minimal_table();

    for (key, value) in items {
        table.add_row(vec![
            Cell::new(key).fg(Color::Cyan),
            Cell::new(value)
                .fg(Color::White)
                .add_attribute(Attribute::Bold),
        ]);
    }

    table
}

fn state_color(state: CircuitState) -> Color {
    match state {
        CircuitState::Closed => Color::Green,
        CircuitState::HalfOpen => Color::Yellow,
        CircuitState::Open => Color::Red,
    }
}

fn health_color(status: HealthStatus) -> Color {
    match status {
        HealthStatus::Excellent | HealthStatus::Good => Color::Green,
        HealthStatus::Degraded => Color::Yellow,
        HealthStatus::Poor | HealthStatus::Critical => Color::Red,
    }
}

/// One row per registered breaker
pub fn breaker_table(overview: &BreakerOverview) -> Table {
    let mut table = create_table();
    table.set_header(vec![
        Cell::new("Breaker").add_attribute(Attribute::Bold),
        Cell::new("State").add_attribute(Attribute::Bold),
        Cell::new("Calls").add_attribute(Attribute::Bold),
        Cell::new("Failures").add_attribute(Attribute::Bold),
        Cell::new("Rejected").add_attribute(Attribute::Bold),
        Cell::new("Fallbacks").add_attribute(Attribute::Bold),
        Cell::new("Avg latency").add_attribute(Attribute::Bold),
        Cell::new("Health").add_attribute(Attribute::Bold),
    ]);

    for status in &overview.breakers {
        let metrics = &status.metrics;
        table.add_row(vec![
            Cell::new(&status.snapshot.name).fg(Color::Cyan),
            Cell::new(status.snapshot.state).fg(state_color(status.snapshot.state)),
            Cell::new(metrics.total_calls),
            Cell::new(metrics.failures),
            Cell::new(metrics.rejections),
            Cell::new(metrics.fallback_invocations),
            Cell::new(format_duration(metrics.avg_latency)),
            Cell::new(format!("{:.1} ({})", status.health.score, status.health.status))
                .fg(health_color(status.health.status)),
        ]);
    }

    table
}

/// Service counters, health score and recommendations
pub fn service_health_table(health: &ServiceHealth) -> Table {
    let stats = &health.stats;
    let mut table = stats_table(&[
        ("Breaker state", health.breaker.state.to_string()),
        ("Total predictions", stats.total_predictions.to_string()),
        ("Model predictions", stats.model_predictions.to_string()),
        ("Fallback predictions", stats.fallback_predictions.to_string()),
        ("Fallback rate", format!("{:.1}%", stats.fallback_rate() * 100.0)),
        ("Avg response time", format_duration(stats.avg_response_time)),
        (
            "Health",
            format!("{:.1} ({})", health.report.score, health.report.status),
        ),
    ]);

    for recommendation in &health.report.recommendations {
        table.add_row(vec![
            Cell::new(Icons::ARROW_RIGHT).fg(Color::DarkGrey),
            Cell::new(recommendation).fg(health_color(health.report.status)),
        ]);
    }

    table
}

/// Counters of a single breaker
pub fn metrics_table(metrics: &MetricsSnapshot) -> Table {
    stats_table(&[
        ("Total calls", metrics.total_calls.to_string()),
        ("Successes", metrics.successes.to_string()),
        ("Failures", metrics.failures.to_string()),
        ("Rejections", metrics.rejections.to_string()),
        ("Ignored errors", metrics.ignored_errors.to_string()),
        ("Fallbacks", metrics.fallback_invocations.to_string()),
        ("Times opened", metrics.circuit_open_count.to_string()),
        (
            "Recent failure rate",
            format!("{:.1}%", metrics.recent_failure_rate * 100.0),
        ),
        ("Avg latency", format_duration(metrics.avg_latency)),
    ])
}

/// One-line description of a protected call
pub fn describe_result(result: &ProtectedCallResult<RiskScore>) -> String {
    let source = match result.source {
        Source::Primary => Theme::success("PRIMARY").to_string(),
        Source::Fallback => Theme::warning("FALLBACK").to_string(),
    };
    let reason = result
        .fallback_reason
        .map(|r| format!(" ({:?})", r))
        .unwrap_or_default();

    format!(
        "score {} via {}{} [{}] breaker {} in {}",
        result.value,
        source,
        reason,
        result.model_version,
        result.breaker_state_at_completion,
        format_duration(result.latency)
    )
}

/// Format a duration compactly
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = (secs / 60.0).floor();
        let remaining = secs % 60.0;
        format!("{}m {:.0}s", mins, remaining)
    }
}

/// Print a styled error message with optional suggestion
pub fn print_error(message: &str, suggestion: Option<&str>) {
    eprintln!(
        "\n{} {}",
        Theme::error(format!("{} Error:", Icons::ERROR)),
        message
    );

    if let Some(hint) = suggestion {
        eprintln!(
            "  {} {}",
            Theme::muted(Icons::ARROW_RIGHT),
            Theme::muted(hint)
        );
    }
    eprintln!();
}

/// Print a styled warning message
pub fn print_warning(message: &str) {
    eprintln!(
        "{} {}",
        Theme::warning(Icons::WARNING.to_string()),
        Theme::warning(message)
    );
}

/// Print a styled success message
pub fn print_success(message: &str) {
    println!(
        "{} {}",
        Theme::success(Icons::SUCCESS.to_string()),
        Theme::success(message)
    );
}

/// Print a styled info message
pub fn print_info(message: &str) {
    println!("{} {}", Theme::primary(Icons::INFO.to_string()), message);
}
