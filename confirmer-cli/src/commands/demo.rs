//! Demonstration scenarios.
//!
//! Each scenario submits a small burst of simulated confirmations to a fresh
//! coordinator, waits for it to go idle, prints the callback trace and
//! checks the trace against what the coordinator guarantees.

use clap::ValueEnum;
use confirmer::coordinator::{
    ConfirmationFailure, ConfirmationOptions, ConfirmationRequest, Coordinator, CoordinatorStats,
};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Upper bound on how long any scenario may take to go idle.
const SCENARIO_DEADLINE: Duration = Duration::from_secs(10);

/// Timeout used by the timeout scenario.
const DEMO_TIMEOUT: Duration = Duration::from_millis(100);

type DemoCoordinator = Coordinator<String, u64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Two chained serial confirmations on one key
    Serial,
    /// Four parallel confirmations started together
    Parallel,
    /// Four squashable confirmations collapsed to first and last
    Squash,
    /// Two confirmations where only the last success is reported
    LastWins,
    /// A fast and a slow confirmation racing a timeout
    Timeout,
    /// Every scenario in turn
    All,
}

impl Scenario {
    fn name(self) -> &'static str {
        match self {
            Scenario::Serial => "serial",
            Scenario::Parallel => "parallel",
            Scenario::Squash => "squash",
            Scenario::LastWins => "last-wins",
            Scenario::Timeout => "timeout",
            Scenario::All => "all",
        }
    }

    fn expand(self) -> Vec<Scenario> {
        match self {
            Scenario::All => vec![
                Scenario::Serial,
                Scenario::Parallel,
                Scenario::Squash,
                Scenario::LastWins,
                Scenario::Timeout,
            ],
            single => vec![single],
        }
    }
}

/// Run one scenario, or all of them.
pub async fn run(config_path: Option<&Path>, scenario: Scenario) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path)?;
    println!("Using configuration: {}", runner.config_path().display());

    for scenario in scenario.expand() {
        println!();
        println!("== {} ==", scenario.name());

        let coordinator = runner.create_coordinator::<u64>()?;
        let trace = Trace::default();
        let shutdown = CancellationToken::new();
        let watchdog = coordinator.spawn_watchdog(shutdown.clone());

        let outcome = match scenario {
            Scenario::Serial => run_serial(&coordinator, &trace).await,
            Scenario::Parallel => run_parallel(&coordinator, &trace).await,
            Scenario::Squash => run_squash(&coordinator, &trace).await,
            Scenario::LastWins => run_last_wins(&coordinator, &trace).await,
            Scenario::Timeout => run_timeout(&coordinator, &trace).await,
            Scenario::All => Ok(()),
        };

        shutdown.cancel();
        let _ = watchdog.await;

        print_stats(&coordinator.stats());
        outcome?;
    }

    Ok(())
}

// =============================================================================
// Scenarios
// =============================================================================

async fn run_serial(coordinator: &DemoCoordinator, trace: &Trace) -> Result<(), CliError> {
    let key = "111".to_string();

    coordinator.submit(
        key.clone(),
        ConfirmationRequest::new(
            |_: Option<u64>| async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok::<u64, String>(1)
            },
            trace.on_success(&key),
        ),
    );
    coordinator.submit(
        key.clone(),
        ConfirmationRequest::new(
            |input: Option<u64>| async move {
                input.map(|n| n + 1).ok_or("no previous result")
            },
            trace.on_success(&key),
        )
        .with_result_selector(|previous| previous * 10),
    );

    settle(Scenario::Serial, coordinator).await?;
    trace.expect(Scenario::Serial, &["111: success 1", "111: success 11"])
}

async fn run_parallel(coordinator: &DemoCoordinator, trace: &Trace) -> Result<(), CliError> {
    let key = "222".to_string();
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    for value in 1..=4u64 {
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        coordinator.submit(
            key.clone(),
            ConfirmationRequest::new(
                move |_: Option<u64>| async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<u64, String>(value)
                },
                trace.on_success(&key),
            )
            .with_options(ConfirmationOptions::default().parallelizable()),
        );
    }

    settle(Scenario::Parallel, coordinator).await?;

    let peak = peak.load(Ordering::SeqCst);
    println!("  peak concurrency: {}", peak);
    if peak != 4 {
        return Err(scenario_error(
            Scenario::Parallel,
            format!("expected 4 confirmations in flight together, saw {}", peak),
        ));
    }

    trace.expect_unordered(
        Scenario::Parallel,
        &[
            "222: success 1",
            "222: success 2",
            "222: success 3",
            "222: success 4",
        ],
    )
}

async fn run_squash(coordinator: &DemoCoordinator, trace: &Trace) -> Result<(), CliError> {
    let key = "333".to_string();

    for value in 11..=14u64 {
        coordinator.submit(
            key.clone(),
            ConfirmationRequest::new(
                move |_: Option<u64>| async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<u64, String>(value)
                },
                trace.on_success(&key),
            )
            .with_options(
                ConfirmationOptions::default()
                    .with_operation_id("follow")
                    .squashable(),
            ),
        );
    }

    settle(Scenario::Squash, coordinator).await?;
    trace.expect(Scenario::Squash, &["333: success 11", "333: success 14"])
}

async fn run_last_wins(coordinator: &DemoCoordinator, trace: &Trace) -> Result<(), CliError> {
    let key = "444".to_string();

    for value in 11..=12u64 {
        coordinator.submit(
            key.clone(),
            ConfirmationRequest::new(
                move |_: Option<u64>| async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok::<u64, String>(value)
                },
                trace.on_success(&key),
            )
            .with_options(
                ConfirmationOptions::default()
                    .with_operation_id("sync")
                    .use_only_last_success_call(),
            ),
        );
    }

    settle(Scenario::LastWins, coordinator).await?;
    trace.expect(Scenario::LastWins, &["444: success 12"])
}

async fn run_timeout(coordinator: &DemoCoordinator, trace: &Trace) -> Result<(), CliError> {
    for (key, delay_ms, value) in [("fast", 10u64, 1u64), ("slow", 200, 2)] {
        let key = key.to_string();
        coordinator.submit(
            key.clone(),
            ConfirmationRequest::new(
                move |_: Option<u64>| async move {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    Ok::<u64, String>(value)
                },
                trace.on_success(&key),
            )
            .with_on_fail(trace.on_fail(&key))
            .with_timeout(DEMO_TIMEOUT),
        );
    }

    settle(Scenario::Timeout, coordinator).await?;

    // Outlive the slow operation to show it never calls back late.
    tokio::time::sleep(Duration::from_millis(250)).await;

    trace.expect_unordered(
        Scenario::Timeout,
        &["fast: success 1", "slow: failed (confirmation timed out)"],
    )
}

// =============================================================================
// Helpers
// =============================================================================

/// Shared, ordered record of callback invocations.
#[derive(Clone, Default)]
struct Trace {
    lines: Arc<Mutex<Vec<String>>>,
}

impl Trace {
    fn record(&self, line: String) {
        println!("  {}", line);
        self.lines.lock().push(line);
    }

    fn on_success(&self, key: &str) -> impl FnOnce(u64) + Send + 'static {
        let trace = self.clone();
        let key = key.to_string();
        move |value: u64| trace.record(format!("{}: success {}", key, value))
    }

    fn on_fail(&self, key: &str) -> impl FnOnce(ConfirmationFailure) + Send + 'static {
        let trace = self.clone();
        let key = key.to_string();
        move |failure: ConfirmationFailure| trace.record(format!("{}: failed ({})", key, failure))
    }

    fn snapshot(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    fn expect(&self, scenario: Scenario, expected: &[&str]) -> Result<(), CliError> {
        let actual = self.snapshot();
        if actual == expected {
            return Ok(());
        }
        Err(scenario_error(
            scenario,
            format!("expected callbacks {:?}, got {:?}", expected, actual),
        ))
    }

    fn expect_unordered(&self, scenario: Scenario, expected: &[&str]) -> Result<(), CliError> {
        let mut actual = self.snapshot();
        actual.sort();
        let mut expected: Vec<&str> = expected.to_vec();
        expected.sort_unstable();
        if actual == expected {
            return Ok(());
        }
        Err(scenario_error(
            scenario,
            format!("expected callbacks {:?}, got {:?}", expected, actual),
        ))
    }
}

/// Wait for the coordinator to drain every group.
async fn settle(scenario: Scenario, coordinator: &DemoCoordinator) -> Result<(), CliError> {
    tokio::time::timeout(SCENARIO_DEADLINE, coordinator.wait_idle())
        .await
        .map_err(|_| {
            scenario_error(
                scenario,
                format!("coordinator still busy after {:?}", SCENARIO_DEADLINE),
            )
        })
}

fn scenario_error(scenario: Scenario, reason: String) -> CliError {
    CliError::Scenario {
        name: scenario.name().to_string(),
        reason,
    }
}

fn print_stats(stats: &CoordinatorStats) {
    println!(
        "  stats: submitted={} executed={} succeeded={} failed={} timed_out={} squashed={} superseded={} deferred={}",
        stats.submitted,
        stats.executed,
        stats.succeeded,
        stats.failed,
        stats.timed_out,
        stats.squashed,
        stats.superseded,
        stats.deferred_delivered,
    );
}
