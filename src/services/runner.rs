use crate::domain::constants::DEADLINE_NOTE;
use crate::domain::errors::CheckError;
use crate::domain::models::{CheckOutcome, ConformanceReport, OutcomeKind};
use crate::services::client::TrqpClient;
use crate::services::config::RunConfig;
use crate::services::registry::{gate, CheckContext, GateDecision, Registry, RequirementCheck};
use crate::services::report::{write_report, ReportAggregator};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub jobs: usize,
    pub deadline: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            deadline: None,
        }
    }
}

fn outcome_for(
    check: &RequirementCheck,
    registry: &Registry,
    kind: OutcomeKind,
    duration: Duration,
    notes: Option<String>,
) -> CheckOutcome {
    CheckOutcome {
        check_id: check.id.to_string(),
        name: check.name.to_string(),
        outcome: kind,
        duration_seconds: duration.as_secs_f64(),
        requirement_ids: registry.requirements_for(check.id).to_vec(),
        notes,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

/// Runs one check through the gate. Always yields exactly one outcome; a
/// panicking check is reported as ERROR.
pub fn execute(
    check: &RequirementCheck,
    ctx: &CheckContext<'_>,
    registry: &Registry,
) -> CheckOutcome {
    if let GateDecision::Skip(note) = gate(check, ctx.settings.gating_level()) {
        info!(check = check.id, outcome = %OutcomeKind::Skip, "gated");
        return outcome_for(check, registry, OutcomeKind::Skip, Duration::ZERO, Some(note));
    }

    let started = Instant::now();
    let result = catch_unwind(AssertUnwindSafe(|| (check.run)(ctx)));
    let elapsed = started.elapsed();
    let (kind, notes) = match result {
        Ok(Ok(note)) => (OutcomeKind::Pass, note),
        Ok(Err(err)) => {
            if matches!(err, CheckError::Precondition(_)) {
                warn!(check = check.id, reason = %err, "precondition not met");
            }
            (err.outcome(), Some(err.to_string()))
        }
        Err(payload) => (
            OutcomeKind::Error,
            Some(format!("check panicked: {}", panic_message(payload.as_ref()))),
        ),
    };
    info!(
        check = check.id,
        outcome = %kind,
        elapsed_ms = elapsed.as_millis() as u64,
        "check finished"
    );
    outcome_for(check, registry, kind, elapsed, notes)
}

/// Walks the registry, recording one outcome per check. Non-exclusive checks
/// run in order, or on `jobs` scoped workers; exclusive checks always run
/// afterwards on the calling thread.
pub fn run_suite(
    registry: &Registry,
    ctx: &CheckContext<'_>,
    options: RunOptions,
    aggregator: &ReportAggregator<'_>,
) {
    let started = Instant::now();
    let run_or_expire = |check: &RequirementCheck| {
        let expired = options
            .deadline
            .map(|d| started.elapsed() >= d)
            .unwrap_or(false);
        if expired {
            warn!(check = check.id, "skipped after run deadline");
            outcome_for(
                check,
                registry,
                OutcomeKind::Skip,
                Duration::ZERO,
                Some(DEADLINE_NOTE.to_string()),
            )
        } else {
            execute(check, ctx, registry)
        }
    };

    // Exclusive checks may leave the SUT throttled, so they go last in
    // both modes.
    let (shared, exclusive): (Vec<&RequirementCheck>, Vec<&RequirementCheck>) =
        registry.checks().iter().partition(|c| !c.exclusive);

    if options.jobs <= 1 {
        for check in shared {
            aggregator.record(run_or_expire(check));
        }
    } else {
        let cursor = AtomicUsize::new(0);
        let workers = options.jobs.min(shared.len());
        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    let Some(check) = shared.get(index).copied() else {
                        break;
                    };
                    aggregator.record(run_or_expire(check));
                });
            }
        });
    }
    for check in exclusive {
        aggregator.record(run_or_expire(check));
    }
}

/// Full run: build the client, execute the standard suite, persist the
/// report when a path is configured.
pub fn run_conformance(config: &RunConfig) -> anyhow::Result<ConformanceReport> {
    let registry = Registry::standard()?;
    let client = TrqpClient::new(config.client.clone())?;
    let ctx = CheckContext {
        client: &client,
        settings: &config.suite,
    };
    info!(
        base_url = client.base_url(),
        level = %config.suite.gating_level(),
        checks = registry.len(),
        jobs = config.jobs,
        "starting conformance run"
    );
    let aggregator = ReportAggregator::new(&registry);
    run_suite(
        &registry,
        &ctx,
        RunOptions {
            jobs: config.jobs,
            deadline: config.deadline,
        },
        &aggregator,
    );
    let report = aggregator.finalize(config.target());
    if let Some(path) = write_report(&report, config.report_path.as_deref())? {
        info!(path = %path.display(), "report written");
    }
    Ok(report)
}
