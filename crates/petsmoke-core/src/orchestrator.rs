//! End-to-end run: build, start, wait, check, clean up.
//!
//! ```text
//! Idle → Building → Starting → WaitingReady → Checking → Cleaning → {Passed, Failed}
//! ```
//!
//! Cleaning is entered from every non-terminal stage, including when an
//! interrupt arrives; the stage future is dropped and the supervised server
//! is stopped before the report is returned.

use crate::cli_check::CliCheck;
use crate::command::{CommandOutput, CommandSpec, require_tools};
use crate::error::{Error, FailureClass, Result};
use crate::project::BuildStep;
use crate::readiness::{Clock, HttpProbe, ReadinessPoller, ReadinessResult, TokioClock, status_url};
use crate::smoke::{CheckOutcome, SmokeCheckRunner};
use crate::supervisor::{OutputMode, ProcessSupervisor};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", content = "reason", rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Building,
    Starting,
    WaitingReady,
    Checking,
    Cleaning,
    Passed,
    Failed(FailureClass),
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Passed | Stage::Failed(_))
    }
}

/// Concrete steps for one run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub prerequisites: Vec<String>,
    pub build_steps: Vec<BuildStep>,
    pub server: CommandSpec,
    pub server_output: OutputMode,
    pub base_url: String,
    pub readiness_timeout: Duration,
    pub grace_period: Duration,
    pub smoke: bool,
    pub cli: Option<CliCheck>,
}

/// Everything observed during a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub stage: Stage,
    pub transitions: Vec<Stage>,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub server_command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readiness: Option<ReadinessResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smoke: Option<CheckOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cli: Option<CommandOutput>,
}

impl RunReport {
    fn new(server_command: String) -> Self {
        Self {
            started_at: Utc::now(),
            duration: Duration::ZERO,
            stage: Stage::Idle,
            transitions: vec![Stage::Idle],
            exit_code: 0,
            error: None,
            server_command,
            server_pid: None,
            readiness: None,
            smoke: None,
            cli: None,
        }
    }

    fn transition(&mut self, stage: Stage) {
        if self.stage != stage {
            info!("Stage: {:?} -> {:?}", self.stage, stage);
            self.stage = stage;
            self.transitions.push(stage);
        }
    }

    pub fn passed(&self) -> bool {
        self.stage == Stage::Passed
    }
}

/// Sequences one run and guarantees cleanup of the supervised server.
pub struct Orchestrator<C: Clock = TokioClock> {
    plan: RunPlan,
    supervisor: ProcessSupervisor,
    poller: ReadinessPoller<C>,
}

impl Orchestrator<TokioClock> {
    pub fn new(plan: RunPlan) -> Self {
        Self::with_poller(plan, ReadinessPoller::new(TokioClock))
    }
}

impl<C: Clock> Orchestrator<C> {
    pub fn with_poller(plan: RunPlan, poller: ReadinessPoller<C>) -> Self {
        let supervisor = ProcessSupervisor::new(plan.grace_period, plan.server_output);
        Self {
            plan,
            supervisor,
            poller,
        }
    }

    /// Run until done or until Ctrl-C / SIGTERM.
    pub async fn run(self) -> RunReport {
        self.run_until(shutdown_signal()).await
    }

    /// Run until done or until `interrupt` completes.
    pub async fn run_until<F>(mut self, interrupt: F) -> RunReport
    where
        F: Future<Output = ()>,
    {
        let clock_start = Instant::now();
        let mut report = RunReport::new(self.plan.server.display());

        let result = tokio::select! {
            result = Self::stages(&self.plan, &mut self.supervisor, &self.poller, &mut report) => {
                result
            }
            _ = interrupt => {
                warn!("Interrupted, shutting down...");
                Err(Error::Interrupted)
            }
        };

        // Captured before cleanup moves the stage on
        let failed_during = report.stage;

        report.transition(Stage::Cleaning);
        self.supervisor.stop().await;

        match result {
            Ok(()) => {
                info!("ALL CHECKS PASSED");
                report.transition(Stage::Passed);
                report.exit_code = 0;
            }
            Err(e) => {
                error!("{}", e);
                let class = e.failure_class();
                report.exit_code = self.exit_code_for(&e, failed_during);
                report.error = Some(e.to_string());
                report.transition(Stage::Failed(class));
            }
        }

        report.duration = clock_start.elapsed();
        report
    }

    fn exit_code_for(&self, e: &Error, failed_during: Stage) -> i32 {
        let propagate = self.plan.cli.as_ref().is_some_and(|c| c.propagate_exit_code);
        match e {
            // Only the CLI can fail with an external process error while checking
            Error::ExternalProcess {
                code: Some(code), ..
            } if propagate && failed_during == Stage::Checking && *code != 0 => *code,
            _ => e.failure_class().exit_code(),
        }
    }

    async fn stages(
        plan: &RunPlan,
        supervisor: &mut ProcessSupervisor,
        poller: &ReadinessPoller<C>,
        report: &mut RunReport,
    ) -> Result<()> {
        require_tools(&plan.prerequisites)?;

        if !plan.build_steps.is_empty() {
            report.transition(Stage::Building);
            for step in &plan.build_steps {
                step.run().await?;
            }
        } else {
            info!("Skipping install/build");
        }

        report.transition(Stage::Starting);
        report.server_pid = supervisor.start(&plan.server)?.pid;

        report.transition(Stage::WaitingReady);
        let url = status_url(&plan.base_url);
        let probe = HttpProbe::new(&url)?;
        let readiness = poller.wait(&probe, plan.readiness_timeout).await;
        report.readiness = Some(readiness);
        if !readiness.ready {
            return Err(Error::ReadinessTimeout {
                url,
                waited: readiness.elapsed,
            });
        }

        report.transition(Stage::Checking);
        if plan.smoke {
            let runner = SmokeCheckRunner::new(&plan.base_url)?;
            let mut outcome = CheckOutcome::default();
            let result = runner.run(&mut outcome).await;
            report.smoke = Some(outcome);
            result?;
        }

        if let Some(ref cli) = plan.cli {
            report.cli = Some(cli.run().await?);
        }

        Ok(())
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
