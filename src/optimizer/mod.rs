//! One-shot administrative maintenance: DNS flush, memory purge, and
//! friends, run strictly in order.

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::privilege::{ElevationError, Elevator, ExecError};
use crate::signals::Signals;

/// Default pause after each completed step
pub const STEP_PACING: Duration = Duration::from_millis(500);

const LSREGISTER: &str = "/System/Library/Frameworks/CoreServices.framework/Frameworks/LaunchServices.framework/Support/lsregister";

/// A program run as the current user
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum StepAction {
    /// Shell string run with administrator rights
    Elevated(String),
    /// Programs run in order without elevation
    User(Vec<Invocation>),
}

#[derive(Debug, Clone)]
pub struct MaintenanceStep {
    pub label: String,
    pub action: StepAction,
    /// Failures are swallowed instead of reported
    pub best_effort: bool,
}

impl MaintenanceStep {
    pub fn elevated(label: &str, command: &str) -> Self {
        Self {
            label: label.to_string(),
            action: StepAction::Elevated(command.to_string()),
            best_effort: false,
        }
    }

    pub fn user(label: &str, invocations: Vec<Invocation>) -> Self {
        Self {
            label: label.to_string(),
            action: StepAction::User(invocations),
            best_effort: false,
        }
    }

    pub fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }

    pub fn is_elevated(&self) -> bool {
        matches!(self.action, StepAction::Elevated(_))
    }
}

/// The standard maintenance sequence
pub fn standard_steps() -> Vec<MaintenanceStep> {
    vec![
        MaintenanceStep::elevated(
            "Flushing DNS Cache...",
            "/usr/bin/dscacheutil -flushcache; /usr/bin/killall -HUP mDNSResponder",
        ),
        MaintenanceStep::elevated("Purging Inactive Memory...", "/usr/sbin/purge"),
        MaintenanceStep::user(
            "Rebuilding Launch Services...",
            vec![Invocation::new(
                LSREGISTER,
                &["-kill", "-r", "-domain", "local", "-domain", "system", "-domain", "user"],
            )],
        )
        .best_effort(),
        MaintenanceStep::user(
            "Resetting QuickLook...",
            vec![
                Invocation::new("/usr/bin/qlmanage", &["-r", "cache"]),
                Invocation::new("/usr/bin/qlmanage", &["-r"]),
            ],
        )
        .best_effort(),
        MaintenanceStep::user(
            "Restarting Finder...",
            vec![Invocation::new("/usr/bin/killall", &["Finder"])],
        ),
    ]
}

#[derive(Debug, Error)]
enum StepError {
    #[error("Authorization Required")]
    AuthorizationRequired,
    #[error(transparent)]
    Exec(#[from] ExecError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Done,
    Failed(String),
    Cancelled,
    /// Elevated step held back until a credential is supplied
    AwaitingAuthorization,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub label: String,
    pub status: StepStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceReport {
    pub steps: Vec<StepReport>,
    /// True when privileged steps are waiting for authorization
    pub paused: bool,
}

impl MaintenanceReport {
    pub fn failures(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Failed(_)))
            .count()
    }
}

/// Runs the maintenance sequence one step at a time.
///
/// A step needing authorization pauses every later elevated step;
/// unprivileged steps still run. Any other failure is logged and the
/// sequence moves on.
#[derive(Debug, Clone)]
pub struct MaintenanceStepRunner {
    elevator: Elevator,
    signals: Signals,
    steps: Vec<MaintenanceStep>,
    pacing: Duration,
}

impl MaintenanceStepRunner {
    pub fn new(elevator: Elevator, signals: Signals) -> Self {
        Self {
            elevator,
            signals,
            steps: standard_steps(),
            pacing: STEP_PACING,
        }
    }

    pub fn with_steps(mut self, steps: Vec<MaintenanceStep>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn steps(&self) -> &[MaintenanceStep] {
        &self.steps
    }

    async fn execute(&self, step: &MaintenanceStep) -> Result<(), StepError> {
        match &step.action {
            StepAction::Elevated(command) => match self.elevator.run(command).await {
                Ok(_) => Ok(()),
                Err(ElevationError::AuthorizationRequired) | Err(ElevationError::Rejected(_)) => {
                    Err(StepError::AuthorizationRequired)
                }
                Err(ElevationError::Failed(e)) => Err(e.into()),
            },
            StepAction::User(invocations) => {
                let executor = self.elevator.executor();
                for inv in invocations {
                    let args: Vec<&str> = inv.args.iter().map(String::as_str).collect();
                    match executor.run(&inv.program, &args).await {
                        Ok(_) => {}
                        Err(e) if step.best_effort => {
                            debug!(program = %inv.program, error = %e, "best-effort command failed");
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                Ok(())
            }
        }
    }

    pub async fn run(&self) -> MaintenanceReport {
        self.signals.set_busy(true);
        let mut paused = false;
        let mut reports = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            if paused && step.is_elevated() {
                reports.push(StepReport {
                    label: step.label.clone(),
                    status: StepStatus::AwaitingAuthorization,
                });
                continue;
            }

            self.signals.log(format!("Running: {}", step.label));
            let status = match self.execute(step).await {
                Ok(()) => {
                    tokio::time::sleep(self.pacing).await;
                    StepStatus::Done
                }
                Err(StepError::AuthorizationRequired) => {
                    paused = true;
                    self.signals.log("Waiting for Password...");
                    StepStatus::AwaitingAuthorization
                }
                Err(StepError::Exec(e)) if e.is_user_cancelled() => {
                    self.signals.log("Optimization Cancelled by User");
                    StepStatus::Cancelled
                }
                Err(e) => {
                    warn!(step = %step.label, error = %e, "maintenance step failed");
                    self.signals.log(format!("Error: {}", e.to_string().trim()));
                    StepStatus::Failed(e.to_string())
                }
            };
            reports.push(StepReport {
                label: step.label.clone(),
                status,
            });
        }

        self.signals.log(if paused {
            "Waiting for Password..."
        } else {
            "Optimization Complete"
        });
        self.signals.set_busy(false);

        let report = MaintenanceReport {
            steps: reports,
            paused,
        };
        info!(
            steps = report.steps.len(),
            failures = report.failures(),
            paused,
            "maintenance finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_sequence_order() {
        let steps = standard_steps();
        let labels: Vec<_> = steps.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Flushing DNS Cache...",
                "Purging Inactive Memory...",
                "Rebuilding Launch Services...",
                "Resetting QuickLook...",
                "Restarting Finder...",
            ]
        );
        assert!(steps[0].is_elevated());
        assert!(steps[1].is_elevated());
        assert!(steps[2..].iter().all(|s| !s.is_elevated()));
        assert!(steps[2].best_effort && steps[3].best_effort);
        assert!(!steps[4].best_effort);
    }

    fn runner(tmp: &tempfile::TempDir, steps: Vec<MaintenanceStep>) -> (MaintenanceStepRunner, Signals) {
        let store = crate::privilege::CredentialStore::new(tmp.path().join(".key"), false);
        let elevator = Elevator::new(crate::privilege::Executor::default(), store);
        let signals = Signals::new();
        let runner = MaintenanceStepRunner::new(elevator, signals.clone())
            .with_steps(steps)
            .with_pacing(Duration::ZERO);
        (runner, signals)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failures_do_not_stop_the_sequence() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (runner, signals) = runner(
            &tmp,
            vec![
                MaintenanceStep::user("Broken", vec![Invocation::new("false", &[])]),
                MaintenanceStep::user("Optional", vec![Invocation::new("false", &[])]).best_effort(),
                MaintenanceStep::user("Fine", vec![Invocation::new("true", &[])]),
            ],
        );

        let report = runner.run().await;
        assert!(!report.paused);
        assert!(matches!(report.steps[0].status, StepStatus::Failed(_)));
        assert_eq!(report.steps[1].status, StepStatus::Done);
        assert_eq!(report.steps[2].status, StepStatus::Done);
        assert_eq!(report.failures(), 1);
        assert_eq!(signals.last_log(), "Optimization Complete");
        assert!(!signals.is_busy());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_credential_pauses_elevated_steps() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (runner, signals) = runner(
            &tmp,
            vec![
                MaintenanceStep::elevated("First", "true"),
                MaintenanceStep::user("Plain", vec![Invocation::new("true", &[])]),
                MaintenanceStep::elevated("Second", "true"),
            ],
        );

        let report = runner.run().await;
        assert!(report.paused);
        assert_eq!(report.steps[0].status, StepStatus::AwaitingAuthorization);
        assert_eq!(report.steps[1].status, StepStatus::Done);
        assert_eq!(report.steps[2].status, StepStatus::AwaitingAuthorization);
        assert_eq!(signals.last_log(), "Waiting for Password...");
        assert!(runner.elevator.credentials().needs_authorization());
    }
}
