//! Task execution.
//!
//! Series children are awaited one after another; parallel children are
//! joined. Stage and clean steps are blocking work and run on the blocking
//! pool. Serve and watch steps start background services and return at once;
//! their handles are handed back to the caller.

use crate::build::{
    clean, reporter, BuildContext, FileFailure, RunReport, StageReport, Step, TaskError, TaskKind,
    TaskRegistry,
};
use crate::config::Category;
use crate::serve::{self, ReloadHub, ServeError};
use crate::stages;
use crate::watch::{self, WatchError};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

/// Fatal error while running tasks.
///
/// Per-file failures never end up here; they are part of the [`RunReport`].
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The request does not resolve to a valid task graph
    #[error(transparent)]
    Task(#[from] TaskError),
    /// The dev server could not start
    #[error(transparent)]
    Serve(#[from] ServeError),
    /// The watcher could not start
    #[error(transparent)]
    Watch(#[from] WatchError),
}

/// A background service started by a task.
#[derive(Debug)]
pub struct Service {
    /// Task that started it
    pub name: String,
    /// Bound address, for the dev server
    pub addr: Option<SocketAddr>,
    /// Service task
    pub handle: JoinHandle<()>,
}

/// Result of a task run: the report plus any services still running.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub report: RunReport,
    pub services: Vec<Service>,
}

impl RunOutcome {
    fn merge(&mut self, other: RunOutcome) {
        self.report.extend(other.report);
        self.services.extend(other.services);
    }

    /// Stop every background service.
    pub fn shutdown(&self) {
        for service in &self.services {
            service.handle.abort();
        }
    }
}

/// Run a stage on the blocking pool. A panic becomes a failure in the report.
pub async fn run_stage_blocking(ctx: Arc<BuildContext>, category: Category) -> StageReport {
    let joined = tokio::task::spawn_blocking(move || stages::run_stage(&ctx, category)).await;
    joined.unwrap_or_else(|e| panicked(category.task_name(), e))
}

/// Run a clean scope on the blocking pool.
pub async fn run_clean_blocking(ctx: Arc<BuildContext>, scope: clean::CleanScope) -> StageReport {
    let joined = tokio::task::spawn_blocking(move || clean::clean(&ctx, scope)).await;
    joined.unwrap_or_else(|e| panicked(scope.task_name(), e))
}

fn panicked(stage: &str, error: tokio::task::JoinError) -> StageReport {
    let mut report = StageReport::new(stage);
    report.add_failure(FileFailure::new(None::<PathBuf>, "run", error.to_string()));
    report
}

/// Runs named tasks from a registry against one build context.
#[derive(Debug, Clone)]
pub struct Executor {
    ctx: Arc<BuildContext>,
    registry: Arc<TaskRegistry>,
}

impl Executor {
    /// Create an executor.
    pub fn new(ctx: Arc<BuildContext>, registry: TaskRegistry) -> Self {
        Self { ctx, registry: Arc::new(registry) }
    }

    /// Get the build context.
    pub fn context(&self) -> &Arc<BuildContext> {
        &self.ctx
    }

    /// Get the task registry.
    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Run `names` in order, after checking the whole request.
    ///
    /// Unknown names and cycles are rejected before anything runs.
    pub async fn run(&self, names: &[String]) -> Result<RunOutcome, ExecuteError> {
        self.registry.resolve(names)?;

        let start = Instant::now();
        let mut outcome = RunOutcome::default();
        for name in names {
            match self.run_task(name.clone()).await {
                Ok(child) => outcome.merge(child),
                Err(e) => {
                    outcome.shutdown();
                    return Err(e);
                }
            }
        }

        outcome.report.tasks = names.to_vec();
        outcome.report.total_duration = start.elapsed();
        Ok(outcome)
    }

    fn run_task(&self, name: String) -> BoxFuture<'_, Result<RunOutcome, ExecuteError>> {
        async move {
            let task = self.registry.get(&name)?;
            match &task.kind {
                TaskKind::Step(step) => self.run_step(&name, *step).await,
                TaskKind::Series(children) => {
                    let mut outcome = RunOutcome::default();
                    for child in children {
                        match self.run_task(child.clone()).await {
                            Ok(child) => outcome.merge(child),
                            Err(e) => {
                                outcome.shutdown();
                                return Err(e);
                            }
                        }
                    }
                    Ok(outcome)
                }
                TaskKind::Parallel(children) => {
                    let results =
                        join_all(children.iter().map(|c| self.run_task(c.clone()))).await;
                    let mut outcome = RunOutcome::default();
                    let mut error = None;
                    for result in results {
                        match result {
                            Ok(child) => outcome.merge(child),
                            Err(e) => error = error.or(Some(e)),
                        }
                    }
                    match error {
                        Some(e) => {
                            outcome.shutdown();
                            Err(e)
                        }
                        None => Ok(outcome),
                    }
                }
            }
        }
        .boxed()
    }

    async fn run_step(&self, name: &str, step: Step) -> Result<RunOutcome, ExecuteError> {
        let mut outcome = RunOutcome::default();
        match step {
            Step::Clean(scope) => {
                info!("Starting '{}'...", name);
                let mut report = run_clean_blocking(self.ctx.clone(), scope).await;
                report.stage = name.to_string();
                reporter::report_stage(&report);
                outcome.report.add_stage(report);
            }
            Step::Stage(category) => {
                let mut report = run_stage_blocking(self.ctx.clone(), category).await;
                report.stage = name.to_string();
                reporter::report_stage(&report);
                outcome.report.add_stage(report);
            }
            Step::Serve => {
                let server = serve::start(&self.ctx, ReloadHub::new()).await?;
                let watcher = match watch::spawn(self.ctx.clone(), Some(server.hub.clone())) {
                    Ok(handle) => handle,
                    Err(e) => {
                        server.handle.abort();
                        return Err(e.into());
                    }
                };
                outcome.services.push(Service {
                    name: name.to_string(),
                    addr: Some(server.addr),
                    handle: server.handle,
                });
                outcome.services.push(Service {
                    name: format!("{}:watch", name),
                    addr: None,
                    handle: watcher,
                });
            }
            Step::Watch => {
                let handle = watch::spawn(self.ctx.clone(), None)?;
                outcome.services.push(Service { name: name.to_string(), addr: None, handle });
            }
        }
        Ok(outcome)
    }
}
