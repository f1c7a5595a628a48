//! Task definitions and the task registry.
//!
//! A task is either a single unit of work (a [`Step`]) or a composition of
//! other tasks, run in series or in parallel. The registry resolves a request
//! into a checked task graph before anything runs.

use crate::build::CleanScope;
use crate::config::Category;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// A single unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Remove generated output
    Clean(CleanScope),
    /// Run one category's stage
    Stage(Category),
    /// Start the dev server and the watchers with live reload
    Serve,
    /// Start the watchers without a server
    Watch,
}

impl Step {
    /// Whether this step keeps running after it returns.
    pub fn is_service(&self) -> bool {
        matches!(self, Step::Serve | Step::Watch)
    }
}

/// How a task does its work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    /// A single step
    Step(Step),
    /// Children run one after another; each completes before the next starts
    Series(Vec<String>),
    /// Children run concurrently with no ordering among them
    Parallel(Vec<String>),
}

/// A named task.
#[derive(Debug, Clone)]
pub struct Task {
    /// Unique task name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// What the task does
    pub kind: TaskKind,
}

impl Task {
    /// Create a single-step task.
    pub fn step(name: &str, description: &str, step: Step) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind: TaskKind::Step(step),
        }
    }

    /// Create a series task.
    pub fn series(name: &str, description: &str, children: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind: TaskKind::Series(children.iter().map(|c| c.to_string()).collect()),
        }
    }

    /// Create a parallel task.
    pub fn parallel(name: &str, description: &str, children: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind: TaskKind::Parallel(children.iter().map(|c| c.to_string()).collect()),
        }
    }

    /// Names of the tasks this task refers to.
    pub fn dependencies(&self) -> &[String] {
        match &self.kind {
            TaskKind::Step(_) => &[],
            TaskKind::Series(children) | TaskKind::Parallel(children) => children,
        }
    }
}

/// Error while registering or resolving tasks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    /// A task name was registered twice
    #[error("Task '{0}' is already registered")]
    Duplicate(String),
    /// A requested or referenced task does not exist
    #[error("Unknown task '{0}'")]
    Unknown(String),
    /// A task refers back to itself through its children
    #[error("Circular dependency detected involving task '{0}'")]
    CyclicDependency(String),
}

/// The set of known tasks, keyed by name.
#[derive(Debug, Default, Clone)]
pub struct TaskRegistry {
    tasks: BTreeMap<String, Task>,
}

/// Name of the task run when none is requested.
pub const DEFAULT_TASK: &str = "default";

impl TaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every stage, clean scope and the two pipelines.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        let tasks = [
            Task::step(
                "clean",
                "Remove partials, stylesheets, HTML and bundles from the output",
                Step::Clean(CleanScope::Selective),
            ),
            Task::step(
                "cleanImages",
                "Remove the images destination",
                Step::Clean(CleanScope::Images),
            ),
            Task::step("cleanAll", "Remove the entire output root", Step::Clean(CleanScope::All)),
            Task::step("styles", "Prefix, minify and merge CSS", Step::Stage(Category::Styles)),
            Task::step(
                "sassStyles",
                "Compile Sass, then prefix and minify",
                Step::Stage(Category::SassStyles),
            ),
            Task::step(
                "scripts",
                "Lower, minify and bundle JavaScript",
                Step::Stage(Category::Scripts),
            ),
            Task::step("images", "Recompress images", Step::Stage(Category::Images)),
            Task::step("templates", "Render templates to HTML", Step::Stage(Category::Templates)),
            Task::step("serveEjs", "Alias of templates", Step::Stage(Category::Templates)),
            Task::step(
                "serve",
                "Serve the output root with live reload and watch sources",
                Step::Serve,
            ),
            Task::step("watch", "Watch sources and rebuild on change", Step::Watch),
            Task::parallel(
                "compile",
                "Run every text stage and the dev server concurrently",
                &["styles", "sassStyles", "scripts", "templates", "serve"],
            ),
            Task::series(
                DEFAULT_TASK,
                "Selective clean, then compile and serve",
                &["clean", "compile"],
            ),
            Task::series(
                "build",
                "Full clean, images, then compile and serve",
                &["cleanAll", "images", "compile"],
            ),
        ];

        for task in tasks {
            // Names above are distinct.
            let _ = registry.register(task);
        }
        registry
    }

    /// Register a task. Names must be unique.
    pub fn register(&mut self, task: Task) -> Result<(), TaskError> {
        if self.tasks.contains_key(&task.name) {
            return Err(TaskError::Duplicate(task.name));
        }
        self.tasks.insert(task.name.clone(), task);
        Ok(())
    }

    /// Look up a task by name.
    pub fn get(&self, name: &str) -> Result<&Task, TaskError> {
        self.tasks.get(name).ok_or_else(|| TaskError::Unknown(name.to_string()))
    }

    /// All tasks, sorted by name.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Get the number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Check a request and return every task it reaches, dependencies first.
    ///
    /// Fails on unknown names and cycles before anything is run.
    pub fn resolve(&self, names: &[String]) -> Result<Vec<&Task>, TaskError> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();

        for name in names {
            let task = self.get(name)?;
            self.visit_task(task, &mut visited, &mut visiting, &mut result)?;
        }

        Ok(result)
    }

    fn visit_task<'a>(
        &'a self,
        task: &'a Task,
        visited: &mut HashSet<&'a str>,
        visiting: &mut HashSet<&'a str>,
        result: &mut Vec<&'a Task>,
    ) -> Result<(), TaskError> {
        if visited.contains(task.name.as_str()) {
            return Ok(());
        }

        if visiting.contains(task.name.as_str()) {
            return Err(TaskError::CyclicDependency(task.name.clone()));
        }

        visiting.insert(&task.name);

        for dep in task.dependencies() {
            let dep = self.get(dep)?;
            self.visit_task(dep, visited, visiting, result)?;
        }

        visiting.remove(task.name.as_str());
        visited.insert(&task.name);
        result.push(task);

        Ok(())
    }
}
