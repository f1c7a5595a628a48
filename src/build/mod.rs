//! Build orchestration for assetflow
//!
//! Turns named tasks into stage runs over the configured path table.
//!
//! # Overview
//!
//! The build layer consists of:
//! - **Discovery**: Expand a category's source glob into files
//! - **Tasks**: A registry of named steps, series and parallel groups
//! - **Execution**: Resolve a request, run the stages, collect reports
//!
//! # Example
//!
//! ```ignore
//! use assetflow::build::{BuildContext, Executor, TaskRegistry};
//! use assetflow::config::load_config;
//!
//! let config = load_config(None)?;
//! let context = Arc::new(BuildContext::new(config, project_root));
//! let executor = Executor::new(context, TaskRegistry::standard());
//!
//! let outcome = executor.run(&["build".to_string()]).await?;
//! println!("{}", outcome.report.summary());
//! ```

pub mod clean;
pub mod context;
pub mod discovery;
pub mod executor;
pub mod reporter;
pub mod result;
pub mod task;

pub use clean::CleanScope;
pub use context::*;
pub use discovery::*;
pub use executor::{ExecuteError, Executor, RunOutcome, Service};
pub use result::*;
pub use task::*;
