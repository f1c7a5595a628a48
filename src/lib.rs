//! Assetflow - declarative asset pipelines
//!
//! This library provides functionality to:
//! - Map asset categories to source globs and destination directories
//! - Compile, prefix and minify styles, Sass and scripts
//! - Recompress images and render templates
//! - Compose stages into named tasks and run them
//! - Serve the output with live reload and rebuild on change

pub mod build;
pub mod cli;
pub mod config;
pub mod logging;
pub mod serve;
pub mod stages;
pub mod watch;
