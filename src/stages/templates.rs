//! Template stage: render templates to static files.

use super::{collect_sources, record_write, write_output};
use crate::build::{BuildContext, FileFailure, StageReport};
use crate::config::Category;
use minijinja::{path_loader, Environment, Value};
use std::path::Path;
use tracing::debug;

/// Template name of a path relative to the loader root.
fn template_name(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Build the rendering environment rooted at `base`.
pub fn environment(base: &Path) -> Environment<'static> {
    let mut env = Environment::new();
    env.set_loader(path_loader(base));
    env
}

/// Run the template stage.
///
/// Includes and `extends` resolve relative to the glob base. Every matched
/// template is written to the same relative path with its extension replaced.
pub fn run(ctx: &BuildContext) -> StageReport {
    let mut report = StageReport::new(Category::Templates.task_name());
    let Some(sources) = collect_sources(ctx, Category::Templates, &mut report) else {
        return report;
    };

    let config = &ctx.config().templates;
    let env = environment(sources.glob.base());
    let context = Value::from_serialize(&config.context);
    let dest = ctx.dest_dir(Category::Templates);

    for source in &sources.files {
        let rel = sources.relative(source);
        let name = template_name(&rel);

        let rendered = env.get_template(&name).and_then(|t| t.render(&context));
        match rendered {
            Ok(html) => {
                debug!("templates: {}", name);
                let out = rel.with_extension(&config.extension);
                let result = write_output(&dest, &out, html.as_bytes());
                record_write(&mut report, Some(source), result);
            }
            Err(e) => {
                report.add_failure(FileFailure::new(source.clone(), "render", format!("{:#}", e)))
            }
        }
    }

    report
}
