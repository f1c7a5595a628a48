//! Scripts stage: lower each source to the configured syntax level, minify it,
//! then concatenate everything into a single bundle.

use super::{collect_sources, record_write, write_output};
use crate::build::{BuildContext, FileFailure, StageReport};
use crate::config::{Category, ScriptsConfig};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions};
use oxc::minifier::{Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::semantic::SemanticBuilder;
use oxc::span::SourceType;
use oxc::transformer::{TransformOptions, Transformer};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Lower and minify one script.
///
/// Sources are parsed as classic scripts, not modules. On error returns the
/// failing step name and the error text.
pub fn compile_script(
    source: &str,
    path: &Path,
    config: &ScriptsConfig,
) -> Result<String, (&'static str, String)> {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(false);

    let parsed = Parser::new(&allocator, source, source_type).parse();
    if parsed.panicked || !parsed.errors.is_empty() {
        return Err(("parse", join_errors(&parsed.errors)));
    }
    let mut program = parsed.program;

    let (symbols, scopes) =
        SemanticBuilder::new().build(&program).semantic.into_symbol_table_and_scope_tree();

    let options = TransformOptions::from_target(&config.target)
        .map_err(|e| ("transform", format!("{:?}", e)))?;
    let transformed = Transformer::new(&allocator, path, &options)
        .build_with_symbols_and_scopes(symbols, scopes, &mut program);
    if !transformed.errors.is_empty() {
        return Err(("transform", join_errors(&transformed.errors)));
    }

    if config.minify {
        Minifier::new(MinifierOptions::default()).build(&allocator, &mut program);
    }

    let code = Codegen::new()
        .with_options(CodegenOptions { minify: config.minify, ..CodegenOptions::default() })
        .build(&program)
        .code;
    Ok(code)
}

fn join_errors<E: std::fmt::Display>(errors: &[E]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ")
}

fn process_file(path: &Path, config: &ScriptsConfig) -> Result<String, FileFailure> {
    let source = fs::read_to_string(path)
        .map_err(|e| FileFailure::new(path.to_path_buf(), "read", e.to_string()))?;
    compile_script(&source, path, config)
        .map_err(|(step, msg)| FileFailure::new(path.to_path_buf(), step, msg))
}

/// Run the scripts stage.
///
/// Every source that compiles is appended, in sorted path order, to the
/// bundle at the destination root. Failed sources are left out.
pub fn run(ctx: &BuildContext) -> StageReport {
    let mut report = StageReport::new(Category::Scripts.task_name());
    let Some(sources) = collect_sources(ctx, Category::Scripts, &mut report) else {
        return report;
    };

    let config = &ctx.config().scripts;
    let mut parts = Vec::with_capacity(sources.files.len());
    for source in &sources.files {
        match process_file(source, config) {
            Ok(code) => {
                debug!("scripts: {}", sources.relative(source).display());
                parts.push(code);
            }
            Err(failure) => report.add_failure(failure),
        }
    }

    if parts.is_empty() {
        return report;
    }

    let bundle = parts.iter().map(|p| p.trim_end()).collect::<Vec<_>>().join("\n");
    let dest = ctx.dest_dir(Category::Scripts);
    let result = write_output(&dest, &PathBuf::from(&config.bundle), bundle.as_bytes());
    record_write(&mut report, None, result);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssetflowConfig;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_compile_script_lowers_exponentiation() {
        let config = ScriptsConfig { minify: false, ..Default::default() };
        let out = compile_script("var x = a ** b;", Path::new("f.js"), &config).unwrap();
        assert!(!out.contains("**"), "{}", out);
        assert!(out.contains("Math.pow"));
    }

    #[test]
    fn test_compile_script_minifies() {
        let source =
            "function add(first, second) {\n    return first + second;\n}\nconsole.log(add(1, 2));\n";
        let out = compile_script(source, Path::new("a.js"), &ScriptsConfig::default()).unwrap();
        assert!(out.len() < source.len());
        assert!(!out.contains("\n    "));
    }

    #[test]
    fn test_compile_script_parse_error() {
        let err = compile_script("var = ;", Path::new("bad.js"), &ScriptsConfig::default())
            .unwrap_err();
        assert_eq!(err.0, "parse");
    }

    #[test]
    fn test_compile_script_unknown_target() {
        let config = ScriptsConfig { target: "es1999".to_string(), ..Default::default() };
        let err = compile_script("var a = 1;", Path::new("a.js"), &config).unwrap_err();
        assert_eq!(err.0, "transform");
    }

    #[test]
    fn test_run_bundles_in_sorted_order() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "public/javascripts/b.js", "console.log('second');\n");
        write(temp.path(), "public/javascripts/a.js", "console.log('first');\n");
        write(temp.path(), "public/javascripts/broken.js", "function (\n");

        let ctx = BuildContext::new(AssetflowConfig::default(), temp.path().to_path_buf());
        let report = run(&ctx);
        assert_eq!(report.inputs, 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.outputs, vec![temp.path().join("assets/app.js")]);

        let bundle = fs::read_to_string(temp.path().join("assets/app.js")).unwrap();
        let first = bundle.find("first").unwrap();
        let second = bundle.find("second").unwrap();
        assert!(first < second);
    }
}
