//! Configuration schema types for `assetflow.toml`
//!
//! Defines the path table and the per-stage settings for an assetflow project.
//! Every section has defaults matching the stock layout, so a partial file is
//! always valid.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Logical asset category, one per stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    /// Plain `.css` stylesheets
    Styles,
    /// Sass stylesheets compiled to CSS
    SassStyles,
    /// JavaScript sources bundled into one file
    Scripts,
    /// Raster and vector images
    Images,
    /// Templates rendered to HTML
    Templates,
}

impl Category {
    /// All categories in declaration order.
    pub const ALL: [Category; 5] = [
        Category::Styles,
        Category::SassStyles,
        Category::Scripts,
        Category::Images,
        Category::Templates,
    ];

    /// Task name that runs this category's stage.
    pub fn task_name(self) -> &'static str {
        match self {
            Category::Styles => "styles",
            Category::SassStyles => "sassStyles",
            Category::Scripts => "scripts",
            Category::Images => "images",
            Category::Templates => "templates",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.task_name())
    }
}

/// Source glob and destination directory for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPaths {
    /// Source glob, relative to the project root (may start with `..`)
    pub src: String,
    /// Destination directory, relative to the project root
    pub dest: PathBuf,
}

impl CategoryPaths {
    fn new(src: &str, dest: &str) -> Self {
        Self { src: src.to_string(), dest: PathBuf::from(dest) }
    }
}

/// The static category → {source glob, destination} table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PathTable {
    pub styles: CategoryPaths,
    pub sass_styles: CategoryPaths,
    pub scripts: CategoryPaths,
    pub images: CategoryPaths,
    pub templates: CategoryPaths,
}

impl Default for PathTable {
    fn default() -> Self {
        Self {
            styles: CategoryPaths::new("public/stylesheets/**/*.css", "assets/stylesheets"),
            sass_styles: CategoryPaths::new("public/stylesheets/**/*.scss", "assets/stylesheets"),
            scripts: CategoryPaths::new("public/javascripts/**/*.js", "assets"),
            images: CategoryPaths::new(
                "public/images/**/*.{png,PNG,jpeg,jpg,svg,gif}",
                "assets/images",
            ),
            templates: CategoryPaths::new("views/**/*.jinja", "assets"),
        }
    }
}

impl PathTable {
    /// Paths for a category.
    pub fn get(&self, category: Category) -> &CategoryPaths {
        match category {
            Category::Styles => &self.styles,
            Category::SassStyles => &self.sass_styles,
            Category::Scripts => &self.scripts,
            Category::Images => &self.images,
            Category::Templates => &self.templates,
        }
    }
}

/// Project metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,
    /// Output root; `cleanAll` removes it and the dev server serves it
    pub out: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self { name: "assetflow-project".to_string(), out: PathBuf::from("assets") }
    }
}

/// Browser versions used to decide which vendor prefixes to emit.
///
/// Values are major versions; a missing browser is not targeted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserTargets {
    pub chrome: Option<u32>,
    pub firefox: Option<u32>,
    pub safari: Option<u32>,
    pub ios_saf: Option<u32>,
    pub edge: Option<u32>,
    pub ie: Option<u32>,
    pub opera: Option<u32>,
    pub samsung: Option<u32>,
    pub android: Option<u32>,
}

impl BrowserTargets {
    /// Roughly what autoprefixer's default browserslist query resolves to.
    pub fn stock() -> Self {
        Self {
            chrome: Some(49),
            firefox: Some(52),
            safari: Some(9),
            ios_saf: Some(9),
            edge: Some(16),
            ie: Some(11),
            opera: Some(36),
            samsung: Some(5),
            android: Some(67),
        }
    }

    /// Whether no browser is targeted at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Styles stage settings (shared by the Sass stage for prefix + minify)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StylesConfig {
    /// Fixed output base name; `a.css` + `b.css` in one directory become `<basename>.css`
    pub basename: String,
    /// Minify the output
    pub minify: bool,
    /// Prefixing targets
    pub targets: BrowserTargets,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self { basename: "styles".to_string(), minify: true, targets: BrowserTargets::stock() }
    }
}

/// Scripts stage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    /// Name of the concatenated bundle written to the destination root
    pub bundle: String,
    /// Syntax level sources are lowered to (e.g. `es2015`)
    pub target: String,
    /// Minify each source before concatenation
    pub minify: bool,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self { bundle: "app.js".to_string(), target: "es2015".to_string(), minify: true }
    }
}

/// Image stage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    /// Run the lossy steps after the lossless ones
    pub lossy: bool,
    /// JPEG re-encode quality (1-100)
    pub jpeg_quality: u8,
    /// Palette size for PNG quantization (2-256)
    pub max_colors: usize,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self { lossy: true, jpeg_quality: 80, max_colors: 256 }
    }
}

/// Template renderer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    /// Extension of rendered files, without the dot
    pub extension: String,
    /// Variables available to every template
    pub context: BTreeMap<String, toml::Value>,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self { extension: "html".to_string(), context: BTreeMap::new() }
    }
}

/// Cleaner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanConfig {
    /// Paths and globs removed by the selective `clean` task
    pub selective: Vec<String>,
    /// Allow removing paths outside the project root
    pub force: bool,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            selective: vec![
                "assets/partials".to_string(),
                "assets/stylesheets".to_string(),
                "assets/*.html".to_string(),
                "assets/*.ejs".to_string(),
                "assets/*.js".to_string(),
            ],
            force: false,
        }
    }
}

/// Development server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind; 0 picks a free port
    pub port: u16,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 3000 }
    }
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    pub debounce_ms: u32,
    /// Clear terminal between rebuilds
    pub clear_screen: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 100, clear_screen: false }
    }
}

/// Complete assetflow.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetflowConfig {
    pub project: ProjectConfig,
    pub paths: PathTable,
    pub styles: StylesConfig,
    pub scripts: ScriptsConfig,
    pub images: ImagesConfig,
    pub templates: TemplatesConfig,
    pub clean: CleanConfig,
    pub serve: ServeConfig,
    pub watch: WatchConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "paths.styles.src")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "assetflow.toml: '{}' {}", self.field, self.message)
    }
}

impl AssetflowConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: String, message: &str| {
            errors.push(ConfigValidationError { field, message: message.to_string() });
        };

        if self.project.out.as_os_str().is_empty() {
            push("project.out".to_string(), "must be a non-empty path");
        }

        for category in Category::ALL {
            let paths = self.paths.get(category);
            if paths.src.trim().is_empty() {
                push(format!("paths.{}.src", category), "must be a non-empty glob pattern");
            } else if let Err(e) = globset::Glob::new(&paths.src) {
                push(format!("paths.{}.src", category), &format!("is not a valid glob: {}", e));
            }
            if paths.dest.as_os_str().is_empty() {
                push(format!("paths.{}.dest", category), "must be a non-empty path");
            }
        }

        if self.styles.basename.is_empty() || self.styles.basename.contains(['/', '\\']) {
            push("styles.basename".to_string(), "must be a plain file name");
        }
        if self.scripts.bundle.is_empty() || self.scripts.bundle.contains(['/', '\\']) {
            push("scripts.bundle".to_string(), "must be a plain file name");
        }
        if self.templates.extension.is_empty() || self.templates.extension.starts_with('.') {
            push("templates.extension".to_string(), "must be an extension without a leading dot");
        }
        if !(1..=100).contains(&self.images.jpeg_quality) {
            push("images.jpeg_quality".to_string(), "must be between 1 and 100");
        }
        if !(2..=256).contains(&self.images.max_colors) {
            push("images.max_colors".to_string(), "must be between 2 and 256");
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}
