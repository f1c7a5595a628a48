//! Image stage: lossless recompression, then optional lossy steps.
//!
//! Files are processed in parallel. Whatever the steps produce, a result that
//! is not smaller than its source is discarded and the source bytes are
//! written unchanged.

use super::quantize::quantize_image;
use super::{collect_sources, write_output};
use crate::build::{BuildContext, FileFailure, StageReport};
use crate::config::{Category, ImagesConfig};
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{AnimationDecoder, ColorType, DynamicImage, ImageEncoder, ImageFormat, RgbaImage};
use rayon::prelude::*;
use regex::Regex;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

/// Image formats the stage knows how to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
    Svg,
}

impl ImageKind {
    /// Detect the kind from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(ImageKind::Png),
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "gif" => Some(ImageKind::Gif),
            "svg" => Some(ImageKind::Svg),
            _ => None,
        }
    }
}

type StepError = (&'static str, String);

fn step_err<E: std::fmt::Display>(step: &'static str) -> impl Fn(E) -> StepError {
    move |e| (step, e.to_string())
}

/// Optimize one image. Returns the bytes to write.
pub fn optimize(
    bytes: &[u8],
    kind: ImageKind,
    config: &ImagesConfig,
) -> Result<Vec<u8>, StepError> {
    let processed = match kind {
        ImageKind::Png => optimize_png(bytes, config)?,
        ImageKind::Jpeg => optimize_jpeg(bytes, config)?,
        ImageKind::Gif => optimize_gif(bytes)?,
        ImageKind::Svg => optimize_svg(bytes)?,
    };

    if processed.len() < bytes.len() {
        Ok(processed)
    } else {
        Ok(bytes.to_vec())
    }
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, StepError> {
    let (width, height) = image.dimensions();
    let mut buf = Vec::new();
    let encoder =
        PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive);

    if image.pixels().all(|p| p[3] == 255) {
        let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
        encoder
            .write_image(rgb.as_raw(), width, height, ColorType::Rgb8)
            .map_err(step_err("encode"))?;
    } else {
        encoder
            .write_image(image.as_raw(), width, height, ColorType::Rgba8)
            .map_err(step_err("encode"))?;
    }
    Ok(buf)
}

fn optimize_png(bytes: &[u8], config: &ImagesConfig) -> Result<Vec<u8>, StepError> {
    let image = image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .map_err(step_err("decode"))?
        .to_rgba8();

    let lossless = encode_png(&image)?;
    if !config.lossy {
        return Ok(lossless);
    }

    match quantize_image(&image, config.max_colors) {
        Some(reduced) => {
            let lossy = encode_png(&reduced)?;
            Ok(if lossy.len() < lossless.len() { lossy } else { lossless })
        }
        None => Ok(lossless),
    }
}

fn optimize_jpeg(bytes: &[u8], config: &ImagesConfig) -> Result<Vec<u8>, StepError> {
    // No lossless restructuring is available; only the lossy re-encode.
    if !config.lossy {
        return Ok(bytes.to_vec());
    }

    let image = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
        .map_err(step_err("decode"))?
        .to_rgb8();
    let (width, height) = image.dimensions();

    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, config.jpeg_quality)
        .encode(image.as_raw(), width, height, ColorType::Rgb8)
        .map_err(step_err("encode"))?;
    Ok(buf)
}

fn optimize_gif(bytes: &[u8]) -> Result<Vec<u8>, StepError> {
    let decoder = GifDecoder::new(Cursor::new(bytes)).map_err(step_err("decode"))?;
    let frames = decoder.into_frames().collect_frames().map_err(step_err("decode"))?;
    let animated = frames.len() > 1;

    let mut buf = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buf);
        if animated {
            encoder.set_repeat(Repeat::Infinite).map_err(step_err("encode"))?;
        }
        encoder.encode_frames(frames).map_err(step_err("encode"))?;
    }
    Ok(buf)
}

struct SvgPatterns {
    comments: Regex,
    prolog: Regex,
    metadata: Regex,
    editor_elements: Regex,
    editor_attrs: Regex,
    between_tags: Regex,
}

fn svg_patterns() -> &'static SvgPatterns {
    static PATTERNS: OnceLock<SvgPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| SvgPatterns {
        comments: Regex::new(r"(?s)<!--.*?-->").expect("valid regex"),
        prolog: Regex::new(r"(?s)<\?xml.*?\?>|<!DOCTYPE[^>]*>").expect("valid regex"),
        metadata: Regex::new(r"(?s)<metadata\b.*?</metadata>|<metadata\b[^>]*/>")
            .expect("valid regex"),
        editor_elements: Regex::new(
            r"(?s)<(sodipodi|inkscape):[\w-]+\b[^>]*/>|<(sodipodi|inkscape):([\w-]+)\b.*?</(sodipodi|inkscape):[\w-]+>",
        )
        .expect("valid regex"),
        editor_attrs: Regex::new(
            r#"\s+(xmlns:(sodipodi|inkscape|sketch)|sodipodi:[\w-]+|inkscape:[\w-]+|sketch:[\w-]+)="[^"]*""#,
        )
        .expect("valid regex"),
        between_tags: Regex::new(r">\s+<").expect("valid regex"),
    })
}

/// Strip comments, metadata, editor markup and inter-tag whitespace.
pub fn minify_svg(svg: &str) -> String {
    let p = svg_patterns();
    let out = p.comments.replace_all(svg, "");
    let out = p.prolog.replace_all(&out, "");
    let out = p.metadata.replace_all(&out, "");
    let out = p.editor_elements.replace_all(&out, "");
    let out = p.editor_attrs.replace_all(&out, "");
    let out = p.between_tags.replace_all(&out, "><");
    out.trim().to_string()
}

fn optimize_svg(bytes: &[u8]) -> Result<Vec<u8>, StepError> {
    let svg = std::str::from_utf8(bytes).map_err(step_err("decode"))?;
    if !svg.contains("<svg") {
        return Err(("decode", "not an SVG document".to_string()));
    }
    Ok(minify_svg(svg).into_bytes())
}

/// Read, optimize and write one image.
fn process_file(
    source: &Path,
    rel: &Path,
    dest: &Path,
    config: &ImagesConfig,
) -> Result<PathBuf, FileFailure> {
    let failure = |step: &str, msg: String| FileFailure::new(source.to_path_buf(), step, msg);

    let kind = ImageKind::from_path(source)
        .ok_or_else(|| failure("decode", "unsupported image format".to_string()))?;
    let bytes = fs::read(source).map_err(|e| failure("read", e.to_string()))?;
    let optimized = optimize(&bytes, kind, config).map_err(|(step, msg)| failure(step, msg))?;

    debug!("images: {} {} -> {} bytes", rel.display(), bytes.len(), optimized.len());
    write_output(dest, rel, &optimized).map_err(|e| failure("write", e.to_string()))
}

/// Run the image stage.
pub fn run(ctx: &BuildContext) -> StageReport {
    let mut report = StageReport::new(Category::Images.task_name());
    let Some(sources) = collect_sources(ctx, Category::Images, &mut report) else {
        return report;
    };

    let config = &ctx.config().images;
    let dest = ctx.dest_dir(Category::Images);

    let results: Vec<_> = sources
        .files
        .par_iter()
        .map(|source| process_file(source, &sources.relative(source), &dest, config))
        .collect();

    for result in results {
        match result {
            Ok(path) => report.add_output(path),
            Err(failure) => report.add_failure(failure),
        }
    }

    report
}
