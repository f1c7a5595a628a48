//! Lossy palette reduction for PNG images using median cut.

use image::{Rgba, RgbaImage};
use std::collections::HashMap;

/// A color represented as RGBA values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn from_rgba(rgba: Rgba<u8>) -> Self {
        Self { r: rgba[0], g: rgba[1], b: rgba[2], a: rgba[3] }
    }

    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, self.a])
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }

    fn channel(&self, channel: Channel) -> u8 {
        match channel {
            Channel::Red => self.r,
            Channel::Green => self.g,
            Channel::Blue => self.b,
            Channel::Alpha => self.a,
        }
    }

    fn distance(&self, other: &Color) -> u32 {
        let d = |a: u8, b: u8| (a as i32 - b as i32).pow(2) as u32;
        d(self.r, other.r) + d(self.g, other.g) + d(self.b, other.b) + d(self.a, other.a)
    }
}

#[derive(Debug, Clone, Copy)]
enum Channel {
    Red,
    Green,
    Blue,
    Alpha,
}

/// A box of colors for median cut algorithm.
#[derive(Debug, Clone)]
struct ColorBox {
    colors: Vec<(Color, u32)>, // Color and count
}

impl ColorBox {
    fn new(colors: Vec<(Color, u32)>) -> Self {
        Self { colors }
    }

    /// Find which channel has the largest range.
    fn widest_channel(&self) -> Channel {
        [Channel::Red, Channel::Green, Channel::Blue, Channel::Alpha]
            .into_iter()
            .max_by_key(|&channel| {
                let values = self.colors.iter().map(|(c, _)| c.channel(channel));
                let min = values.clone().min().unwrap_or(0);
                let max = values.max().unwrap_or(0);
                max - min
            })
            .unwrap_or(Channel::Red)
    }

    /// Split the box into two along the widest channel.
    fn split(mut self) -> (ColorBox, ColorBox) {
        let channel = self.widest_channel();
        self.colors.sort_by_key(|(color, _)| color.channel(channel));

        // Median by pixel count
        let total: u64 = self.colors.iter().map(|(_, count)| *count as u64).sum();
        let mut running = 0u64;
        let mut split_idx = self.colors.len() / 2;

        for (i, (_, count)) in self.colors.iter().enumerate() {
            running += *count as u64;
            if running >= total / 2 {
                split_idx = i + 1;
                break;
            }
        }

        // Never create an empty box
        split_idx = split_idx.clamp(1, self.colors.len() - 1);

        let right = self.colors.split_off(split_idx);
        (ColorBox::new(self.colors), ColorBox::new(right))
    }

    /// Average color of this box, weighted by pixel count.
    fn average_color(&self) -> Color {
        let total: u64 = self.colors.iter().map(|(_, count)| *count as u64).sum();
        if total == 0 {
            return Color { r: 0, g: 0, b: 0, a: 255 };
        }

        let sum = |f: fn(&Color) -> u8| -> u8 {
            let s: u64 = self.colors.iter().map(|(c, n)| f(c) as u64 * *n as u64).sum();
            (s / total) as u8
        };

        Color { r: sum(|c| c.r), g: sum(|c| c.g), b: sum(|c| c.b), a: sum(|c| c.a) }
    }

    fn pixel_count(&self) -> u64 {
        self.colors.iter().map(|(_, count)| *count as u64).sum()
    }
}

/// Count the distinct colors of an image.
pub fn color_histogram(image: &RgbaImage) -> HashMap<Color, u32> {
    let mut colors = HashMap::new();
    for pixel in image.pixels() {
        *colors.entry(Color::from_rgba(*pixel)).or_insert(0) += 1;
    }
    colors
}

/// Reduce a histogram to at most `max_colors` representative colors.
///
/// Fully transparent pixels keep a dedicated palette entry.
pub fn median_cut_quantize(colors: HashMap<Color, u32>, max_colors: usize) -> Vec<Color> {
    if colors.len() <= max_colors {
        return colors.into_keys().collect();
    }

    let mut transparent: Option<Color> = None;
    let mut opaque: Vec<(Color, u32)> = Vec::new();
    for (color, count) in colors {
        if color.is_transparent() {
            transparent = Some(Color { r: 0, g: 0, b: 0, a: 0 });
        } else {
            opaque.push((color, count));
        }
    }
    // Deterministic starting order
    opaque.sort_by_key(|(c, _)| (c.r, c.g, c.b, c.a));

    let effective_max =
        if transparent.is_some() { max_colors.saturating_sub(1) } else { max_colors }.max(1);

    let mut boxes = vec![ColorBox::new(opaque)];
    while boxes.len() < effective_max {
        // Split the most populated box that still can be split
        let Some(idx) = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.colors.len() > 1)
            .max_by_key(|(_, b)| b.pixel_count())
            .map(|(i, _)| i)
        else {
            break;
        };

        let (left, right) = boxes.remove(idx).split();
        boxes.push(left);
        boxes.push(right);
    }

    let mut palette: Vec<Color> = boxes.iter().map(ColorBox::average_color).collect();
    if let Some(t) = transparent {
        palette.push(t);
    }
    palette
}

/// Index of the palette entry closest to `color`.
pub fn find_closest_color(color: Color, palette: &[Color]) -> usize {
    if color.is_transparent() {
        if let Some(i) = palette.iter().position(Color::is_transparent) {
            return i;
        }
    }

    palette
        .iter()
        .enumerate()
        .min_by_key(|(_, p)| color.distance(p))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Remap an image onto at most `max_colors` colors.
///
/// Returns `None` when the image already fits the palette.
pub fn quantize_image(image: &RgbaImage, max_colors: usize) -> Option<RgbaImage> {
    let histogram = color_histogram(image);
    if histogram.len() <= max_colors {
        return None;
    }

    let palette = median_cut_quantize(histogram, max_colors);
    let mut cache: HashMap<Color, Rgba<u8>> = HashMap::new();
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let color = Color::from_rgba(*pixel);
        *pixel = *cache
            .entry(color)
            .or_insert_with(|| palette[find_closest_color(color, &palette)].to_rgba());
    }
    Some(out)
}
