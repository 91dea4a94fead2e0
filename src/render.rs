//! Raster canvas shared by the map and chart renderers.
//!
//! Every render builds a fresh [`Figure`]; nothing here keeps drawing state
//! between calls, so figures can be produced from any thread.

use crate::error::Result;
use crate::palette::{self, SequentialPalette};
use crate::types::ClusterId;
use geo::{Coord, LineString, MultiPolygon, Point, Rect};
use image::{ImageBuffer, ImageOutputFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect as PixelRect;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;

const TITLE_BAND: u32 = 48;
const MARGIN: u32 = 16;
const COLORBAR_BAND: u32 = 80;
const COLORBAR_WIDTH: u32 = 20;

/// Pixel dimensions of a rendered figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FigureSize {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

fn default_width() -> u32 {
    900
}

fn default_height() -> u32 {
    600
}

impl Default for FigureSize {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
        }
    }
}

/// A rendered chart: the raster plus the text the display sink lays out around it.
#[derive(Debug, Clone)]
pub struct Figure {
    pub title: String,
    pub image: RgbaImage,
    pub legend: Option<Legend>,
    pub axes: Option<AxisLabels>,
    pub layers: Vec<Layer>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Legend {
    ColorBar { vmin: f64, vmax: f64 },
    Swatches { title: Option<String>, entries: Vec<LegendEntry> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub label: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisLabels {
    pub x_label: String,
    pub y_label: String,
    pub x_ticks: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum Layer {
    Regions(Vec<RegionFill>),
    Backdrop { regions: usize },
    Markers(MarkerLayer),
    Bars(Vec<Bar>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionFill {
    pub region_name: String,
    pub value: f64,
    pub color: Rgba<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerLayer {
    pub color: Rgba<u8>,
    pub points: Vec<Point<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub cluster: ClusterId,
    pub category: Option<String>,
    pub value: f64,
    pub color: Rgba<u8>,
}

impl Figure {
    pub fn region_fills(&self) -> &[RegionFill] {
        self.layers
            .iter()
            .find_map(|l| match l {
                Layer::Regions(fills) => Some(fills.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn markers(&self) -> Option<&MarkerLayer> {
        self.layers.iter().find_map(|l| match l {
            Layer::Markers(m) => Some(m),
            _ => None,
        })
    }

    pub fn bars(&self) -> &[Bar] {
        self.layers
            .iter()
            .find_map(|l| match l {
                Layer::Bars(bars) => Some(bars.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn color_bar_range(&self) -> Option<(f64, f64)> {
        match self.legend {
            Some(Legend::ColorBar { vmin, vmax }) => Some((vmin, vmax)),
            _ => None,
        }
    }

    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(self.image.clone())
            .write_to(&mut buf, ImageOutputFormat::Png)?;
        Ok(buf.into_inner())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.image.save(path)?;
        Ok(())
    }
}

pub fn rgba_to_hex(c: Rgba<u8>) -> String {
    format!("#{:02X}{:02X}{:02X}", c[0], c[1], c[2])
}

/// Pixel-space plot area inside the figure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotArea {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PlotArea {
    /// Plot area below the title band, leaving room on the right for a color bar.
    pub fn for_figure(width: u32, height: u32, with_colorbar: bool) -> Self {
        let right = if with_colorbar { COLORBAR_BAND } else { MARGIN };
        Self {
            x: MARGIN,
            y: TITLE_BAND,
            width: width.saturating_sub(MARGIN + right).max(1),
            height: height.saturating_sub(TITLE_BAND + MARGIN).max(1),
        }
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// Equal-aspect lon/lat to pixel mapping, north up.
#[derive(Debug, Clone, Copy)]
pub struct Projection {
    bounds: Rect<f64>,
    area: PlotArea,
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Projection {
    pub fn fit(bounds: Rect<f64>, area: PlotArea) -> Self {
        let bounds = pad_degenerate(bounds);
        let scale = (area.width as f64 / bounds.width()).min(area.height as f64 / bounds.height());
        Self {
            bounds,
            area,
            scale,
            offset_x: (area.width as f64 - bounds.width() * scale) / 2.0,
            offset_y: (area.height as f64 - bounds.height() * scale) / 2.0,
        }
    }

    pub fn to_pixel(&self, c: Coord<f64>) -> (f32, f32) {
        let x = self.area.x as f64 + self.offset_x + (c.x - self.bounds.min().x) * self.scale;
        let y = self.area.bottom() as f64 - self.offset_y - (c.y - self.bounds.min().y) * self.scale;
        (x as f32, y as f32)
    }
}

fn pad_degenerate(bounds: Rect<f64>) -> Rect<f64> {
    let (mut min, mut max) = (bounds.min(), bounds.max());
    if bounds.width() <= f64::EPSILON {
        min.x -= 0.5;
        max.x += 0.5;
    }
    if bounds.height() <= f64::EPSILON {
        min.y -= 0.5;
        max.y += 0.5;
    }
    Rect::new(min, max)
}

/// Smallest rectangle covering every coordinate; a unit square when there are none.
pub fn extent<I>(coords: I) -> Rect<f64>
where
    I: IntoIterator<Item = Coord<f64>>,
{
    let mut iter = coords.into_iter();
    let Some(first) = iter.next() else {
        return Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 });
    };
    let (min, max) = iter.fold((first, first), |(min, max), c| {
        (
            Coord { x: min.x.min(c.x), y: min.y.min(c.y) },
            Coord { x: max.x.max(c.x), y: max.y.max(c.y) },
        )
    });
    Rect::new(min, max)
}

pub fn multipolygon_coords(mp: &MultiPolygon<f64>) -> impl Iterator<Item = Coord<f64>> + '_ {
    mp.0.iter().flat_map(|p| p.exterior().0.iter().copied())
}

pub struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: ImageBuffer::from_pixel(width.max(1), height.max(1), palette::BACKGROUND),
        }
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    #[cfg(test)]
    pub(crate) fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.image.get_pixel(x, y)
    }

    fn blend(&mut self, x: u32, y: u32, color: Rgba<u8>) {
        let alpha = color[3] as f32 / 255.0;
        let dst = self.image.get_pixel_mut(x, y);
        for i in 0..3 {
            dst[i] = (dst[i] as f32 * (1.0 - alpha) + color[i] as f32 * alpha).round() as u8;
        }
        dst[3] = 255;
    }

    /// Even-odd scanline fill over all rings, so interior rings cut holes.
    pub fn fill_multipolygon(&mut self, mp: &MultiPolygon<f64>, proj: &Projection, color: Rgba<u8>) {
        let edges: Vec<((f32, f32), (f32, f32))> = rings(mp)
            .flat_map(|ring| {
                ring.lines()
                    .map(|l| (proj.to_pixel(l.start), proj.to_pixel(l.end)))
                    .collect::<Vec<_>>()
            })
            .collect();
        if edges.is_empty() {
            return;
        }

        let (width, height) = self.image.dimensions();
        let (min_y, max_y) = edges.iter().fold((f32::MAX, f32::MIN), |(lo, hi), (a, b)| {
            (lo.min(a.1).min(b.1), hi.max(a.1).max(b.1))
        });
        let row_start = min_y.floor().max(0.0) as u32;
        let row_end = (max_y.ceil().max(0.0) as u32).min(height);

        let mut crossings: Vec<f32> = Vec::new();
        for row in row_start..row_end {
            let sy = row as f32 + 0.5;
            crossings.clear();
            for &((x0, y0), (x1, y1)) in &edges {
                if (y0 <= sy && sy < y1) || (y1 <= sy && sy < y0) {
                    crossings.push(x0 + (sy - y0) * (x1 - x0) / (y1 - y0));
                }
            }
            crossings.sort_by(|a, b| a.total_cmp(b));

            for span in crossings.chunks_exact(2) {
                let start = (span[0] - 0.5).ceil().max(0.0) as u32;
                let end = (span[1] - 0.5).floor();
                if end < 0.0 {
                    continue;
                }
                let end = (end as u32).min(width.saturating_sub(1));
                for x in start..=end {
                    if x < width {
                        self.blend(x, row, color);
                    }
                }
            }
        }
    }

    pub fn stroke_multipolygon(&mut self, mp: &MultiPolygon<f64>, proj: &Projection, color: Rgba<u8>) {
        for ring in rings(mp) {
            for line in ring.lines() {
                draw_line_segment_mut(
                    &mut self.image,
                    proj.to_pixel(line.start),
                    proj.to_pixel(line.end),
                    color,
                );
            }
        }
    }

    /// A `+` marker centered on the pixel position.
    pub fn draw_plus(&mut self, (x, y): (f32, f32), half: f32, color: Rgba<u8>) {
        draw_line_segment_mut(&mut self.image, (x - half, y), (x + half, y), color);
        draw_line_segment_mut(&mut self.image, (x, y - half), (x, y + half), color);
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, width: u32, height: u32, color: Rgba<u8>) {
        if width == 0 || height == 0 {
            return;
        }
        draw_filled_rect_mut(&mut self.image, PixelRect::at(x, y).of_size(width, height), color);
    }

    pub fn outline_rect(&mut self, x: i32, y: i32, width: u32, height: u32, color: Rgba<u8>) {
        if width == 0 || height == 0 {
            return;
        }
        draw_hollow_rect_mut(&mut self.image, PixelRect::at(x, y).of_size(width, height), color);
    }

    pub fn line(&mut self, from: (f32, f32), to: (f32, f32), color: Rgba<u8>) {
        draw_line_segment_mut(&mut self.image, from, to, color);
    }

    /// Vertical continuous color bar to the right of the plot area, low values at the bottom.
    pub fn draw_color_bar(&mut self, area: &PlotArea, palette: &SequentialPalette) {
        let x = (area.x + area.width + (COLORBAR_BAND - COLORBAR_WIDTH) / 2) as i32;
        let height = area.height;
        for i in 0..height {
            let t = (i as f64 + 0.5) / height as f64;
            let row = area.bottom() as i32 - 1 - i as i32;
            self.fill_rect(x, row, COLORBAR_WIDTH, 1, palette.color_at(t));
        }
        self.outline_rect(x, area.y as i32, COLORBAR_WIDTH, height, palette::AXIS);
    }
}

fn rings(mp: &MultiPolygon<f64>) -> impl Iterator<Item = &LineString<f64>> {
    mp.0.iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors().iter()))
}
