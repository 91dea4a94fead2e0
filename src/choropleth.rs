use crate::error::{MapError, Result};
use crate::palette::{self, Normalize, SequentialPalette};
use crate::render::{
    extent, multipolygon_coords, Canvas, Figure, FigureSize, Layer, Legend, PlotArea, Projection,
    RegionFill,
};
use crate::types::JoinedRegionMetric;
use tracing::debug;

/// Fills each joined region by its metric value on the sequential Oranges ramp.
#[derive(Debug, Clone)]
pub struct ChoroplethRenderer {
    pub size: FigureSize,
    pub palette: SequentialPalette,
}

impl Default for ChoroplethRenderer {
    fn default() -> Self {
        Self::new(FigureSize::default())
    }
}

impl ChoroplethRenderer {
    pub fn new(size: FigureSize) -> Self {
        Self {
            size,
            palette: SequentialPalette::oranges(),
        }
    }

    pub fn render(&self, joined: &JoinedRegionMetric, value_column: &str, title: &str) -> Result<Figure> {
        let values = joined.values(value_column)?;
        let (vmin, vmax) = value_range(&values).ok_or_else(|| {
            MapError::Value(format!("no rows to color for '{}'", value_column))
        })?;
        let norm = Normalize::new(vmin, vmax);

        let fills: Vec<RegionFill> = joined
            .rows
            .iter()
            .zip(&values)
            .map(|(row, &value)| RegionFill {
                region_name: row.region_name.clone(),
                value,
                color: self.palette.color_at(norm.apply(value)),
            })
            .collect();

        let area = PlotArea::for_figure(self.size.width, self.size.height, true);
        let bounds = extent(joined.rows.iter().flat_map(|r| multipolygon_coords(&r.geometry)));
        let proj = Projection::fit(bounds, area);

        let mut canvas = Canvas::new(self.size.width, self.size.height);
        for (row, fill) in joined.rows.iter().zip(&fills) {
            canvas.fill_multipolygon(&row.geometry, &proj, fill.color);
        }
        for row in &joined.rows {
            canvas.stroke_multipolygon(&row.geometry, &proj, palette::BORDER);
        }
        canvas.draw_color_bar(&area, &self.palette);

        debug!(column = value_column, regions = fills.len(), vmin, vmax, "Rendered choropleth");

        Ok(Figure {
            title: title.to_string(),
            image: canvas.into_image(),
            legend: Some(Legend::ColorBar { vmin, vmax }),
            axes: None,
            layers: vec![Layer::Regions(fills)],
        })
    }
}

fn value_range(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().copied().fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}
