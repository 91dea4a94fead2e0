use crate::error::{MapError, Result};
use crate::palette;
use crate::render::{
    rgba_to_hex, AxisLabels, Bar, Canvas, Figure, FigureSize, Layer, Legend, LegendEntry, PlotArea,
};
use crate::types::{CategoryCountTable, ClusterId};
use std::collections::HashMap;
use tracing::debug;

const AXIS_INSET: u32 = 40;
const GRID_LINES: u32 = 5;
/// Share of a cluster slot covered by its bars.
const GROUP_FILL: f64 = 0.8;

/// Bar chart of per-cluster counts, optionally split by a category column.
#[derive(Debug, Clone, Default)]
pub struct CategoryBarChart {
    pub size: FigureSize,
}

impl CategoryBarChart {
    pub fn new(size: FigureSize) -> Self {
        Self { size }
    }

    pub fn render(&self, table: &CategoryCountTable, title: &str, y_label: &str) -> Result<Figure> {
        if table.rows.is_empty() {
            return Err(MapError::Value(format!("no rows to chart for '{}'", title)));
        }

        // Series keep the order in which categories first appear.
        let mut series: Vec<Option<String>> = Vec::new();
        let mut sums: HashMap<(ClusterId, usize), (f64, usize)> = HashMap::new();
        for row in &table.rows {
            if !row.value.is_finite() || row.value < 0.0 {
                return Err(MapError::Value(format!(
                    "count {} for cluster {} is not a non-negative number",
                    row.value, row.cluster
                )));
            }
            let cluster = ClusterId::new(row.cluster)?;
            let s = match series.iter().position(|c| *c == row.category) {
                Some(i) => i,
                None => {
                    series.push(row.category.clone());
                    series.len() - 1
                }
            };
            let entry = sums.entry((cluster, s)).or_insert((0.0, 0));
            entry.0 += row.value;
            entry.1 += 1;
        }

        let split = series.iter().any(Option::is_some);
        let mut bars: Vec<Bar> = Vec::new();
        let mut slots: Vec<usize> = Vec::new();
        for cluster in ClusterId::all() {
            for (s, category) in series.iter().enumerate() {
                if let Some((sum, n)) = sums.get(&(cluster, s)) {
                    let color = if split {
                        palette::series_color(s)
                    } else {
                        palette::cluster_color(cluster)
                    };
                    bars.push(Bar {
                        cluster,
                        category: category.clone(),
                        value: sum / *n as f64,
                        color,
                    });
                    slots.push(s);
                }
            }
        }

        let image = self.draw(&bars, &slots, series.len());
        debug!(title, bars = bars.len(), series = series.len(), "Rendered bar chart");

        let legend = split.then(|| Legend::Swatches {
            title: table.category_label.clone(),
            entries: series
                .iter()
                .enumerate()
                .map(|(i, c)| LegendEntry {
                    label: c.clone().unwrap_or_default(),
                    color: rgba_to_hex(palette::series_color(i)),
                })
                .collect(),
        });

        Ok(Figure {
            title: title.to_string(),
            image,
            legend,
            axes: Some(AxisLabels {
                x_label: "Clusters".to_string(),
                y_label: y_label.to_string(),
                x_ticks: ClusterId::all().map(|c| c.display_number().to_string()).collect(),
            }),
            layers: vec![Layer::Bars(bars)],
        })
    }

    fn draw(&self, bars: &[Bar], slots: &[usize], series_count: usize) -> image::RgbaImage {
        let outer = PlotArea::for_figure(self.size.width, self.size.height, false);
        let area = PlotArea {
            x: outer.x + AXIS_INSET,
            y: outer.y,
            width: outer.width.saturating_sub(AXIS_INSET).max(1),
            height: outer.height.saturating_sub(AXIS_INSET / 2).max(1),
        };
        let mut canvas = Canvas::new(self.size.width, self.size.height);

        let top = bars.iter().map(|b| b.value).fold(0.0_f64, f64::max);
        let y_max = if top > 0.0 { top * 1.05 } else { 1.0 };
        let bottom = area.bottom() as f32;
        let left = area.x as f32;
        let right = (area.x + area.width) as f32;

        for i in 1..=GRID_LINES {
            let y = bottom - area.height as f32 * i as f32 / GRID_LINES as f32;
            canvas.line((left, y), (right, y), palette::GRID);
        }

        let slot = area.width as f64 / ClusterId::COUNT as f64;
        let bar_width = slot * GROUP_FILL / series_count.max(1) as f64;
        for (bar, &s) in bars.iter().zip(slots) {
            let group_start = area.x as f64 + slot * bar.cluster.index() as f64 + slot * (1.0 - GROUP_FILL) / 2.0;
            let x = group_start + bar_width * s as f64;
            let h = (bar.value / y_max * area.height as f64).round() as u32;
            canvas.fill_rect(
                x.round() as i32,
                (area.bottom() - h.min(area.height)) as i32,
                bar_width.floor().max(1.0) as u32,
                h.min(area.height),
                bar.color,
            );
        }

        canvas.line((left, bottom), (right, bottom), palette::AXIS);
        canvas.line((left, area.y as f32), (left, bottom), palette::AXIS);
        canvas.into_image()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CategoryCount;

    fn row(cluster: i64, category: Option<&str>, value: f64) -> CategoryCount {
        CategoryCount {
            cluster,
            category: category.map(str::to_string),
            value,
        }
    }

    fn chart() -> CategoryBarChart {
        CategoryBarChart::new(FigureSize { width: 300, height: 200 })
    }

    #[test]
    fn grouped_bars_color_by_category() {
        let table = CategoryCountTable {
            category_label: Some("Management Classification".into()),
            rows: vec![
                row(0, Some("DepEd"), 100.0),
                row(0, Some("Other"), 5.0),
                row(1, Some("DepEd"), 80.0),
                row(2, Some("Other"), 3.0),
            ],
        };
        let figure = chart().render(&table, "Management", "Number of Schools").unwrap();

        let bars = figure.bars();
        assert_eq!(bars.len(), 4);
        assert!(bars
            .iter()
            .filter(|b| b.category.as_deref() == Some("Other"))
            .all(|b| b.color == palette::series_color(1)));
        match figure.legend {
            Some(Legend::Swatches { ref entries, .. }) => assert_eq!(entries.len(), 2),
            ref other => panic!("unexpected legend {:?}", other),
        }
        assert_eq!(figure.axes.unwrap().x_ticks, vec!["1", "2", "3"]);
    }

    #[test]
    fn single_series_uses_cluster_colors_and_averages_duplicates() {
        let table = CategoryCountTable {
            category_label: None,
            rows: vec![row(0, None, 10.0), row(0, None, 20.0), row(2, None, 7.0)],
        };
        let figure = chart().render(&table, "SPED", "SPED Enrollees").unwrap();

        let bars = figure.bars();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].value, 15.0);
        assert_eq!(bars[1].color, palette::cluster_color(ClusterId::new(2).unwrap()));
        assert!(figure.legend.is_none());
    }

    #[test]
    fn rejects_bad_rows() {
        let empty = CategoryCountTable::default();
        assert!(matches!(chart().render(&empty, "t", "y"), Err(MapError::Value(_))));

        let negative = CategoryCountTable {
            category_label: None,
            rows: vec![row(0, None, -1.0)],
        };
        assert!(matches!(chart().render(&negative, "t", "y"), Err(MapError::Value(_))));

        let out_of_range = CategoryCountTable {
            category_label: None,
            rows: vec![row(5, None, 1.0)],
        };
        assert!(matches!(chart().render(&out_of_range, "t", "y"), Err(MapError::Range { .. })));
    }
}
