use crate::error::Result;
use crate::palette;
use crate::render::{
    extent, multipolygon_coords, Canvas, Figure, FigureSize, Layer, MarkerLayer, PlotArea,
    Projection,
};
use crate::types::{ClusterId, PointRecord, RegionBoundary};
use geo::Coord;
use tracing::debug;

const MARKER_HALF: f32 = 3.0;

/// Maps the schools of one cluster over a gray province backdrop.
#[derive(Debug, Clone, Default)]
pub struct ClusterPointFilter {
    pub size: FigureSize,
}

/// Points whose label equals the cluster id, in input order.
pub fn select(points: &[PointRecord], cluster: ClusterId) -> Vec<PointRecord> {
    points
        .iter()
        .filter(|p| p.cluster_label == cluster.label())
        .copied()
        .collect()
}

pub fn cluster_map_title(cluster: ClusterId) -> String {
    format!("Map of Schools in Cluster {}", cluster.display_number())
}

impl ClusterPointFilter {
    pub fn new(size: FigureSize) -> Self {
        Self { size }
    }

    pub fn render(&self, boundaries: &RegionBoundary, points: &[PointRecord], cluster_id: i64) -> Result<Figure> {
        let cluster = ClusterId::new(cluster_id)?;
        let selected = select(points, cluster);
        let color = palette::cluster_color(cluster);

        let area = PlotArea::for_figure(self.size.width, self.size.height, false);
        let bounds = extent(
            boundaries
                .regions
                .iter()
                .flat_map(|r| multipolygon_coords(&r.geometry))
                .chain(selected.iter().map(|p| Coord { x: p.longitude, y: p.latitude })),
        );
        let proj = Projection::fit(bounds, area);

        let mut canvas = Canvas::new(self.size.width, self.size.height);
        for region in &boundaries.regions {
            canvas.fill_multipolygon(&region.geometry, &proj, palette::BACKDROP);
        }
        for p in &selected {
            let pos = proj.to_pixel(Coord { x: p.longitude, y: p.latitude });
            canvas.draw_plus(pos, MARKER_HALF, color);
        }

        debug!(
            cluster = cluster.display_number(),
            points = selected.len(),
            of = points.len(),
            "Rendered cluster map"
        );

        Ok(Figure {
            title: cluster_map_title(cluster),
            image: canvas.into_image(),
            legend: None,
            axes: None,
            layers: vec![
                Layer::Backdrop { regions: boundaries.len() },
                Layer::Markers(MarkerLayer {
                    color,
                    points: selected.iter().map(PointRecord::point).collect(),
                }),
            ],
        })
    }
}
