//! Topic pages of the dashboard and the router that dispatches between them.

use crate::assets::{load_asset, Asset};
use crate::charts::CategoryBarChart;
use crate::choropleth::ChoroplethRenderer;
use crate::clusters::ClusterPointFilter;
use crate::config::AppConfig;
use crate::data;
use crate::error::{MapError, Result};
use crate::join::join;
use crate::render::Figure;
use crate::types::ClusterId;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    Introduction,
    DataInformation,
    Methodology,
    Eda,
    ClusterAnalysis,
    OtherClusterInsights,
    Conclusions,
}

impl Topic {
    pub const ALL: [Topic; 7] = [
        Topic::Introduction,
        Topic::DataInformation,
        Topic::Methodology,
        Topic::Eda,
        Topic::ClusterAnalysis,
        Topic::OtherClusterInsights,
        Topic::Conclusions,
    ];

    /// Name shown in the sidebar.
    pub fn title(self) -> &'static str {
        match self {
            Topic::Introduction => "Introduction",
            Topic::DataInformation => "Data Information",
            Topic::Methodology => "Methodology",
            Topic::Eda => "EDA",
            Topic::ClusterAnalysis => "Cluster Analysis",
            Topic::OtherClusterInsights => "Other Cluster Insights",
            Topic::Conclusions => "Conclusions and Recommendations",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Topic::Introduction => "introduction",
            Topic::DataInformation => "data-information",
            Topic::Methodology => "methodology",
            Topic::Eda => "eda",
            Topic::ClusterAnalysis => "cluster-analysis",
            Topic::OtherClusterInsights => "other-cluster-insights",
            Topic::Conclusions => "conclusions",
        }
    }
}

impl FromStr for Topic {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Topic::ALL
            .into_iter()
            .find(|t| t.slug().eq_ignore_ascii_case(s) || t.title().eq_ignore_ascii_case(s))
            .ok_or_else(|| MapError::Range {
                what: "topic",
                value: s.to_string(),
                expected: Topic::ALL.iter().map(|t| t.slug()).collect::<Vec<_>>().join(", "),
            })
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// One item of page content handed to the display sink.
#[derive(Debug, Clone)]
pub enum Block {
    Title(String),
    Subheader(String),
    Text(String),
    Asset(Asset),
    Figure(Figure),
}

impl Block {
    pub fn as_figure(&self) -> Option<&Figure> {
        match self {
            Block::Figure(f) => Some(f),
            _ => None,
        }
    }
}

/// Inputs for one page render: configuration plus the reader's cluster choice.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub config: &'a AppConfig,
    pub cluster: ClusterId,
}

pub trait Page: Send + Sync {
    fn render(&self, ctx: &PageContext<'_>) -> Result<Vec<Block>>;
}

enum Content {
    Subheader(&'static str),
    Text(&'static str),
    Asset(&'static str),
}

/// Prose and illustrations only.
struct StaticPage {
    title: &'static str,
    content: &'static [Content],
}

impl Page for StaticPage {
    fn render(&self, ctx: &PageContext<'_>) -> Result<Vec<Block>> {
        let mut blocks = vec![Block::Title(self.title.to_string())];
        for item in self.content {
            blocks.push(match item {
                Content::Subheader(s) => Block::Subheader(s.to_string()),
                Content::Text(s) => Block::Text(s.to_string()),
                Content::Asset(name) => Block::Asset(load_asset(&ctx.config.input.assets_dir, name)?),
            });
        }
        Ok(blocks)
    }
}

const INTRODUCTION: StaticPage = StaticPage {
    title: "Allocation of Resources for School Congestion in Elementary Schools",
    content: &[
        Content::Text(
            "The Philippine Development Plan 2017-2022 calls for increasing investments in \
             education and extending opportunities to those outside formal education.",
        ),
        Content::Asset("increasinginvestments.png"),
        Content::Asset("extendingopportunities.png"),
        Content::Text(
            "We asked how the Department of Education can target its resources to address \
             congestion in elementary schools.",
        ),
        Content::Asset("overpop.png"),
        Content::Text(
            "Congestion is captured by three indicators: student-teacher ratio, students per \
             room and MOOE per student. Clustering schools on these features shows where \
             resources are needed most.",
        ),
    ],
};

const DATA_INFORMATION: StaticPage = StaticPage {
    title: "Data Information",
    content: &[
        Content::Asset("datainfo1.png"),
        Content::Text(
            "Public 2015 Department of Education data: the school masterlist with teachers, \
             MOOE, rooms, location and enrollment by gender, grade level and class type.",
        ),
        Content::Asset("datainfo2.png"),
        Content::Text(
            "The merged master table was filtered to elementary schools and outliers were \
             removed before computing the ratios.",
        ),
    ],
};

const METHODOLOGY: StaticPage = StaticPage {
    title: "Methodology",
    content: &[
        Content::Asset("methodology.png"),
        Content::Text(
            "Zero and missing values were dropped, three ratio features were engineered, \
             outliers removed and the data scaled.",
        ),
        Content::Text(
            "Hierarchical clustering and KMeans were compared; KMeans with 3 clusters was \
             chosen on silhouette score and cluster balance.",
        ),
    ],
};

const CONCLUSIONS: StaticPage = StaticPage {
    title: "Conclusions and Recommendations",
    content: &[
        Content::Asset("conclusion.jpg"),
        Content::Subheader("Regarding the Philippine Education Based on the Data Insights"),
        Content::Text("Consider giving more resources to urban areas given their higher school congestion."),
        Content::Text("Examine reasons for low congestion in rural areas."),
        Content::Text("Address the low incidence of SPED enrollees in rural areas."),
        Content::Subheader("Regarding the Machine Learning Aspect"),
        Content::Text("Look into other features that may better separate schools."),
        Content::Text("Experiment with other clustering hyperparameters and algorithms."),
    ],
};

/// One choropleth per configured metric.
struct EdaPage;

impl Page for EdaPage {
    fn render(&self, ctx: &PageContext<'_>) -> Result<Vec<Block>> {
        let cfg = ctx.config;
        let boundaries = data::load_boundaries(&cfg.input.boundaries)?;
        let metrics = data::load_metric_table(&cfg.eda.table)?;
        let joined = join(&boundaries, &metrics, &cfg.input.boundary_key, &cfg.eda.key_column)?;
        let renderer = ChoroplethRenderer::new(cfg.output.size);

        let mut blocks = vec![Block::Title("Exploratory Data Analysis".to_string())];
        for map in &cfg.eda.maps {
            blocks.push(Block::Subheader(map.subheader.clone()));
            blocks.push(Block::Figure(renderer.render(&joined, &map.column, &map.title)?));
        }
        Ok(blocks)
    }
}

const CLUSTER_PROFILES: [(&str, &str); ClusterId::COUNT] = [
    (
        "Cluster 1: Schools with low demand & high resources",
        "Mostly rural; low student-teacher ratio, low students per room, high MOOE per student.",
    ),
    (
        "Cluster 2: Schools with high demand & low resources",
        "Mostly urban; high student-teacher ratio, high students per room, low MOOE per student.",
    ),
    (
        "Cluster 3: Schools with moderate demand & resources",
        "Urban and rural; moderate on all three indicators.",
    ),
];

const CLUSTER_NOTES: [&str; ClusterId::COUNT] = [
    "Cluster 1 is abundant in upper Luzon and Western & Eastern Visayas. It is least common in NCR.",
    "Cluster 2 is concentrated in urban provinces around NCR and other city centers.",
    "Cluster 3 is abundant in upper Luzon and Western & Eastern Visayas.",
];

/// Cluster profiles plus the map of the selected cluster.
struct ClusterAnalysisPage;

impl Page for ClusterAnalysisPage {
    fn render(&self, ctx: &PageContext<'_>) -> Result<Vec<Block>> {
        let cfg = ctx.config;
        let mut blocks = vec![
            Block::Title("Cluster Analysis".to_string()),
            Block::Asset(load_asset(&cfg.input.assets_dir, "spider_clusters.png")?),
        ];
        for (heading, profile) in CLUSTER_PROFILES {
            blocks.push(Block::Subheader(heading.to_string()));
            blocks.push(Block::Text(profile.to_string()));
        }

        let boundaries = data::load_boundaries(&cfg.input.boundaries)?;
        let points = data::load_points(
            &cfg.clusters.points,
            &cfg.clusters.longitude_column,
            &cfg.clusters.latitude_column,
            &cfg.clusters.label_column,
        )?;
        let figure = ClusterPointFilter::new(cfg.output.size).render(&boundaries, &points, ctx.cluster.label())?;

        blocks.push(Block::Subheader("Mapping schools belonging to the different clusters".to_string()));
        blocks.push(Block::Figure(figure));
        blocks.push(Block::Text(CLUSTER_NOTES[ctx.cluster.index()].to_string()));
        Ok(blocks)
    }
}

/// Category breakdowns per cluster.
struct InsightsPage;

impl Page for InsightsPage {
    fn render(&self, ctx: &PageContext<'_>) -> Result<Vec<Block>> {
        let chart = CategoryBarChart::new(ctx.config.output.size);
        let mut blocks = vec![Block::Title("Other Cluster Insights".to_string())];

        for chart_config in &ctx.config.insights.charts {
            let mut table = data::load_category_counts(
                &chart_config.table,
                &chart_config.cluster_column,
                chart_config.category_column.as_deref(),
                &chart_config.value_column,
            )?;
            if chart_config.category_label.is_some() {
                table.category_label = chart_config.category_label.clone();
            }
            if let Some(subheader) = &chart_config.subheader {
                blocks.push(Block::Subheader(subheader.clone()));
            }
            blocks.push(Block::Figure(chart.render(&table, &chart_config.title, &chart_config.y_label)?));
        }
        Ok(blocks)
    }
}

/// Maps every topic to its page handler.
pub struct PageRouter {
    pages: HashMap<Topic, Box<dyn Page>>,
}

impl Default for PageRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl PageRouter {
    pub fn new() -> Self {
        let mut pages: HashMap<Topic, Box<dyn Page>> = HashMap::new();
        pages.insert(Topic::Introduction, Box::new(INTRODUCTION));
        pages.insert(Topic::DataInformation, Box::new(DATA_INFORMATION));
        pages.insert(Topic::Methodology, Box::new(METHODOLOGY));
        pages.insert(Topic::Eda, Box::new(EdaPage));
        pages.insert(Topic::ClusterAnalysis, Box::new(ClusterAnalysisPage));
        pages.insert(Topic::OtherClusterInsights, Box::new(InsightsPage));
        pages.insert(Topic::Conclusions, Box::new(CONCLUSIONS));
        Self { pages }
    }

    pub fn dispatch(&self, topic: Topic, ctx: &PageContext<'_>) -> Result<Vec<Block>> {
        let page = self.pages.get(&topic).ok_or_else(|| MapError::Range {
            what: "topic",
            value: topic.slug().to_string(),
            expected: "a registered page".to_string(),
        })?;
        info!(topic = topic.slug(), cluster = ctx.cluster.display_number(), "Rendering page");
        page.render(ctx)
    }
}
