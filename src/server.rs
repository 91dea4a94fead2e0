use crate::config::AppConfig;
use crate::error::MapError;
use crate::pages::{Block, PageContext, PageRouter, Topic};
use crate::render::{AxisLabels, Legend};
use crate::types::ClusterId;
use anyhow::Result;
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{info, warn};

pub struct AppState {
    pub config: AppConfig,
    pub router: PageRouter,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    /// 1-indexed cluster number as shown to readers.
    cluster: Option<i64>,
}

#[derive(Serialize)]
pub struct TopicInfo {
    slug: &'static str,
    title: &'static str,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockView {
    Title { text: String },
    Subheader { text: String },
    Text { text: String },
    Image { url: String },
    Figure {
        url: String,
        title: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        legend: Option<Legend>,
        #[serde(skip_serializing_if = "Option::is_none")]
        axes: Option<AxisLabels>,
    },
}

#[derive(Serialize)]
pub struct PageView {
    topic: TopicInfo,
    cluster: u8,
    blocks: Vec<BlockView>,
}

pub struct ApiError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

impl From<MapError> for ApiError {
    fn from(err: MapError) -> Self {
        let status = match &err {
            MapError::Range { .. } => StatusCode::BAD_REQUEST,
            MapError::Schema { .. } | MapError::Value(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(%err, status = status.as_u16(), "Render failed");
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: rejection.body_text(),
        }
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    let assets = ServeDir::new(&state.config.input.assets_dir);
    Router::new()
        .route("/api/topics", get(topics_handler))
        .route("/api/pages/:topic", get(page_handler))
        .route("/api/pages/:topic/figures/:index", get(figure_handler))
        .nest_service("/assets", assets)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AppConfig) -> Result<()> {
    let port = config.server.port;
    let state = Arc::new(AppState {
        config,
        router: PageRouter::new(),
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn topics_handler() -> Json<Vec<TopicInfo>> {
    Json(
        Topic::ALL
            .iter()
            .map(|t| TopicInfo {
                slug: t.slug(),
                title: t.title(),
            })
            .collect(),
    )
}

/// Renders a page on the blocking pool; each call reloads its inputs.
async fn render_page(state: Arc<AppState>, topic: String, params: PageParams) -> Result<(Topic, ClusterId, Vec<Block>), ApiError> {
    let topic: Topic = topic.parse()?;
    let cluster = match params.cluster {
        Some(n) => ClusterId::from_display_number(n)?,
        None => ClusterId::default(),
    };

    let blocks = tokio::task::spawn_blocking(move || {
        let ctx = PageContext {
            config: &state.config,
            cluster,
        };
        state.router.dispatch(topic, &ctx)
    })
    .await
    .map_err(|e| ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: format!("render task failed: {}", e),
    })??;

    Ok((topic, cluster, blocks))
}

async fn page_handler(
    State(state): State<Arc<AppState>>,
    Path(topic): Path<String>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<PageView>, ApiError> {
    let Query(params) = params?;
    let (topic, cluster, blocks) = render_page(state, topic, params).await?;

    let mut figure_index = 0;
    let views = blocks
        .into_iter()
        .map(|block| match block {
            Block::Title(text) => BlockView::Title { text },
            Block::Subheader(text) => BlockView::Subheader { text },
            Block::Text(text) => BlockView::Text { text },
            Block::Asset(asset) => BlockView::Image {
                url: format!("/assets/{}", asset.name),
            },
            Block::Figure(figure) => {
                let url = format!(
                    "/api/pages/{}/figures/{}?cluster={}",
                    topic.slug(),
                    figure_index,
                    cluster.display_number()
                );
                figure_index += 1;
                BlockView::Figure {
                    url,
                    title: figure.title,
                    legend: figure.legend,
                    axes: figure.axes,
                }
            }
        })
        .collect();

    Ok(Json(PageView {
        topic: TopicInfo {
            slug: topic.slug(),
            title: topic.title(),
        },
        cluster: cluster.display_number(),
        blocks: views,
    }))
}

async fn figure_handler(
    State(state): State<Arc<AppState>>,
    Path((topic, index)): Path<(String, usize)>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params?;
    let (topic, _, blocks) = render_page(state, topic, params).await?;
    let count = blocks.iter().filter_map(Block::as_figure).count();
    let figure = blocks
        .iter()
        .filter_map(Block::as_figure)
        .nth(index)
        .ok_or_else(|| ApiError::from(MapError::Range {
            what: "figure index",
            value: index.to_string(),
            expected: format!("fewer than {} on {}", count, topic.slug()),
        }))?;

    let png = figure.to_png()?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}
