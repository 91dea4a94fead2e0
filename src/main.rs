use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use school_cluster_atlas::config::AppConfig;
use school_cluster_atlas::pages::{Block, PageContext, PageRouter, Topic};
use school_cluster_atlas::server;
use school_cluster_atlas::types::ClusterId;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render page figures to PNG files
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// Topic title or slug; every topic when omitted
        #[arg(short, long)]
        topic: Option<String>,
        /// Cluster to map (1-3)
        #[arg(long, default_value_t = 1)]
        cluster: i64,
    },
    /// Serve the dashboard pages over HTTP
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render { config, topic, cluster } => {
            info!("Rendering with config: {:?}", config);
            let app_config = AppConfig::load_from_file(&config)?;
            let cluster = ClusterId::from_display_number(cluster)?;
            let topics = match topic {
                Some(name) => vec![name.parse::<Topic>()?],
                None => Topic::ALL.to_vec(),
            };

            fs::create_dir_all(&app_config.output.dir)
                .with_context(|| format!("Failed to create output directory {:?}", app_config.output.dir))?;

            let router = PageRouter::new();
            let ctx = PageContext {
                config: &app_config,
                cluster,
            };

            // Topics are independent; one failing page does not stop the rest.
            let failures = topics
                .par_iter()
                .filter_map(|&topic| match render_topic(&router, topic, &ctx) {
                    Ok(written) => {
                        info!(topic = topic.slug(), figures = written, "Rendered topic");
                        None
                    }
                    Err(e) => {
                        error!(topic = topic.slug(), "Failed to render: {:#}", e);
                        Some(topic)
                    }
                })
                .count();

            if failures > 0 {
                return Err(anyhow!("{} of {} topics failed to render", failures, topics.len()));
            }
            info!("Rendering complete!");
        }
        Commands::Serve { config } => {
            info!("Serving dashboard with config: {:?}", config);
            let app_config = AppConfig::load_from_file(&config)?;
            server::start_server(app_config).await?;
        }
    }

    Ok(())
}

fn render_topic(router: &PageRouter, topic: Topic, ctx: &PageContext<'_>) -> anyhow::Result<usize> {
    let blocks = router.dispatch(topic, ctx)?;
    let mut written = 0;
    for figure in blocks.iter().filter_map(Block::as_figure) {
        let path = figure_path(&ctx.config.output.dir, topic, written);
        figure
            .save(&path)
            .with_context(|| format!("Failed to save figure {:?}", path))?;
        written += 1;
    }
    Ok(written)
}

fn figure_path(dir: &Path, topic: Topic, index: usize) -> PathBuf {
    dir.join(format!("{}-{}.png", topic.slug(), index + 1))
}
