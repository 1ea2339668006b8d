mod alerts;
mod config;
mod confidence;
mod history;
mod indicators;
mod levels;
mod market_data;
mod metrics;
mod pipeline;
mod policy;
mod types;

use alerts::sink_from_config;
use clap::Parser;
use config::ScannerConfig;
use dotenv::dotenv;
use market_data::GateFeed;
use pipeline::ScanPipeline;
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use warp::Filter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // CLI options
    #[derive(Parser, Debug)]
    #[command(
        name = "spot_signal_engine",
        about = "Spot market scanner: indicators, confidence scoring, rate-limited alerts"
    )]
    struct Opt {
        /// Exchange REST API base URL
        #[arg(long, default_value = "https://api.gateio.ws/api/v4")]
        api_base: String,
        /// Override SCAN_INTERVAL_MINUTES from the environment
        #[arg(long)]
        scan_interval_minutes: Option<u64>,
        /// HTTP port for metrics & health endpoints
        #[arg(long, default_value_t = 9090)]
        metrics_port: u16,
        /// Run a single scan cycle and exit
        #[arg(long)]
        once: bool,
    }
    let opt = Opt::parse();

    let mut config = ScannerConfig::from_env()?;
    if let Some(minutes) = opt.scan_interval_minutes {
        config.scan_interval_minutes = minutes;
    }
    config.display();

    let feed = Arc::new(GateFeed::new(&opt.api_base)?);
    let sink = sink_from_config(config.alert_webhook_url.as_deref())?;
    let scan_interval = Duration::from_secs(config.scan_interval_minutes.max(1) * 60);
    let pipeline = Arc::new(ScanPipeline::new(config, feed, sink));

    if opt.once {
        pipeline.run_cycle().await;
        return Ok(());
    }

    // Scan loop: one cycle per tick, overlap handled by the pipeline's guard
    {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(scan_interval);
            loop {
                interval.tick().await;
                pipeline.run_cycle().await;
            }
        });
    }

    // Metrics & health endpoints
    let metrics_route = {
        let metrics = warp::path("metrics").map(|| {
            let mut buffer = Vec::new();
            let encoder = TextEncoder::new();
            let mf = prometheus::gather();
            encoder.encode(&mf, &mut buffer).unwrap();
            warp::http::Response::builder()
                .header("content-type", encoder.format_type())
                .body(buffer)
                .unwrap()
        });
        let healthz = warp::path("healthz").map(|| {
            warp::http::Response::builder()
                .status(warp::http::StatusCode::OK)
                .body("OK")
                .unwrap()
        });
        metrics.or(healthz).boxed()
    };
    tokio::spawn(warp::serve(metrics_route).run(([0, 0, 0, 0], opt.metrics_port)));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(())
}
