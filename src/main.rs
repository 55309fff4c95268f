use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod chart;
mod config;
mod db;
mod error;
mod flatten;
mod mailer;
mod metrics;
mod models;
mod normalize;
mod pipeline;
mod quality;
mod sheets;
mod weather;

#[derive(Parser)]
#[command(name = "codegrader-analytics")]
#[command(about = "Attempt analytics pipeline and forecast chart for the grader", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the destination table
    InitDb,
    /// Run the attempt analytics pipeline end to end
    Run,
    /// Fetch a weather forecast and render the two-panel chart
    Weather {
        /// Latitude, defaults to Saint Petersburg
        #[arg(long, default_value_t = 59.9386)]
        lat: f64,
        /// Longitude
        #[arg(long, default_value_t = 30.3141)]
        lon: f64,
        #[arg(long, default_value = "forecast.png")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codegrader_analytics=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?)
                .await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Run => {
            let config = config::PipelineConfig::from_env()?;
            let pool = connect(&config.database_url).await?;
            let pipeline = pipeline::Pipeline::new(config, pool)?;
            pipeline.run().await?;
            println!("Pipeline completed.");
        }
        Commands::Weather { lat, lon, out } => {
            let api_key = std::env::var("OWM_API_KEY").context("OWM_API_KEY must be set")?;
            let client = weather::WeatherClient::new(api_key)?;
            let forecast = client.fetch_forecast(lat, lon).await?;
            let points = weather::reshape_forecast(&forecast);
            chart::render_chart(&points, &out)?;
            println!("Chart written to {}.", out.display());
        }
    }

    Ok(())
}

async fn connect(database_url: &str) -> anyhow::Result<sqlx::PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}
