use std::fs;
use std::path::Path;

use anyhow::Result;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;

mod models;
mod repositories;
mod rules;
pub mod services;
pub mod settings;
pub mod utils;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    /// Overrides `http.listen` from the config file.
    #[arg(short, long)]
    listen: Option<String>,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    init_logging(&args.log4rs)?;

    let mut settings = settings::Settings::new(&args.config)
        .map_err(|e| anyhow::anyhow!("Could not load config file: {}", e))?;
    if let Some(listen) = args.listen {
        settings.http.listen = listen;
    }

    let pool = PgPoolOptions::new()
        .max_connections(settings.postgres.max_connections)
        .connect(&settings.postgres.url)
        .await?;
    log::info!("Connected to database.");

    sqlx::migrate!("./migrations").run(&pool).await?;
    log::info!("Migrations applied.");

    services::seed(&pool, &settings).await?;

    log::info!("Starting services.");
    services::start_services(pool, settings).await
}

fn init_logging(path: &str) -> Result<(), anyhow::Error> {
    if !Path::new("logs").exists() {
        fs::create_dir("logs")?;
    }

    match log4rs::init_file(path, Default::default()) {
        Ok(_) => {
            println!("[*] Logging initialized successfully.");
            Ok(())
        }
        Err(e) => {
            println!("[ERROR] Failed to initialize logging: {}", e);
            Err(anyhow::anyhow!("Could not initialize logging: {}", e))
        }
    }
}
