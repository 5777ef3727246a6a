use clap::Parser;
use poly_updown::cli::{render_config, Cli, Commands};
use poly_updown::config::Config;
use poly_updown::observer::ActivityLog;
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = if Path::new(&cli.config).exists() {
        Config::load(&cli.config)?
    } else {
        eprintln!("Warning: {} not found, using default configuration", cli.config);
        Config::default()
    };
    config.apply_env();

    let activity = ActivityLog::new(config.telemetry.activity_capacity);
    let _telemetry = poly_updown::telemetry::init_telemetry(&config.telemetry, activity.clone())?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!(config = %cli.config, "Starting poly-updown");
            args.execute(config, activity).await?;
        }
        Commands::Status(args) => {
            args.execute(&config.state.path)?;
        }
        Commands::Config => {
            print!("{}", render_config(&config)?);
        }
    }

    Ok(())
}
