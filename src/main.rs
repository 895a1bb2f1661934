use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use tickstats::args::Args;
use tickstats::feed::EventFeed;
use tickstats::runtime::{self, RuntimeConfig};
use tickstats::{Config, Pipeline, PipelineOptions, WsSource, create_default_config, logging};

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = logging::init_logging(args.log_file.as_deref());

    if args.write_default_config {
        let config_toml = toml::to_string_pretty(&create_default_config())?;
        std::fs::write(args.config.as_str(), &config_toml)
            .with_context(|| format!("Failed to write config file '{}'", args.config))?;
        info!("Wrote default config file: {}", args.config);
        return Ok(());
    }

    let (mut config, _source) = runtime::load_and_log_config(args.config.as_str())?;
    args.apply_to(&mut config);
    // Command-line overrides bypass the file's validation
    config.validate()?;

    let rt = RuntimeConfig::from_args(Some(config.server.threads)).build_runtime()?;
    rt.block_on(run(args, config))
}

async fn run(args: Args, config: Config) -> Result<()> {
    let feed_path = args
        .feed_path(&config)
        .context("No event feed given: pass FEED or set feed.path in the config file")?;
    let feed = EventFeed::open(&feed_path)
        .await
        .with_context(|| format!("Failed to open event feed '{}'", feed_path.display()))?;

    let source = WsSource::bind(&config.server.listen_addr()).await?;
    info!("Publishing metrics on ws://{}", source.local_addr());
    if config.pipeline.start_on_subscribe {
        info!("Replay of '{}' starts when the first subscriber connects", feed_path.display());
    }

    let mut options = PipelineOptions::from(&config);
    options.exit_after_feed = args.exit_after_feed;
    let pipeline = Pipeline::new(options);

    runtime::spawn_shutdown_handler(pipeline.shutdown_token());
    runtime::spawn_metrics_logger(pipeline.metrics(), pipeline.shutdown_token());

    match pipeline.run(feed.into_stream(), source).await {
        Ok(report) => {
            info!("Run complete: {}", report);
            info!("Final metrics: {}", report.metrics);
            Ok(())
        }
        Err(e) => {
            error!("Pipeline failed: {}", e);
            Err(e.into())
        }
    }
}
