use anyhow::Context;
use clap::Parser;
use otlp_relay::cli::CliArgs;
use otlp_relay::config::Config;
use otlp_relay::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    telemetry::init_tracing(args.verbose);

    let config = Config::load(&args.config)
        .with_context(|| format!("invalid configuration {}", args.config.display()))?;

    if args.check {
        println!("configuration OK: {}", args.config.display());
        return Ok(());
    }

    otlp_relay::run(config).await
}
