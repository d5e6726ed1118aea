use clap::Parser;
use ferry_ridership::cli::{run, Cli};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ferry_forecast=info,ferry_ridership=info".into()),
        )
        .init();

    let report = run(Cli::parse())?;
    println!("{}", report);
    Ok(())
}
