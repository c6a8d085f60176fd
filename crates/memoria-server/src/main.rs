mod config;
mod embed;
mod http;
mod providers;
mod serve;

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = Config::load();
    config.ensure_data_dir()?;

    serve::run(config).await
}
