use order_server::{Config, Server, init_logger_with_file};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    let log_dir = format!("{}/logs", config.work_dir);
    let log_level = std::env::var("LOG_LEVEL").ok();
    init_logger_with_file(log_level.as_deref(), Some(&log_dir));

    tracing::info!(
        environment = %config.environment,
        timezone = %config.timezone,
        "order-server starting"
    );

    let server = Server::new(config);
    server.run().await.map_err(|e| anyhow::anyhow!("{e}"))?;

    Ok(())
}
