use emaflow_refresher::{build_state, config::Config, init_tracing, scheduler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log_format);
    let state = build_state(&config).await?;
    let request = config.refresh_request();

    if config.run_once() {
        let summary = scheduler::run_once(&state, &request).await?;
        if !summary.is_success() {
            anyhow::bail!(
                "{} of {} assets failed to refresh",
                summary.failed,
                summary.assets.len()
            );
        }
        return Ok(());
    }

    scheduler::run_scheduled(state, request, config.refresh_interval).await;
    Ok(())
}
