use loginflow_infra::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    loginflow_observability::init();

    let config = Config::from_env()?;
    if config.use_in_memory {
        tracing::warn!("LOGIN_USE_IN_MEMORY set; serving the in-memory identity service");
    }

    let state = loginflow_api::app::services::AppState::from_config(&config)?;
    let app = loginflow_api::app::build_app(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
