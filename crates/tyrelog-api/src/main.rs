use tyrelog_core::Config;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (_state, router) = tyrelog_api::setup::initialize_app(config.clone()).await?;

    tyrelog_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
