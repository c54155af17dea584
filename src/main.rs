use anyhow::Result;
use log::info;
use structopt::StructOpt;
use todolists_api::Config;

#[async_std::main]
async fn main() -> Result<()> {
    if std::env::var("APP_ENV").map_or(true, |env| env != "production") {
        dotenv::dotenv().ok();
    }
    let config = Config::from_args();

    tide::log::with_level(config.log_level);
    let app = todolists_api::create_app(&config).await?;

    info!("listening on {}", config.listen);
    app.listen(config.listen.clone()).await?;

    Ok(())
}
