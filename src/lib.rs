use anyhow::{Context, Result};
use http_types::headers::HeaderValue;
use log::{info, LevelFilter};
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use structopt::StructOpt;
use tide::{
    security::{CorsMiddleware, Origin},
    Response, Server,
};

pub mod auth;
pub mod db;
pub mod graphql;
pub mod memory;

#[derive(Debug, Clone, StructOpt)]
#[structopt(name = "todolists_api", about = "GraphQL API for todo lists and their items")]
pub struct Config {
    /// PostgreSQL connection string, required unless --in-memory is true
    #[structopt(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,
    /// Keep everything in process memory instead of PostgreSQL
    #[structopt(
        long,
        env = "IN_MEMORY",
        parse(try_from_str),
        default_value = "false"
    )]
    pub in_memory: bool,
    #[structopt(long, env = "MAX_CONNECTIONS", default_value = "5")]
    pub max_connections: u32,
    #[structopt(long, env = "LISTEN", default_value = "0.0.0.0:3030")]
    pub listen: String,
    /// Directory served as static files, with index.html at /
    #[structopt(long, env = "PUBLIC_DIR", default_value = "public", parse(from_os_str))]
    pub public_dir: PathBuf,
    #[structopt(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LevelFilter,
}

pub async fn open_store(config: &Config) -> Result<db::Store> {
    if config.in_memory {
        info!("using the in-memory store");
        return Ok(db::Store::Memory(memory::Memory::default()));
    }

    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set unless IN_MEMORY is true")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(database_url)
        .await
        .context("could not connect to the database")?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("could not migrate the database")?;
    info!("connected to PostgreSQL");

    Ok(db::Store::Postgres(pool))
}

pub async fn create_app(config: &Config) -> Result<Server<graphql::State>> {
    let store = open_store(config).await?;

    let mut app = tide::with_state(graphql::State::new(store));

    app.with(
        CorsMiddleware::new()
            .allow_methods(
                "GET, POST, OPTIONS"
                    .parse::<HeaderValue>()
                    .expect("could not parse as HTTP header value"),
            )
            .allow_origin(Origin::from("*"))
            .allow_credentials(false),
    );

    app.at("/healthz").get(|_| async { Ok(Response::new(204)) });
    app.at("/graphql")
        .post(graphql::handle_graphql)
        .get(graphql::handle_graphiql);
    app.at("/api/v1/auth/session").post(auth::handle_session);

    let public = &config.public_dir;
    app.at("/")
        .serve_file(public.join("index.html"))
        .with_context(|| format!("could not serve {}", public.display()))?;
    app.at("/")
        .serve_dir(public)
        .with_context(|| format!("could not serve {}", public.display()))?;

    Ok(app)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn in_memory_is_read_from_the_environment() {
        std::env::set_var("IN_MEMORY", "true");
        let from_env = Config::from_iter(&["todolists_api"]);
        let overridden = Config::from_iter(&["todolists_api", "--in-memory", "false"]);
        std::env::remove_var("IN_MEMORY");

        assert_eq!((from_env.in_memory, overridden.in_memory), (true, false));
    }
}
