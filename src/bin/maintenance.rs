use std::env;

use anyhow::{Context, Result};
use chrono::Utc;
use diesel::prelude::*;
use tracing_subscriber::EnvFilter;

use affiliate_backend::{
    auth::jwt::JwtService, config::AppConfig, db, documents::refresh_contract_statuses,
    models::User, schema::users,
};

const USAGE: &str = "Usage: maintenance refresh-statuses | issue-token <username>";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("refresh-statuses") => refresh_statuses()?,
        Some("issue-token") => match args.next() {
            Some(username) => issue_token(&username)?,
            None => {
                eprintln!("{USAGE}");
                std::process::exit(1);
            }
        },
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn connect(config: &AppConfig) -> Result<db::PgPool> {
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        pool_size = 1,
        "loaded backend configuration"
    );
    db::init_pool_with_size(&config.database_url, 1)
}

fn refresh_statuses() -> Result<()> {
    let config = AppConfig::from_env()?;
    let pool = connect(&config)?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let updated = refresh_contract_statuses(&mut conn, Utc::now().date_naive())
        .map_err(|err| anyhow::anyhow!("status refresh failed: {err}"))?;
    println!("Marked {updated} contracts as expired.");
    Ok(())
}

fn issue_token(username: &str) -> Result<()> {
    let config = AppConfig::from_env()?;
    let pool = connect(&config)?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let user: User = users::table
        .filter(users::username.eq(username))
        .first(&mut conn)
        .optional()
        .context("failed to look up user")?
        .with_context(|| format!("no user named {username}"))?;

    let jwt = JwtService::from_config(&config)?;
    println!("{}", jwt.generate_token(user.id, &user.username)?);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
