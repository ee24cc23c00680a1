use std::env;

use anyhow::{Context, Result};
use url::Url;

use crate::db::DEFAULT_MAX_POOL_SIZE;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_DOWNLOAD_URL_EXPIRY_SECONDS: u64 = 300;
pub const DEFAULT_EMPLOYER_CACHE_TTL_SECONDS: u64 = 3600;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_pool_size: u32,
    pub server_host: String,
    pub server_port: u16,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub jwt_expiry_minutes: i64,
    pub cors_allowed_origin: Option<String>,
    pub aws_endpoint_url: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_region: String,
    pub s3_bucket: String,
    pub max_upload_bytes: usize,
    pub download_url_expiry_seconds: u64,
    pub employer_cache_ttl_seconds: u64,
    pub pdfium_library_path: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_pool_size = env::var("DATABASE_MAX_POOL_SIZE")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_MAX_POOL_SIZE);
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port = parse_or_default("SERVER_PORT", 3000u16, "SERVER_PORT must be a valid u16")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let jwt_issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "affiliate-backend".to_string());
        let jwt_audience =
            env::var("JWT_AUDIENCE").unwrap_or_else(|_| "affiliate-clients".to_string());
        let jwt_expiry_minutes = parse_or_default(
            "JWT_EXPIRY_MINUTES",
            60i64,
            "JWT_EXPIRY_MINUTES must be an integer",
        )?;
        let cors_allowed_origin = optional_var("CORS_ALLOWED_ORIGIN");
        let aws_endpoint_url = optional_var("AWS_ENDPOINT_URL");
        let aws_access_key_id = optional_var("AWS_ACCESS_KEY_ID");
        let aws_secret_access_key = optional_var("AWS_SECRET_ACCESS_KEY");
        let aws_region = env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let s3_bucket = env::var("S3_BUCKET").context("S3_BUCKET must be set")?;
        let max_upload_bytes = parse_or_default(
            "MAX_UPLOAD_BYTES",
            DEFAULT_MAX_UPLOAD_BYTES,
            "MAX_UPLOAD_BYTES must be a positive integer",
        )?;
        let download_url_expiry_seconds = parse_or_default(
            "DOWNLOAD_URL_EXPIRY_SECONDS",
            DEFAULT_DOWNLOAD_URL_EXPIRY_SECONDS,
            "DOWNLOAD_URL_EXPIRY_SECONDS must be an integer",
        )?;
        let employer_cache_ttl_seconds = parse_or_default(
            "EMPLOYER_CACHE_TTL_SECONDS",
            DEFAULT_EMPLOYER_CACHE_TTL_SECONDS,
            "EMPLOYER_CACHE_TTL_SECONDS must be an integer",
        )?;
        let pdfium_library_path = optional_var("PDFIUM_LIBRARY_PATH");

        Ok(Self {
            database_url,
            database_max_pool_size,
            server_host,
            server_port,
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            jwt_expiry_minutes,
            cors_allowed_origin,
            aws_endpoint_url,
            aws_access_key_id,
            aws_secret_access_key,
            aws_region,
            s3_bucket,
            max_upload_bytes,
            download_url_expiry_seconds,
            employer_cache_ttl_seconds,
            pdfium_library_path,
        })
    }

    pub fn redacted_database_url(&self) -> String {
        redact_database_url(&self.database_url)
    }
}

/// Unset and blank variables are both treated as absent.
fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or_default<T: std::str::FromStr>(key: &str, default: T, message: &'static str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().context(message),
        Err(_) => Ok(default),
    }
}

fn redact_database_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("*****"));
            }
            parsed.to_string()
        }
        Err(_) => "***".to_string(),
    }
}
