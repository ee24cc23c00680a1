pub mod access;
pub mod affiliates;
pub mod audit;
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod documents;
pub mod error;
pub mod extract;
pub mod folders;
pub mod models;
pub mod officers;
pub mod routes;
pub mod schema;
pub mod search;
pub mod state;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::{
        AppConfig, DEFAULT_DOWNLOAD_URL_EXPIRY_SECONDS, DEFAULT_EMPLOYER_CACHE_TTL_SECONDS,
        DEFAULT_MAX_UPLOAD_BYTES,
    };

    pub fn config() -> AppConfig {
        AppConfig {
            database_url: "postgres://localhost/affiliates_test".into(),
            database_max_pool_size: 1,
            server_host: "127.0.0.1".into(),
            server_port: 0,
            jwt_secret: "unit-test-secret".into(),
            jwt_issuer: "affiliate-backend".into(),
            jwt_audience: "affiliate-clients".into(),
            jwt_expiry_minutes: 5,
            cors_allowed_origin: None,
            aws_endpoint_url: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_region: "us-east-1".into(),
            s3_bucket: "documents".into(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            download_url_expiry_seconds: DEFAULT_DOWNLOAD_URL_EXPIRY_SECONDS,
            employer_cache_ttl_seconds: DEFAULT_EMPLOYER_CACHE_TTL_SECONDS,
            pdfium_library_path: None,
        }
    }
}
