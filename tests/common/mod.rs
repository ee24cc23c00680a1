use std::collections::HashMap;
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use affiliate_backend::access::{ROLE_MEMBER, ROLE_OFFICER};
use affiliate_backend::auth::jwt::JwtService;
use affiliate_backend::config::AppConfig;
use affiliate_backend::db::{self, PgPool};
use affiliate_backend::extract::{ExtractionError, TextExtractor};
use affiliate_backend::models::{NewAffiliate, NewMember, NewRoleGrant, NewUser};
use affiliate_backend::routes;
use affiliate_backend::schema::{affiliates, members, role_grants, roles, users};
use affiliate_backend::state::AppState;
use affiliate_backend::storage::BlobStore;
use anyhow::{anyhow, ensure, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[allow(dead_code)]
#[derive(Clone)]
pub struct StoredObject {
    pub path: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

#[async_trait]
impl BlobStore for FakeStorage {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: Option<String>) -> Result<()> {
        ensure!(!self.fail_puts.load(Ordering::SeqCst), "bucket rejected {path}");
        let stored = StoredObject {
            path: path.to_string(),
            bytes,
            content_type,
        };
        let mut guard = self.objects.lock().await;
        guard.insert(stored.path.clone(), stored);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let guard = self.objects.lock().await;
        guard
            .get(path)
            .map(|obj| obj.bytes.clone())
            .ok_or_else(|| anyhow!("object {path} missing"))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        ensure!(!self.fail_deletes.load(Ordering::SeqCst), "bucket refused to delete {path}");
        let mut guard = self.objects.lock().await;
        guard.remove(path);
        Ok(())
    }

    async fn temporary_url(
        &self,
        path: &str,
        download_name: &str,
        expires_in: Duration,
    ) -> Result<String> {
        let guard = self.objects.lock().await;
        ensure!(guard.contains_key(path), "object {path} missing");
        Ok(format!(
            "https://fake-storage/{path}?expires_in={}&name={download_name}",
            expires_in.as_secs()
        ))
    }
}

impl FakeStorage {
    #[allow(dead_code)]
    pub async fn contains(&self, path: &str) -> bool {
        let guard = self.objects.lock().await;
        guard.contains_key(path)
    }

    #[allow(dead_code)]
    pub fn fail_puts(&self, failing: bool) {
        self.fail_puts.store(failing, Ordering::SeqCst);
    }

    #[allow(dead_code)]
    pub fn fail_deletes(&self, failing: bool) {
        self.fail_deletes.store(failing, Ordering::SeqCst);
    }

    #[allow(dead_code)]
    pub async fn object_count(&self) -> usize {
        let guard = self.objects.lock().await;
        guard.len()
    }
}

/// Treats every upload as UTF-8 text, so tests control the "extracted"
/// content by choosing the file bytes.
pub struct FakeExtractor;

#[async_trait]
impl TextExtractor for FakeExtractor {
    async fn extract(&self, bytes: Arc<Vec<u8>>) -> Result<String, ExtractionError> {
        String::from_utf8(bytes.to_vec()).map_err(|err| ExtractionError::Parse(err.to_string()))
    }
}

#[allow(dead_code)]
pub struct Seeded {
    pub affiliate_id: i64,
    pub affiliate_public_id: Uuid,
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    storage: Arc<FakeStorage>,
}

impl TestApp {
    /// Returns `None` when no test database is configured.
    pub async fn new() -> Result<Option<Self>> {
        let Ok(database_url) = env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set; skipping database-backed test");
            return Ok(None);
        };

        let config = AppConfig {
            database_url,
            database_max_pool_size: 4,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            jwt_expiry_minutes: 60,
            cors_allowed_origin: None,
            aws_endpoint_url: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_region: "us-east-1".to_string(),
            s3_bucket: "test-bucket".to_string(),
            max_upload_bytes: 1024 * 1024,
            download_url_expiry_seconds: 300,
            employer_cache_ttl_seconds: 3600,
            pdfium_library_path: None,
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let storage = Arc::new(FakeStorage::default());
        let storage_for_state: Arc<dyn BlobStore> = storage.clone();
        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(pool, config, storage_for_state, Arc::new(FakeExtractor), jwt);
        let router = routes::create_router(state.clone());

        Ok(Some(Self {
            state,
            router,
            storage,
        }))
    }

    #[allow(dead_code)]
    pub fn storage(&self) -> Arc<FakeStorage> {
        self.storage.clone()
    }

    pub async fn insert_affiliate(&self, name: &str) -> Result<Seeded> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let public_id = Uuid::new_v4();
            let affiliate_id: i64 = diesel::insert_into(affiliates::table)
                .values(&NewAffiliate {
                    public_id,
                    name,
                    abbreviation: None,
                })
                .returning(affiliates::id)
                .get_result(conn)
                .context("failed to insert affiliate")?;
            Ok(Seeded {
                affiliate_id,
                affiliate_public_id: public_id,
            })
        })
        .await
    }

    /// Inserts a user with the given role grants and returns a bearer token.
    pub async fn insert_user(
        &self,
        username: &str,
        affiliate_id: Option<i64>,
        role_names: &[&str],
    ) -> Result<(Uuid, String)> {
        let username = username.to_string();
        let role_names: Vec<String> = role_names.iter().map(|r| r.to_string()).collect();
        let user_id = self
            .with_conn(move |conn| {
                let user = NewUser {
                    id: Uuid::new_v4(),
                    username,
                    affiliate_id,
                };
                diesel::insert_into(users::table)
                    .values(&user)
                    .execute(conn)
                    .context("failed to insert user")?;
                for name in &role_names {
                    let role_id: i32 = roles::table
                        .filter(roles::name.eq(name))
                        .select(roles::id)
                        .first(conn)
                        .with_context(|| format!("role {name} is not seeded"))?;
                    diesel::insert_into(role_grants::table)
                        .values(&NewRoleGrant {
                            user_id: user.id,
                            role_id,
                        })
                        .execute(conn)?;
                }
                Ok(user.id)
            })
            .await?;

        let token = self.state.jwt.generate_token(user_id, "test-user")?;
        Ok((user_id, token))
    }

    /// Inserts a member with a login of their own holding only the member role.
    #[allow(dead_code)]
    pub async fn insert_member(
        &self,
        affiliate_id: i64,
        first_name: &str,
        last_name: &str,
    ) -> Result<(Uuid, Uuid)> {
        let (user_id, _) = self
            .insert_user(
                &format!("{first_name}.{last_name}").to_lowercase(),
                Some(affiliate_id),
                &[ROLE_MEMBER],
            )
            .await?;
        let first_name = first_name.to_string();
        let last_name = last_name.to_string();
        let public_id = self
            .with_conn(move |conn| {
                let member = NewMember {
                    public_id: Uuid::new_v4(),
                    affiliate_id,
                    user_id: Some(user_id),
                    first_name,
                    last_name,
                    email: None,
                };
                diesel::insert_into(members::table)
                    .values(&member)
                    .execute(conn)
                    .context("failed to insert member")?;
                Ok(member.public_id)
            })
            .await?;
        Ok((public_id, user_id))
    }

    #[allow(dead_code)]
    pub async fn holds_officer_role(&self, user_id: Uuid) -> Result<bool> {
        self.with_conn(move |conn| {
            let count: i64 = role_grants::table
                .inner_join(roles::table)
                .filter(role_grants::user_id.eq(user_id))
                .filter(roles::name.eq(ROLE_OFFICER))
                .count()
                .get_result(conn)?;
            Ok(count > 0)
        })
        .await
    }

    pub async fn send(&self, request: Request<Body>) -> Result<(u16, Value)> {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response");
        let status = response.status().as_u16();
        let bytes = body_to_vec(response.into_body()).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).context("response body is not JSON")?
        };
        Ok((status, body))
    }

    pub async fn json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<(u16, Value)> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body))?).await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<(u16, Value)> {
        self.bodyless(Method::GET, path, token).await
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<(u16, Value)> {
        self.bodyless(Method::DELETE, path, token).await
    }

    async fn bodyless(&self, method: Method, path: &str, token: Option<&str>) -> Result<(u16, Value)> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty())?).await
    }

    /// Sends a multipart `file` + `metadata` form. Either part may be left out.
    #[allow(dead_code)]
    pub async fn multipart(
        &self,
        method: Method,
        path: &str,
        file: Option<(&str, &str, &[u8])>,
        metadata: Option<&Value>,
        token: &str,
    ) -> Result<(u16, Value)> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();

        if let Some((filename, content_type, data)) = file {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(
                format!(
                    "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                    filename
                )
                .as_bytes(),
            );
            body.extend(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
            body.extend(data);
            body.extend(b"\r\n");
        }

        if let Some(metadata) = metadata {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(b"Content-Disposition: form-data; name=\"metadata\"\r\n\r\n");
            body.extend(serde_json::to_vec(metadata)?);
            body.extend(b"\r\n");
        }

        body.extend(format!("--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(method)
            .uri(path)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header("authorization", format!("Bearer {token}"))
            .body(Body::from(body))?;
        self.send(request).await
    }

    /// Uploads a document and returns its JSON, failing on a non-201.
    #[allow(dead_code)]
    pub async fn upload(
        &self,
        filename: &str,
        data: &[u8],
        metadata: Value,
        token: &str,
    ) -> Result<Value> {
        let (status, body) = self
            .multipart(
                Method::POST,
                "/api/documents",
                Some((filename, "application/pdf", data)),
                Some(&metadata),
                token,
            )
            .await?;
        ensure!(status == 201, "upload failed with {status}: {body}");
        Ok(body)
    }

    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

#[allow(dead_code)]
pub fn parse<T: DeserializeOwned>(value: &Value) -> Result<T> {
    serde_json::from_value(value.clone()).context("unexpected response shape")
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        db::run_migrations(&mut conn)?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE activity_log, affiliate_officers, documents, document_folders, members, role_grants, users, affiliates RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
