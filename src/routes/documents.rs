use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Json, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use diesel::{prelude::*, PgConnection};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use crate::access::{Caller, DocumentPredicate, Scope};
use crate::audit::{self, AuditEvent, SUBJECT_DOCUMENT};
use crate::documents::{
    stored_file_path, validate, validate_upload, DocumentDraft, DocumentOrder, DocumentPatch,
    DocumentType, Repository, ValidatedDocument,
};
use crate::error::{AppError, AppResult};
use crate::extract::is_pdf;
use crate::folders::{self, CategoryGroup};
use crate::models::{
    Document, DocumentChangeset, DocumentFileChangeset, DocumentFolder, NewDocument,
};
use crate::schema::{affiliates, document_folders, documents};
use crate::search::{Query as SearchQuery, SearchMode};
use crate::state::AppState;
use crate::utils::effect::{best_effort, required};
use crate::utils::json::Patch;
use crate::{affiliates as affiliate_store, documents as rules};

const DEFAULT_PER_PAGE: i64 = 25;
const MAX_PER_PAGE: i64 = 100;
/// Keeps `(page - 1) * per_page` inside i64.
const MAX_PAGE: i64 = i64::MAX / MAX_PER_PAGE;

#[derive(Debug, Deserialize)]
pub struct DocumentSearchQuery {
    pub q: Option<String>,
    #[serde(default)]
    pub mode: SearchMode,
    pub repository: Option<String>,
    pub category_group: Option<String>,
    pub document_type: Option<String>,
    pub affiliate_id: Option<Uuid>,
    pub folder_id: Option<Uuid>,
    #[serde(default)]
    pub order: DocumentOrder,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub affiliate_id: Option<Uuid>,
    pub folder_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub document_type: String,
    pub category_group: String,
    pub database_source: Option<String>,
    pub original_filename: String,
    pub file_size: i64,
    pub content_type: Option<String>,
    pub has_extracted_text: bool,
    pub status: Option<String>,
    pub expiration_date: Option<NaiveDate>,
    pub effective_date: Option<NaiveDate>,
    pub award_date: Option<NaiveDate>,
    pub arbitrator: Option<String>,
    pub outcome: Option<String>,
    pub employer: Option<String>,
    pub cbc: Option<String>,
    pub state: Option<String>,
    pub keywords: Option<String>,
    pub year: Option<i32>,
    pub is_public: bool,
    pub is_archived: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct DocumentSearchResponse {
    pub documents: Vec<DocumentResponse>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Serialize)]
pub struct DocumentDownloadResponse {
    pub url: String,
    pub expires_in: u64,
    pub filename: String,
    pub content_type: Option<String>,
    pub file_size: i64,
}

/// Resolved filters for one search call. Predicates are rebuilt per query
/// because boxed expressions cannot be shared between the count and the
/// page query.
struct SearchCriteria {
    scope: Scope,
    query: SearchQuery,
    repository: Option<Repository>,
    category_group: Option<CategoryGroup>,
    document_type: Option<DocumentType>,
    affiliate_id: Option<i64>,
    folder_id: Option<i64>,
}

impl SearchCriteria {
    fn predicates(&self) -> Vec<DocumentPredicate> {
        let mut predicates = vec![self.scope.document_visibility()];
        if let Some(repository) = self.repository {
            predicates.push(repository.predicate());
        }
        if let Some(group) = self.category_group {
            predicates.push(Box::new(documents::category_group.eq(group.as_str())));
        }
        if let Some(kind) = self.document_type {
            predicates.push(Box::new(documents::document_type.eq(kind.as_str())));
        }
        if let Some(affiliate_id) = self.affiliate_id {
            predicates.push(Box::new(
                documents::affiliate_id
                    .is_not_null()
                    .and(documents::affiliate_id.assume_not_null().eq(affiliate_id)),
            ));
        }
        if let Some(folder_id) = self.folder_id {
            predicates.push(Box::new(
                documents::folder_id
                    .is_not_null()
                    .and(documents::folder_id.assume_not_null().eq(folder_id)),
            ));
        }
        if !self.query.is_all() {
            predicates.push(self.query.to_predicate());
        }
        predicates
    }

    fn filtered(&self) -> documents::BoxedQuery<'static, diesel::pg::Pg> {
        self.predicates()
            .into_iter()
            .fold(documents::table.into_boxed(), |query, predicate| {
                query.filter(predicate)
            })
    }
}

fn parse_filter<T: std::str::FromStr<Err = String>>(
    key: &str,
    raw: Option<&str>,
) -> AppResult<Option<T>> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|message| AppError::invalid_field(key, message)),
        None => Ok(None),
    }
}

pub async fn search_documents(
    State(state): State<AppState>,
    Query(params): Query<DocumentSearchQuery>,
    caller: Caller,
) -> AppResult<Json<DocumentSearchResponse>> {
    let scope = caller.scope()?;
    let mut conn = state.db()?;

    let category_group = match params.category_group.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(raw.parse::<CategoryGroup>()?),
        _ => None,
    };
    let affiliate_id = params
        .affiliate_id
        .map(|public_id| affiliate_store::find_by_public_id(&mut conn, public_id))
        .transpose()?
        .map(|affiliate| affiliate.id);
    let folder_id = params
        .folder_id
        .map(|public_id| folders::find_by_public_id(&mut conn, public_id))
        .transpose()?
        .map(|folder| folder.id);

    let criteria = SearchCriteria {
        scope,
        query: SearchQuery::parse(params.q.as_deref().unwrap_or_default(), params.mode),
        repository: parse_filter("repository", params.repository.as_deref())?,
        category_group,
        document_type: parse_filter("document_type", params.document_type.as_deref())?,
        affiliate_id,
        folder_id,
    };

    let page = params.page.unwrap_or(1).clamp(1, MAX_PAGE);
    let per_page = params
        .per_page
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);

    let total: i64 = criteria.filtered().count().get_result(&mut conn)?;

    let ordered = match params.order {
        DocumentOrder::Newest => criteria
            .filtered()
            .order((documents::created_at.desc(), documents::id.desc())),
        DocumentOrder::Oldest => criteria
            .filtered()
            .order((documents::created_at.asc(), documents::id.asc())),
        DocumentOrder::Title => criteria
            .filtered()
            .order((documents::title.asc(), documents::id.asc())),
    };
    let rows: Vec<Document> = ordered
        .limit(per_page)
        .offset((page - 1) * per_page)
        .load(&mut conn)?;

    info!(
        user_id = %caller.user_id,
        mode = ?params.mode,
        total,
        page,
        "document search"
    );

    Ok(Json(DocumentSearchResponse {
        documents: to_document_responses(&mut conn, rows)?,
        total,
        page,
        per_page,
    }))
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    caller: Caller,
) -> AppResult<Json<DocumentResponse>> {
    let mut conn = state.db()?;
    let document = load_visible(&mut conn, &caller, document_id)?;
    Ok(Json(to_document_response(&mut conn, document)?))
}

pub async fn download_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    caller: Caller,
) -> AppResult<Json<DocumentDownloadResponse>> {
    let document = {
        let mut conn = state.db()?;
        load_visible(&mut conn, &caller, document_id)?
    };

    let expires_in = state.config.download_url_expiry_seconds;
    let url = required(
        "presign download",
        state.storage.temporary_url(
            &document.file_path,
            &document.original_filename,
            Duration::from_secs(expires_in),
        ),
    )
    .await?;

    Ok(Json(DocumentDownloadResponse {
        url,
        expires_in,
        filename: document.original_filename,
        content_type: document.content_type,
        file_size: document.file_size,
    }))
}

struct UploadedFile {
    bytes: Arc<Vec<u8>>,
    original_name: String,
    content_type: Option<String>,
}

struct DocumentForm {
    file: Option<UploadedFile>,
    metadata: Option<Value>,
}

async fn read_document_form(mut multipart: Multipart) -> AppResult<DocumentForm> {
    let mut form = DocumentForm {
        file: None,
        metadata: None,
    };

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                let original_name = field
                    .file_name()
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| AppError::invalid_field("file", "filename is required"))?;
                let content_type = field
                    .content_type()
                    .map(|mime| mime.to_string())
                    .filter(|mime| mime != "application/octet-stream")
                    .or_else(|| {
                        mime_guess::from_path(&original_name)
                            .first_raw()
                            .map(str::to_string)
                    });
                let data = field.bytes().await.map_err(|err| {
                    error!(error = %err, "failed to read file bytes");
                    AppError::bad_request(format!("failed to read file bytes: {err}"))
                })?;
                form.file = Some(UploadedFile {
                    bytes: Arc::new(data.to_vec()),
                    original_name,
                    content_type,
                });
            }
            Some("metadata") => {
                let value = field.text().await.map_err(|err| {
                    error!(error = %err, "invalid metadata payload");
                    AppError::bad_request(format!("invalid metadata: {err}"))
                })?;
                let parsed = serde_json::from_str(&value).map_err(|err| {
                    AppError::invalid_field("metadata", format!("metadata must be valid JSON: {err}"))
                })?;
                form.metadata = Some(parsed);
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Extracted text for PDFs; `None` for everything else or when extraction
/// fails.
async fn extract_text(state: &AppState, file: &UploadedFile) -> Option<String> {
    if !is_pdf(file.content_type.as_deref(), &file.original_name) {
        return None;
    }
    best_effort("extract pdf text", state.extractor.extract(file.bytes.clone()))
        .await
        .map(|text| text.replace('\0', ""))
        .filter(|text| !text.trim().is_empty())
}

pub async fn upload_document(
    State(state): State<AppState>,
    caller: Caller,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<DocumentResponse>)> {
    let form = read_document_form(multipart).await?;
    let file = form
        .file
        .ok_or_else(|| AppError::invalid_field("file", "file is required"))?;
    let extension = validate_upload(
        &file.original_name,
        file.bytes.len(),
        state.config.max_upload_bytes,
    )?;

    let mut patch = DocumentPatch::from_json(&form.metadata.unwrap_or(Value::Null))?;
    let owner_ref = std::mem::replace(&mut patch.affiliate_id, Patch::Omitted);
    let folder_ref = std::mem::replace(&mut patch.folder_id, Patch::Omitted);
    let today = Utc::now().date_naive();

    let (owner, folder, validated) = {
        let mut conn = state.db()?;
        let owner = match owner_ref {
            Patch::Value(public_id) => Some(affiliate_store::find_by_public_id(&mut conn, public_id)?),
            Patch::Null => None,
            Patch::Omitted if caller.is_global() => None,
            Patch::Omitted => {
                let affiliate_id = caller.affiliate_id.ok_or_else(AppError::forbidden)?;
                Some(affiliate_store::find_by_id(&mut conn, affiliate_id)?)
            }
        };
        caller.ensure_manage_owner(owner.as_ref().map(|affiliate| affiliate.id))?;

        let validated = validate(patch.apply(DocumentDraft::default()), today)?;
        let folder = resolve_folder(
            &mut conn,
            owner.as_ref().map(|affiliate| affiliate.id),
            validated.category_group,
            folder_ref,
            None,
        )?;
        (owner, folder, validated)
    };

    let file_path = stored_file_path(
        owner.as_ref().map(|affiliate| affiliate.public_id),
        &file.original_name,
        &extension,
        Utc::now(),
        &mut rand::thread_rng(),
    );
    required(
        "store document blob",
        state
            .storage
            .put(&file_path, file.bytes.to_vec(), file.content_type.clone()),
    )
    .await?;
    let content_extract = extract_text(&state, &file).await;

    let affiliate_id = owner.as_ref().map(|affiliate| affiliate.id);
    let columns = validated.details.columns();
    let new_document = NewDocument {
        public_id: Uuid::new_v4(),
        affiliate_id,
        folder_id: folder.as_ref().map(|folder| folder.id),
        uploaded_by: Some(caller.user_id),
        title: validated.title.clone(),
        description: validated.description.clone(),
        document_type: validated.document_type().as_str().to_string(),
        category_group: validated.category_group.as_str().to_string(),
        database_source: validated.database_source.map(|s| s.as_str().to_string()),
        file_path: file_path.clone(),
        original_filename: file.original_name.clone(),
        file_size: file.bytes.len() as i64,
        content_type: file.content_type.clone(),
        content_extract,
        expiration_date: columns.expiration_date,
        effective_date: columns.effective_date,
        employer: validated.employer.clone(),
        cbc: validated.cbc.clone(),
        state: validated.state.clone(),
        status: columns.status,
        award_date: columns.award_date,
        arbitrator: columns.arbitrator,
        outcome: columns.outcome,
        keywords: validated.keywords.clone(),
        year: validated.year,
        is_public: validated.is_public,
        is_archived: validated.is_archived,
    };

    let inserted = {
        let mut conn = state.db()?;
        conn.transaction::<Document, AppError, _>(|conn| {
            let document: Document = diesel::insert_into(documents::table)
                .values(&new_document)
                .get_result(conn)?;
            audit::record(
                conn,
                Some(caller.user_id),
                AuditEvent::new("document.created", SUBJECT_DOCUMENT, document.id, &document.title)
                    .with_new(audit_snapshot(&document)),
            )?;
            Ok(document)
        })
    };

    let document = match inserted {
        Ok(document) => document,
        Err(err) => {
            error!(error = %err, file_path = %file_path, "document insert failed; removing blob");
            best_effort("remove orphaned blob", state.storage.delete(&file_path)).await;
            return Err(err);
        }
    };

    state.employers.invalidate([affiliate_id]).await;
    info!(
        document_id = %document.public_id,
        affiliate_id = ?affiliate_id,
        original_name = %document.original_filename,
        extracted = document.content_extract.is_some(),
        "document upload succeeded"
    );

    let mut conn = state.db()?;
    Ok((StatusCode::CREATED, Json(to_document_response(&mut conn, document)?)))
}

pub async fn update_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    caller: Caller,
    multipart: Multipart,
) -> AppResult<Json<DocumentResponse>> {
    let form = read_document_form(multipart).await?;
    if form.metadata.is_none() && form.file.is_none() {
        return Err(AppError::bad_request("no changes provided"));
    }
    let today = Utc::now().date_naive();

    let (document, changeset) = {
        let mut conn = state.db()?;
        let document = load_visible(&mut conn, &caller, document_id)?;
        caller.ensure_manage_owner(document.affiliate_id)?;

        let mut patch = DocumentPatch::from_json(&form.metadata.unwrap_or(Value::Null))?;
        let owner_ref = std::mem::replace(&mut patch.affiliate_id, Patch::Omitted);
        ensure_same_owner(&mut conn, &document, owner_ref)?;
        let folder_ref = std::mem::replace(&mut patch.folder_id, Patch::Omitted);

        let validated = validate(patch.merge_into(&document), today)?;
        let folder = resolve_folder(
            &mut conn,
            document.affiliate_id,
            validated.category_group,
            folder_ref,
            Some(&document),
        )?;
        let changeset = changeset_for(&validated, folder.as_ref().map(|f| f.id));
        (document, changeset)
    };

    let replacement = match form.file {
        Some(file) => {
            let extension = validate_upload(
                &file.original_name,
                file.bytes.len(),
                state.config.max_upload_bytes,
            )?;
            let owner_public_id = match document.affiliate_id {
                Some(affiliate_id) => {
                    let mut conn = state.db()?;
                    Some(affiliate_store::find_by_id(&mut conn, affiliate_id)?.public_id)
                }
                None => None,
            };
            let file_path = stored_file_path(
                owner_public_id,
                &file.original_name,
                &extension,
                Utc::now(),
                &mut rand::thread_rng(),
            );
            required(
                "store document blob",
                state
                    .storage
                    .put(&file_path, file.bytes.to_vec(), file.content_type.clone()),
            )
            .await?;
            let content_extract = extract_text(&state, &file).await;
            Some(DocumentFileChangeset {
                file_path,
                original_filename: file.original_name,
                file_size: file.bytes.len() as i64,
                content_type: file.content_type,
                content_extract,
            })
        }
        None => None,
    };

    let updated = {
        let mut conn = state.db()?;
        conn.transaction::<Document, AppError, _>(|conn| {
            let mut updated: Document = diesel::update(documents::table.find(document.id))
                .set(&changeset)
                .get_result(conn)?;
            if let Some(file_changes) = &replacement {
                updated = diesel::update(documents::table.find(document.id))
                    .set(file_changes)
                    .get_result(conn)?;
            }
            audit::record(
                conn,
                Some(caller.user_id),
                AuditEvent::new("document.updated", SUBJECT_DOCUMENT, updated.id, &updated.title)
                    .with_old(audit_snapshot(&document))
                    .with_new(audit_snapshot(&updated)),
            )?;
            Ok(updated)
        })
    };

    let updated = match updated {
        Ok(updated) => updated,
        Err(err) => {
            if let Some(file_changes) = &replacement {
                best_effort(
                    "remove orphaned blob",
                    state.storage.delete(&file_changes.file_path),
                )
                .await;
            }
            return Err(err);
        }
    };

    if replacement.is_some() {
        best_effort(
            "delete replaced blob",
            state.storage.delete(&document.file_path),
        )
        .await;
    }
    state.employers.invalidate([document.affiliate_id]).await;
    info!(
        document_id = %updated.public_id,
        file_replaced = replacement.is_some(),
        "document updated"
    );

    let mut conn = state.db()?;
    Ok(Json(to_document_response(&mut conn, updated)?))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    caller: Caller,
) -> AppResult<impl IntoResponse> {
    let document = {
        let mut conn = state.db()?;
        let document = load_visible(&mut conn, &caller, document_id)?;
        caller.ensure_manage_owner(document.affiliate_id)?;
        document
    };

    best_effort("delete document blob", state.storage.delete(&document.file_path)).await;

    let mut conn = state.db()?;
    conn.transaction::<_, AppError, _>(|conn| {
        diesel::delete(documents::table.find(document.id)).execute(conn)?;
        audit::record(
            conn,
            Some(caller.user_id),
            AuditEvent::new("document.deleted", SUBJECT_DOCUMENT, document.id, &document.title)
                .with_old(audit_snapshot(&document)),
        )
    })?;

    state.employers.invalidate([document.affiliate_id]).await;
    info!(document_id = %document.public_id, "document deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn refresh_statuses(
    State(state): State<AppState>,
    caller: Caller,
) -> AppResult<Json<Value>> {
    caller.ensure_manage_national()?;
    let mut conn = state.db()?;
    let updated = rules::refresh_contract_statuses(&mut conn, Utc::now().date_naive())?;
    Ok(Json(json!({ "updated": updated })))
}

/// Loads a document the caller may see. Invisible documents are reported as
/// missing.
fn load_visible(conn: &mut PgConnection, caller: &Caller, public_id: Uuid) -> AppResult<Document> {
    let document: Document = documents::table
        .filter(documents::public_id.eq(public_id))
        .first(conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;
    if caller.scope()?.can_see_document(&document) {
        Ok(document)
    } else {
        Err(AppError::not_found())
    }
}

fn ensure_same_owner(
    conn: &mut PgConnection,
    document: &Document,
    requested: Patch<Uuid>,
) -> AppResult<()> {
    let current = match document.affiliate_id {
        Some(affiliate_id) => Some(affiliate_store::find_by_id(conn, affiliate_id)?.public_id),
        None => None,
    };
    let unchanged = match requested {
        Patch::Omitted => true,
        Patch::Null => current.is_none(),
        Patch::Value(public_id) => current == Some(public_id),
    };
    if unchanged {
        Ok(())
    } else {
        Err(AppError::invalid_field(
            "affiliate_id",
            "the owning affiliate of a document cannot be changed",
        ))
    }
}

/// Picks the folder a document lives in. Affiliate documents default to the
/// root of their category group; national documents are never foldered.
fn resolve_folder(
    conn: &mut PgConnection,
    affiliate_id: Option<i64>,
    group: CategoryGroup,
    requested: Patch<Uuid>,
    existing: Option<&Document>,
) -> AppResult<Option<DocumentFolder>> {
    let Some(affiliate_id) = affiliate_id else {
        return match requested {
            Patch::Value(_) => Err(AppError::invalid_field(
                "folder_id",
                "national documents cannot be placed in a folder",
            )),
            _ => Ok(None),
        };
    };

    match requested {
        Patch::Value(public_id) => {
            let folder = folders::find_by_public_id(conn, public_id).map_err(|_| {
                AppError::invalid_field("folder_id", "folder does not exist")
            })?;
            if folder.affiliate_id != affiliate_id || folder.category_group != group.as_str() {
                return Err(AppError::invalid_field(
                    "folder_id",
                    "folder belongs to another affiliate or category group",
                ));
            }
            Ok(Some(folder))
        }
        Patch::Null => Ok(Some(folders::get_or_create_root(conn, affiliate_id, group)?)),
        Patch::Omitted => {
            if let Some(folder_id) = existing.and_then(|document| document.folder_id) {
                let current: DocumentFolder = document_folders::table.find(folder_id).first(conn)?;
                if current.category_group == group.as_str() {
                    return Ok(Some(current));
                }
            }
            Ok(Some(folders::get_or_create_root(conn, affiliate_id, group)?))
        }
    }
}

fn changeset_for(validated: &ValidatedDocument, folder_id: Option<i64>) -> DocumentChangeset {
    let columns = validated.details.columns();
    DocumentChangeset {
        folder_id,
        title: validated.title.clone(),
        description: validated.description.clone(),
        document_type: validated.document_type().as_str().to_string(),
        category_group: validated.category_group.as_str().to_string(),
        database_source: validated.database_source.map(|s| s.as_str().to_string()),
        expiration_date: columns.expiration_date,
        effective_date: columns.effective_date,
        employer: validated.employer.clone(),
        cbc: validated.cbc.clone(),
        state: validated.state.clone(),
        status: columns.status,
        award_date: columns.award_date,
        arbitrator: columns.arbitrator,
        outcome: columns.outcome,
        keywords: validated.keywords.clone(),
        year: validated.year,
        is_public: validated.is_public,
        is_archived: validated.is_archived,
        updated_at: Utc::now().naive_utc(),
    }
}

fn audit_snapshot(document: &Document) -> Value {
    json!({
        "title": document.title,
        "type": document.document_type,
        "category_group": document.category_group,
        "database_source": document.database_source,
        "status": document.status,
        "employer": document.employer,
        "original_filename": document.original_filename,
        "is_public": document.is_public,
        "is_archived": document.is_archived,
    })
}

pub(crate) fn to_document_response(
    conn: &mut PgConnection,
    document: Document,
) -> AppResult<DocumentResponse> {
    let mut responses = to_document_responses(conn, vec![document])?;
    responses
        .pop()
        .ok_or_else(|| AppError::internal("document response missing"))
}

/// Maps rows to responses, swapping internal ids for public ones in two
/// batched lookups.
pub(crate) fn to_document_responses(
    conn: &mut PgConnection,
    rows: Vec<Document>,
) -> AppResult<Vec<DocumentResponse>> {
    let affiliate_ids: Vec<i64> = rows.iter().filter_map(|doc| doc.affiliate_id).collect();
    let folder_ids: Vec<i64> = rows.iter().filter_map(|doc| doc.folder_id).collect();

    let affiliate_public: HashMap<i64, Uuid> = affiliates::table
        .filter(affiliates::id.eq_any(affiliate_ids))
        .select((affiliates::id, affiliates::public_id))
        .load::<(i64, Uuid)>(conn)?
        .into_iter()
        .collect();
    let folder_public: HashMap<i64, Uuid> = document_folders::table
        .filter(document_folders::id.eq_any(folder_ids))
        .select((document_folders::id, document_folders::public_id))
        .load::<(i64, Uuid)>(conn)?
        .into_iter()
        .collect();

    Ok(rows
        .into_iter()
        .map(|doc| DocumentResponse {
            id: doc.public_id,
            affiliate_id: doc
                .affiliate_id
                .and_then(|id| affiliate_public.get(&id).copied()),
            folder_id: doc.folder_id.and_then(|id| folder_public.get(&id).copied()),
            title: doc.title,
            description: doc.description,
            document_type: doc.document_type,
            category_group: doc.category_group,
            database_source: doc.database_source,
            original_filename: doc.original_filename,
            file_size: doc.file_size,
            content_type: doc.content_type,
            has_extracted_text: doc.content_extract.is_some(),
            status: doc.status,
            expiration_date: doc.expiration_date,
            effective_date: doc.effective_date,
            award_date: doc.award_date,
            arbitrator: doc.arbitrator,
            outcome: doc.outcome,
            employer: doc.employer,
            cbc: doc.cbc,
            state: doc.state,
            keywords: doc.keywords,
            year: doc.year,
            is_public: doc.is_public,
            is_archived: doc.is_archived,
            created_at: to_iso(doc.created_at),
            updated_at: to_iso(doc.updated_at),
        })
        .collect())
}

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}
