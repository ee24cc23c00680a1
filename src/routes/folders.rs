use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use diesel::PgConnection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::Caller;
use crate::affiliates;
use crate::error::AppResult;
use crate::folders::{self, CategoryGroup, FolderListing};
use crate::models::DocumentFolder;
use crate::state::AppState;

use super::documents::{to_document_responses, to_iso, DocumentResponse};

#[derive(Deserialize)]
pub struct CreateFolderRequest {
    pub affiliate_id: Uuid,
    pub category_group: CategoryGroup,
    pub name: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct RenameFolderRequest {
    pub name: String,
}

#[derive(Serialize)]
pub struct FolderInfo {
    pub id: Uuid,
    pub name: Option<String>,
    pub parent_id: Option<Uuid>,
    pub category_group: String,
    pub is_root: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct FolderResponse {
    pub folder: FolderInfo,
    pub path: Vec<FolderInfo>,
    pub children: Vec<FolderInfo>,
    pub documents: Vec<DocumentResponse>,
}

pub async fn get_root_folder(
    State(state): State<AppState>,
    Path((affiliate_id, category_group)): Path<(Uuid, String)>,
    caller: Caller,
) -> AppResult<Json<FolderResponse>> {
    let group: CategoryGroup = category_group.parse()?;
    let mut conn = state.db()?;
    let affiliate = affiliates::find_by_public_id(&mut conn, affiliate_id)?;
    caller.ensure_view(affiliate.id)?;

    let root = folders::get_or_create_root(&mut conn, affiliate.id, group)?;
    let listing = folders::list_folder(&mut conn, root, caller.scope()?)?;
    Ok(Json(to_folder_response(&mut conn, listing)?))
}

pub async fn get_folder(
    State(state): State<AppState>,
    Path(folder_id): Path<Uuid>,
    caller: Caller,
) -> AppResult<Json<FolderResponse>> {
    let mut conn = state.db()?;
    let folder = folders::find_by_public_id(&mut conn, folder_id)?;
    caller.ensure_view(folder.affiliate_id)?;

    let listing = folders::list_folder(&mut conn, folder, caller.scope()?)?;
    Ok(Json(to_folder_response(&mut conn, listing)?))
}

pub async fn create_folder(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<CreateFolderRequest>,
) -> AppResult<(StatusCode, Json<FolderResponse>)> {
    let mut conn = state.db()?;
    let affiliate = affiliates::find_by_public_id(&mut conn, payload.affiliate_id)?;
    caller.ensure_manage(affiliate.id)?;

    let folder = folders::create_folder(
        &mut conn,
        affiliate.id,
        payload.category_group,
        payload.parent_id,
        &payload.name,
        caller.user_id,
    )?;
    let listing = folders::list_folder(&mut conn, folder, caller.scope()?)?;
    Ok((
        StatusCode::CREATED,
        Json(to_folder_response(&mut conn, listing)?),
    ))
}

pub async fn rename_folder(
    State(state): State<AppState>,
    Path(folder_id): Path<Uuid>,
    caller: Caller,
    Json(payload): Json<RenameFolderRequest>,
) -> AppResult<Json<FolderResponse>> {
    let mut conn = state.db()?;
    let folder = folders::find_by_public_id(&mut conn, folder_id)?;
    caller.ensure_manage(folder.affiliate_id)?;

    let renamed = folders::rename_folder(&mut conn, &folder, &payload.name, caller.user_id)?;
    let listing = folders::list_folder(&mut conn, renamed, caller.scope()?)?;
    Ok(Json(to_folder_response(&mut conn, listing)?))
}

fn to_folder_response(conn: &mut PgConnection, listing: FolderListing) -> AppResult<FolderResponse> {
    let FolderListing {
        folder,
        path,
        children,
        documents,
    } = listing;

    // The breadcrumb ends at `folder`, so each entry's parent is the one
    // before it.
    let mut parent = None;
    let mut crumbs = Vec::with_capacity(path.len());
    for entry in &path {
        crumbs.push(folder_info(entry, parent));
        parent = Some(entry.public_id);
    }
    let folder_parent = path
        .len()
        .checked_sub(2)
        .and_then(|index| path.get(index))
        .map(|entry| entry.public_id);

    Ok(FolderResponse {
        folder: folder_info(&folder, folder_parent),
        path: crumbs,
        children: children
            .iter()
            .map(|child| folder_info(child, Some(folder.public_id)))
            .collect(),
        documents: to_document_responses(conn, documents)?,
    })
}

fn folder_info(folder: &DocumentFolder, parent_id: Option<Uuid>) -> FolderInfo {
    FolderInfo {
        id: folder.public_id,
        name: folder.name.clone(),
        parent_id,
        category_group: folder.category_group.clone(),
        is_root: folder.is_root(),
        created_at: to_iso(folder.created_at),
        updated_at: to_iso(folder.updated_at),
    }
}
