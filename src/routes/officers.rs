use axum::extract::{Json, Path, State};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::Caller;
use crate::affiliates;
use crate::error::AppResult;
use crate::officers::{self, EligibleMember, PositionListing, Slot};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AssignOfficerRequest {
    pub member_id: Uuid,
    pub position_id: i64,
    #[serde(default = "default_slot")]
    pub slot: Slot,
    pub start_date: Option<NaiveDate>,
}

fn default_slot() -> Slot {
    Slot::Primary
}

#[derive(Serialize)]
pub struct OfficersResponse {
    pub positions: Vec<PositionListing>,
}

#[derive(Serialize)]
pub struct EligibleMembersResponse {
    pub members: Vec<EligibleMember>,
}

pub async fn list_officers(
    State(state): State<AppState>,
    Path(affiliate_id): Path<Uuid>,
    caller: Caller,
) -> AppResult<Json<OfficersResponse>> {
    let mut conn = state.db()?;
    let affiliate = affiliates::find_by_public_id(&mut conn, affiliate_id)?;
    caller.ensure_view(affiliate.id)?;

    Ok(Json(OfficersResponse {
        positions: officers::listing(&mut conn, affiliate.id)?,
    }))
}

pub async fn assign_officer(
    State(state): State<AppState>,
    Path(affiliate_id): Path<Uuid>,
    caller: Caller,
    Json(payload): Json<AssignOfficerRequest>,
) -> AppResult<Json<OfficersResponse>> {
    let mut conn = state.db()?;
    let affiliate = affiliates::find_by_public_id(&mut conn, affiliate_id)?;
    caller.ensure_manage(affiliate.id)?;

    let member = officers::find_member(&mut conn, payload.member_id)?;
    let position = officers::find_position(&mut conn, payload.position_id)?;
    let positions = officers::assign(
        &mut conn,
        &affiliate,
        &member,
        &position,
        payload.slot,
        payload.start_date,
        Utc::now().date_naive(),
        caller.user_id,
    )?;
    Ok(Json(OfficersResponse { positions }))
}

pub async fn vacate_officer(
    State(state): State<AppState>,
    Path((affiliate_id, record_id)): Path<(Uuid, i64)>,
    caller: Caller,
) -> AppResult<Json<OfficersResponse>> {
    let mut conn = state.db()?;
    let affiliate = affiliates::find_by_public_id(&mut conn, affiliate_id)?;
    caller.ensure_manage(affiliate.id)?;

    let positions = officers::vacate(
        &mut conn,
        &affiliate,
        record_id,
        Utc::now().date_naive(),
        caller.user_id,
    )?;
    Ok(Json(OfficersResponse { positions }))
}

pub async fn eligible_members(
    State(state): State<AppState>,
    Path(affiliate_id): Path<Uuid>,
    caller: Caller,
) -> AppResult<Json<EligibleMembersResponse>> {
    let mut conn = state.db()?;
    let affiliate = affiliates::find_by_public_id(&mut conn, affiliate_id)?;
    caller.ensure_manage(affiliate.id)?;

    Ok(Json(EligibleMembersResponse {
        members: officers::eligible_members(&mut conn, affiliate.id)?,
    }))
}
