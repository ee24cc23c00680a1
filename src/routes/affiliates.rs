use axum::extract::{Json, Path, State};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::access::Caller;
use crate::affiliates;
use crate::error::AppResult;
use crate::state::AppState;

#[derive(Serialize)]
pub struct EmployersResponse {
    pub employers: Vec<String>,
}

pub async fn list_employers(
    State(state): State<AppState>,
    Path(affiliate_id): Path<Uuid>,
    caller: Caller,
) -> AppResult<Json<EmployersResponse>> {
    let affiliate = {
        let mut conn = state.db()?;
        affiliates::find_by_public_id(&mut conn, affiliate_id)?
    };
    caller.ensure_view(affiliate.id)?;

    let employers = match state.employers.get(affiliate.id).await {
        Some(cached) => {
            debug!(affiliate_id = affiliate.id, "employer cache hit");
            cached
        }
        None => {
            let loaded_at = state.employers.generation(affiliate.id);
            let loaded = {
                let mut conn = state.db()?;
                affiliates::distinct_employers(&mut conn, affiliate.id)?
            };
            state.employers.insert(affiliate.id, loaded_at, loaded).await
        }
    };

    Ok(Json(EmployersResponse {
        employers: employers.as_ref().clone(),
    }))
}
