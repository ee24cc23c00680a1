use std::collections::BTreeSet;

use diesel::prelude::*;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Affiliate;
use crate::schema::{affiliates, documents};

pub fn find_by_public_id(conn: &mut PgConnection, public_id: Uuid) -> AppResult<Affiliate> {
    affiliates::table
        .filter(affiliates::public_id.eq(public_id))
        .first::<Affiliate>(conn)
        .optional()?
        .ok_or_else(AppError::not_found)
}

pub fn find_by_id(conn: &mut PgConnection, id: i64) -> AppResult<Affiliate> {
    Ok(affiliates::table.find(id).first(conn)?)
}

/// Distinct, non-blank employer names across an affiliate's documents.
pub fn distinct_employers(conn: &mut PgConnection, affiliate_id: i64) -> AppResult<Vec<String>> {
    let names: Vec<Option<String>> = documents::table
        .filter(documents::affiliate_id.eq(affiliate_id))
        .filter(documents::employer.is_not_null())
        .select(documents::employer)
        .distinct()
        .load(conn)?;

    let unique: BTreeSet<String> = names
        .into_iter()
        .flatten()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    Ok(unique.into_iter().collect())
}
