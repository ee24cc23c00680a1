use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = affiliates)]
pub struct Affiliate {
    pub id: i64,
    pub public_id: Uuid,
    pub name: String,
    pub abbreviation: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = affiliates)]
pub struct NewAffiliate {
    pub public_id: Uuid,
    pub name: String,
    pub abbreviation: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub affiliate_id: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub affiliate_id: Option<i64>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = role_grants)]
pub struct NewRoleGrant {
    pub user_id: Uuid,
    pub role_id: i32,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = members)]
pub struct Member {
    pub id: i64,
    pub public_id: Uuid,
    pub affiliate_id: i64,
    pub user_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = members)]
pub struct NewMember {
    pub public_id: Uuid,
    pub affiliate_id: i64,
    pub user_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = document_folders)]
pub struct DocumentFolder {
    pub id: i64,
    pub public_id: Uuid,
    pub affiliate_id: i64,
    pub parent_id: Option<i64>,
    pub name: Option<String>,
    pub category_group: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl DocumentFolder {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = document_folders)]
pub struct NewDocumentFolder {
    pub public_id: Uuid,
    pub affiliate_id: i64,
    pub parent_id: Option<i64>,
    pub name: Option<String>,
    pub category_group: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = documents)]
pub struct Document {
    pub id: i64,
    pub public_id: Uuid,
    pub affiliate_id: Option<i64>,
    pub folder_id: Option<i64>,
    pub uploaded_by: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub document_type: String,
    pub category_group: String,
    pub database_source: Option<String>,
    pub file_path: String,
    pub original_filename: String,
    pub file_size: i64,
    pub content_type: Option<String>,
    pub content_extract: Option<String>,
    pub expiration_date: Option<NaiveDate>,
    pub effective_date: Option<NaiveDate>,
    pub employer: Option<String>,
    pub cbc: Option<String>,
    pub state: Option<String>,
    pub status: Option<String>,
    pub award_date: Option<NaiveDate>,
    pub arbitrator: Option<String>,
    pub outcome: Option<String>,
    pub keywords: Option<String>,
    pub year: Option<i32>,
    pub is_public: bool,
    pub is_archived: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = documents)]
pub struct NewDocument {
    pub public_id: Uuid,
    pub affiliate_id: Option<i64>,
    pub folder_id: Option<i64>,
    pub uploaded_by: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub document_type: String,
    pub category_group: String,
    pub database_source: Option<String>,
    pub file_path: String,
    pub original_filename: String,
    pub file_size: i64,
    pub content_type: Option<String>,
    pub content_extract: Option<String>,
    pub expiration_date: Option<NaiveDate>,
    pub effective_date: Option<NaiveDate>,
    pub employer: Option<String>,
    pub cbc: Option<String>,
    pub state: Option<String>,
    pub status: Option<String>,
    pub award_date: Option<NaiveDate>,
    pub arbitrator: Option<String>,
    pub outcome: Option<String>,
    pub keywords: Option<String>,
    pub year: Option<i32>,
    pub is_public: bool,
    pub is_archived: bool,
}

/// Full-row replacement used by partial updates once the patch has been
/// merged and re-validated.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = documents, treat_none_as_null = true)]
pub struct DocumentChangeset {
    pub folder_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub document_type: String,
    pub category_group: String,
    pub database_source: Option<String>,
    pub expiration_date: Option<NaiveDate>,
    pub effective_date: Option<NaiveDate>,
    pub employer: Option<String>,
    pub cbc: Option<String>,
    pub state: Option<String>,
    pub status: Option<String>,
    pub award_date: Option<NaiveDate>,
    pub arbitrator: Option<String>,
    pub outcome: Option<String>,
    pub keywords: Option<String>,
    pub year: Option<i32>,
    pub is_public: bool,
    pub is_archived: bool,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = documents, treat_none_as_null = true)]
pub struct DocumentFileChangeset {
    pub file_path: String,
    pub original_filename: String,
    pub file_size: i64,
    pub content_type: Option<String>,
    pub content_extract: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = officer_positions)]
pub struct OfficerPosition {
    pub id: i64,
    pub name: String,
    pub display_order: i32,
    pub has_secondary: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = affiliate_officers)]
pub struct AffiliateOfficer {
    pub id: i64,
    pub affiliate_id: i64,
    pub position_id: i64,
    pub member_id: Option<i64>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_vacant: bool,
    pub is_primary: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = affiliate_officers)]
pub struct NewAffiliateOfficer {
    pub affiliate_id: i64,
    pub position_id: i64,
    pub member_id: Option<i64>,
    pub start_date: NaiveDate,
    pub is_vacant: bool,
    pub is_primary: bool,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = activity_log)]
pub struct ActivityLogEntry {
    pub id: i64,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub subject_type: String,
    pub subject_id: i64,
    pub subject_name: String,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = activity_log)]
pub struct NewActivityLogEntry {
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub subject_type: String,
    pub subject_id: i64,
    pub subject_name: String,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
}
