//! Activity log entries, written on the caller's connection so they commit
//! or roll back with the change they describe.

use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::NewActivityLogEntry;
use crate::schema::activity_log;

pub const SUBJECT_DOCUMENT: &str = "document";
pub const SUBJECT_FOLDER: &str = "document_folder";
pub const SUBJECT_OFFICER: &str = "affiliate_officer";

#[derive(Debug, Clone)]
pub struct AuditEvent {
    action: &'static str,
    subject_type: &'static str,
    subject_id: i64,
    subject_name: String,
    old_values: Option<Value>,
    new_values: Option<Value>,
}

impl AuditEvent {
    pub fn new(
        action: &'static str,
        subject_type: &'static str,
        subject_id: i64,
        subject_name: impl Into<String>,
    ) -> Self {
        Self {
            action,
            subject_type,
            subject_id,
            subject_name: subject_name.into(),
            old_values: None,
            new_values: None,
        }
    }

    pub fn with_old(mut self, values: Value) -> Self {
        self.old_values = Some(values);
        self
    }

    pub fn with_new(mut self, values: Value) -> Self {
        self.new_values = Some(values);
        self
    }
}

pub fn record(conn: &mut PgConnection, actor_id: Option<Uuid>, event: AuditEvent) -> AppResult<()> {
    let entry = NewActivityLogEntry {
        actor_id,
        action: event.action.to_string(),
        subject_type: event.subject_type.to_string(),
        subject_id: event.subject_id,
        subject_name: event.subject_name,
        old_values: event.old_values,
        new_values: event.new_values,
    };

    diesel::insert_into(activity_log::table)
        .values(&entry)
        .execute(conn)?;

    tracing::debug!(
        action = event.action,
        subject_type = event.subject_type,
        subject_id = event.subject_id,
        "activity recorded"
    );
    Ok(())
}
