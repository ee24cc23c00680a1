//! Document metadata rules: the closed vocabularies, type-specific fields,
//! upload constraints and stored file naming.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::access::DocumentPredicate;
use crate::error::{AppError, AppResult, FieldErrors};
use crate::folders::CategoryGroup;
use crate::models::Document;
use crate::schema::documents;
use crate::utils::json::{field, Patch};

pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt"];
pub const MAX_TITLE_LEN: usize = 255;
const MAX_SLUG_LEN: usize = 80;

macro_rules! vocabulary {
    ($(#[$meta:meta])* $name:ident, $field:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let wanted = value.trim().to_ascii_lowercase();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|candidate| candidate.as_str() == wanted)
                    .ok_or_else(|| {
                        let allowed: Vec<&str> = $name::ALL.iter().map(|v| v.as_str()).collect();
                        format!("{} must be one of: {}", $field, allowed.join(", "))
                    })
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

vocabulary!(DocumentType, "type" {
    Contract => "contract",
    Arbitration => "arbitration",
    Mou => "mou",
    Bylaws => "bylaws",
    Research => "research",
    General => "general",
});

vocabulary!(DatabaseSource, "database_source" {
    Contracts => "contracts",
    Arbitrations => "arbitrations",
    Mous => "mous",
    ResearchCollection => "research_collection",
    General => "general",
});

vocabulary!(ContractStatus, "status" {
    Active => "active",
    Expired => "expired",
    Pending => "pending",
});

vocabulary!(
    /// Logical repositories carved out of the documents table by tag.
    Repository, "repository" {
        Contracts => "contracts",
        ContractsArchive => "contracts_archive",
        Arbitrations => "arbitrations",
        Mous => "mous",
        ResearchCollection => "research_collection",
    }
);

impl Repository {
    pub fn predicate(self) -> DocumentPredicate {
        let source = documents::database_source
            .is_not_null()
            .and(documents::database_source.assume_not_null().eq(self.source().as_str()));
        match self {
            Repository::Contracts => Box::new(source.and(documents::is_archived.eq(false))),
            Repository::ContractsArchive => Box::new(source.and(documents::is_archived.eq(true))),
            _ => Box::new(source),
        }
    }

    fn source(self) -> DatabaseSource {
        match self {
            Repository::Contracts | Repository::ContractsArchive => DatabaseSource::Contracts,
            Repository::Arbitrations => DatabaseSource::Arbitrations,
            Repository::Mous => DatabaseSource::Mous,
            Repository::ResearchCollection => DatabaseSource::ResearchCollection,
        }
    }
}

/// Type-specific fields. Contract and arbitration fields never coexist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentDetails {
    Contract {
        status: ContractStatus,
        expiration_date: NaiveDate,
        effective_date: NaiveDate,
    },
    Arbitration {
        award_date: NaiveDate,
        arbitrator: String,
        outcome: String,
    },
    Other(DocumentType),
}

impl DocumentDetails {
    pub fn document_type(&self) -> DocumentType {
        match self {
            DocumentDetails::Contract { .. } => DocumentType::Contract,
            DocumentDetails::Arbitration { .. } => DocumentType::Arbitration,
            DocumentDetails::Other(kind) => *kind,
        }
    }

    pub fn columns(&self) -> DetailColumns {
        match self {
            DocumentDetails::Contract {
                status,
                expiration_date,
                effective_date,
            } => DetailColumns {
                status: Some(status.as_str().to_string()),
                expiration_date: Some(*expiration_date),
                effective_date: Some(*effective_date),
                ..DetailColumns::default()
            },
            DocumentDetails::Arbitration {
                award_date,
                arbitrator,
                outcome,
            } => DetailColumns {
                award_date: Some(*award_date),
                arbitrator: Some(arbitrator.clone()),
                outcome: Some(outcome.clone()),
                ..DetailColumns::default()
            },
            DocumentDetails::Other(_) => DetailColumns::default(),
        }
    }
}

/// Flat column view of [`DocumentDetails`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailColumns {
    pub status: Option<String>,
    pub expiration_date: Option<NaiveDate>,
    pub effective_date: Option<NaiveDate>,
    pub award_date: Option<NaiveDate>,
    pub arbitrator: Option<String>,
    pub outcome: Option<String>,
}

/// Unvalidated document fields, built from a create payload or from an
/// existing row with an update patch applied on top.
#[derive(Debug, Clone, Default)]
pub struct DocumentDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub document_type: Option<String>,
    pub category_group: Option<String>,
    pub database_source: Option<String>,
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
    pub is_public: Option<bool>,
    pub is_archived: Option<bool>,
}

impl DocumentDraft {
    pub fn from_document(document: &Document) -> Self {
        Self {
            title: Some(document.title.clone()),
            description: document.description.clone(),
            document_type: Some(document.document_type.clone()),
            category_group: Some(document.category_group.clone()),
            database_source: document.database_source.clone(),
            status: document.status.clone(),
            expiration_date: document.expiration_date,
            effective_date: document.effective_date,
            award_date: document.award_date,
            arbitrator: document.arbitrator.clone(),
            outcome: document.outcome.clone(),
            employer: document.employer.clone(),
            cbc: document.cbc.clone(),
            state: document.state.clone(),
            keywords: document.keywords.clone(),
            year: document.year,
            is_public: Some(document.is_public),
            is_archived: Some(document.is_archived),
        }
    }

    fn clear_details(&mut self) {
        self.status = None;
        self.expiration_date = None;
        self.effective_date = None;
        self.award_date = None;
        self.arbitrator = None;
        self.outcome = None;
    }
}

/// Partial metadata as sent by the client. Every field distinguishes
/// "not sent" from "cleared".
#[derive(Debug, Clone)]
pub struct DocumentPatch {
    pub title: Patch<String>,
    pub description: Patch<String>,
    pub document_type: Patch<String>,
    pub category_group: Patch<String>,
    pub database_source: Patch<String>,
    pub status: Patch<String>,
    pub expiration_date: Patch<NaiveDate>,
    pub effective_date: Patch<NaiveDate>,
    pub award_date: Patch<NaiveDate>,
    pub arbitrator: Patch<String>,
    pub outcome: Patch<String>,
    pub employer: Patch<String>,
    pub cbc: Patch<String>,
    pub state: Patch<String>,
    pub keywords: Patch<String>,
    pub year: Patch<i32>,
    pub is_public: Patch<bool>,
    pub is_archived: Patch<bool>,
    pub folder_id: Patch<Uuid>,
    pub affiliate_id: Patch<Uuid>,
}

impl DocumentPatch {
    pub fn from_json(metadata: &Value) -> AppResult<Self> {
        let empty = Map::new();
        let object = match metadata {
            Value::Null => &empty,
            Value::Object(object) => object,
            _ => {
                return Err(AppError::invalid_field(
                    "metadata",
                    "metadata must be a JSON object",
                ))
            }
        };

        let mut errors = FieldErrors::new();
        let patch = DocumentPatch {
            title: take(object, "title", &mut errors),
            description: take(object, "description", &mut errors),
            document_type: take(object, "type", &mut errors),
            category_group: take(object, "category_group", &mut errors),
            database_source: take(object, "database_source", &mut errors),
            status: take(object, "status", &mut errors),
            expiration_date: take(object, "expiration_date", &mut errors),
            effective_date: take(object, "effective_date", &mut errors),
            award_date: take(object, "award_date", &mut errors),
            arbitrator: take(object, "arbitrator", &mut errors),
            outcome: take(object, "outcome", &mut errors),
            employer: take(object, "employer", &mut errors),
            cbc: take(object, "cbc", &mut errors),
            state: take(object, "state", &mut errors),
            keywords: take(object, "keywords", &mut errors),
            year: take(object, "year", &mut errors),
            is_public: take(object, "is_public", &mut errors),
            is_archived: take(object, "is_archived", &mut errors),
            folder_id: take(object, "folder_id", &mut errors),
            affiliate_id: take(object, "affiliate_id", &mut errors),
        };

        if errors.is_empty() {
            Ok(patch)
        } else {
            Err(AppError::validation(errors))
        }
    }

    /// Applies the patch over `draft`.
    pub fn apply(self, draft: DocumentDraft) -> DocumentDraft {
        DocumentDraft {
            title: self.title.apply(draft.title),
            description: self.description.apply(draft.description),
            document_type: self.document_type.apply(draft.document_type),
            category_group: self.category_group.apply(draft.category_group),
            database_source: self.database_source.apply(draft.database_source),
            status: self.status.apply(draft.status),
            expiration_date: self.expiration_date.apply(draft.expiration_date),
            effective_date: self.effective_date.apply(draft.effective_date),
            award_date: self.award_date.apply(draft.award_date),
            arbitrator: self.arbitrator.apply(draft.arbitrator),
            outcome: self.outcome.apply(draft.outcome),
            employer: self.employer.apply(draft.employer),
            cbc: self.cbc.apply(draft.cbc),
            state: self.state.apply(draft.state),
            keywords: self.keywords.apply(draft.keywords),
            year: self.year.apply(draft.year),
            is_public: self.is_public.apply(draft.is_public),
            is_archived: self.is_archived.apply(draft.is_archived),
        }
    }

    /// Merges the patch into an existing row. Switching the type drops the
    /// old type's stored fields; fields sent in the same patch are kept and
    /// validated against the new type.
    pub fn merge_into(self, document: &Document) -> DocumentDraft {
        let mut base = DocumentDraft::from_document(document);
        if let Patch::Value(new_type) = &self.document_type {
            if !new_type.trim().eq_ignore_ascii_case(&document.document_type) {
                base.clear_details();
            }
        }
        self.apply(base)
    }
}

fn take<T: serde::de::DeserializeOwned>(
    object: &Map<String, Value>,
    key: &str,
    errors: &mut FieldErrors,
) -> Patch<T> {
    field(object, key).unwrap_or_else(|_| {
        errors
            .entry(key.to_string())
            .or_default()
            .push(format!("{key} has an invalid value"));
        Patch::Omitted
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedDocument {
    pub title: String,
    pub description: Option<String>,
    pub category_group: CategoryGroup,
    pub database_source: Option<DatabaseSource>,
    pub details: DocumentDetails,
    pub employer: Option<String>,
    pub cbc: Option<String>,
    pub state: Option<String>,
    pub keywords: Option<String>,
    pub year: Option<i32>,
    pub is_public: bool,
    pub is_archived: bool,
}

impl ValidatedDocument {
    pub fn document_type(&self) -> DocumentType {
        self.details.document_type()
    }
}

struct Validator {
    errors: FieldErrors,
}

impl Validator {
    fn push(&mut self, key: &str, message: impl Into<String>) {
        self.errors
            .entry(key.to_string())
            .or_default()
            .push(message.into());
    }

    fn text(&mut self, key: &str, value: Option<String>, max: usize) -> Option<String> {
        let value = value
            .map(|raw| raw.trim().to_string())
            .filter(|trimmed| !trimmed.is_empty())?;
        if value.chars().count() > max {
            self.push(key, format!("{key} may not be greater than {max} characters"));
        }
        Some(value)
    }

    fn required<T>(&mut self, key: &str, value: Option<T>, kind: DocumentType) -> Option<T> {
        if value.is_none() {
            self.push(key, format!("{key} is required for {kind} documents"));
        }
        value
    }

    fn forbidden<T>(&mut self, key: &str, value: &Option<T>, kind: &str) {
        if value.is_some() {
            self.push(key, format!("{key} is not allowed for {kind} documents"));
        }
    }

    fn parse<T: FromStr<Err = String>>(&mut self, key: &str, value: Option<&str>) -> Option<T> {
        let raw = value?;
        match raw.parse() {
            Ok(parsed) => Some(parsed),
            Err(message) => {
                self.push(key, message);
                None
            }
        }
    }
}

/// Checks a draft and produces the row values to store. An active contract
/// whose expiration date is already behind `today` is stored as expired.
/// Archiving anything but a contract from the contracts repository is
/// silently turned off.
pub fn validate(draft: DocumentDraft, today: NaiveDate) -> AppResult<ValidatedDocument> {
    let mut v = Validator {
        errors: FieldErrors::new(),
    };

    let title = v.text("title", draft.title, MAX_TITLE_LEN);
    if title.is_none() {
        v.push("title", "title is required");
    }
    let description = v.text("description", draft.description, usize::MAX);
    let employer = v.text("employer", draft.employer, 255);
    let cbc = v.text("cbc", draft.cbc, 100);
    let state = v.text("state", draft.state, 50);
    let keywords = v.text("keywords", draft.keywords, usize::MAX);
    let arbitrator = v.text("arbitrator", draft.arbitrator, 255);
    let outcome = v.text("outcome", draft.outcome, 255);
    let status_raw = v.text("status", draft.status, 32);

    let document_type: Option<DocumentType> = v.parse("type", draft.document_type.as_deref());
    if draft.document_type.is_none() {
        v.push("type", "type is required");
    }
    let category_group = match draft.category_group.as_deref() {
        Some(raw) => match raw.parse::<CategoryGroup>() {
            Ok(group) => Some(group),
            Err(_) => {
                v.push("category_group", "category_group must be one of: research, governance");
                None
            }
        },
        None => {
            v.push("category_group", "category_group is required");
            None
        }
    };
    let database_source: Option<DatabaseSource> =
        v.parse("database_source", draft.database_source.as_deref());

    if let Some(year) = draft.year {
        if !(1900..=9999).contains(&year) {
            v.push("year", "year must be between 1900 and 9999");
        }
    }

    let details = document_type.and_then(|kind| match kind {
        DocumentType::Contract => {
            v.forbidden("award_date", &draft.award_date, "contract");
            v.forbidden("arbitrator", &arbitrator, "contract");
            v.forbidden("outcome", &outcome, "contract");
            let status = v.required("status", status_raw.clone(), kind);
            let status: Option<ContractStatus> = v.parse("status", status.as_deref());
            let expiration_date = v.required("expiration_date", draft.expiration_date, kind);
            let effective_date = v.required("effective_date", draft.effective_date, kind);
            match (status, expiration_date, effective_date) {
                (Some(status), Some(expiration_date), Some(effective_date)) => {
                    Some(DocumentDetails::Contract {
                        status: initial_status(status, expiration_date, today),
                        expiration_date,
                        effective_date,
                    })
                }
                _ => None,
            }
        }
        DocumentType::Arbitration => {
            v.forbidden("status", &status_raw, "arbitration");
            v.forbidden("expiration_date", &draft.expiration_date, "arbitration");
            v.forbidden("effective_date", &draft.effective_date, "arbitration");
            let award_date = v.required("award_date", draft.award_date, kind);
            let arbitrator = v.required("arbitrator", arbitrator.clone(), kind);
            let outcome = v.required("outcome", outcome.clone(), kind);
            match (award_date, arbitrator, outcome) {
                (Some(award_date), Some(arbitrator), Some(outcome)) => {
                    Some(DocumentDetails::Arbitration {
                        award_date,
                        arbitrator,
                        outcome,
                    })
                }
                _ => None,
            }
        }
        other => {
            let label = other.as_str();
            v.forbidden("status", &status_raw, label);
            v.forbidden("expiration_date", &draft.expiration_date, label);
            v.forbidden("effective_date", &draft.effective_date, label);
            v.forbidden("award_date", &draft.award_date, label);
            v.forbidden("arbitrator", &arbitrator, label);
            v.forbidden("outcome", &outcome, label);
            Some(DocumentDetails::Other(other))
        }
    });

    if !v.errors.is_empty() {
        return Err(AppError::validation(v.errors));
    }

    let (Some(title), Some(category_group), Some(details)) = (title, category_group, details)
    else {
        return Err(AppError::internal("document validation left required fields unset"));
    };

    let requested_archive = draft.is_archived.unwrap_or(false);
    let is_archived = requested_archive && archive_allowed(database_source, details.document_type());
    if requested_archive && !is_archived {
        tracing::debug!(
            document_type = %details.document_type(),
            "ignoring is_archived outside the contracts repository"
        );
    }

    Ok(ValidatedDocument {
        title,
        description,
        category_group,
        database_source,
        details,
        employer,
        cbc,
        state,
        keywords,
        year: draft.year,
        is_public: draft.is_public.unwrap_or(false),
        is_archived,
    })
}

pub fn archive_allowed(source: Option<DatabaseSource>, kind: DocumentType) -> bool {
    source == Some(DatabaseSource::Contracts) && kind == DocumentType::Contract
}

fn initial_status(status: ContractStatus, expiration_date: NaiveDate, today: NaiveDate) -> ContractStatus {
    if status == ContractStatus::Active && expiration_date < today {
        ContractStatus::Expired
    } else {
        status
    }
}

/// Moves every active contract whose expiration date has passed to expired.
pub fn refresh_contract_statuses(conn: &mut PgConnection, today: NaiveDate) -> AppResult<usize> {
    let updated = diesel::update(
        documents::table
            .filter(documents::document_type.eq(DocumentType::Contract.as_str()))
            .filter(documents::status.eq(ContractStatus::Active.as_str()))
            .filter(documents::expiration_date.lt(today)),
    )
    .set((
        documents::status.eq(ContractStatus::Expired.as_str()),
        documents::updated_at.eq(Utc::now().naive_utc()),
    ))
    .execute(conn)?;

    tracing::info!(updated, %today, "refreshed contract statuses");
    Ok(updated)
}

/// Checks the original filename and size; returns the lowercase extension.
pub fn validate_upload(filename: &str, size: usize, max_bytes: usize) -> AppResult<String> {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()));

    let Some(extension) = extension else {
        return Err(AppError::invalid_field(
            "file",
            format!("file must be one of: {}", ALLOWED_EXTENSIONS.join(", ")),
        ));
    };
    if size == 0 {
        return Err(AppError::invalid_field("file", "file must not be empty"));
    }
    if size > max_bytes {
        return Err(AppError::invalid_field(
            "file",
            format!("file may not be greater than {} kilobytes", max_bytes / 1024),
        ));
    }
    Ok(extension)
}

/// `documents/<owner>/<slug>-<timestamp>-<random>.<ext>`; national
/// documents use `national` as the owner segment.
pub fn stored_file_path<R: Rng>(
    owner: Option<Uuid>,
    original_filename: &str,
    extension: &str,
    now: DateTime<Utc>,
    rng: &mut R,
) -> String {
    let stem = original_filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(original_filename);
    let suffix: String = rng
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    let owner = owner
        .map(|id| id.to_string())
        .unwrap_or_else(|| "national".to_string());

    format!(
        "documents/{owner}/{}-{}-{suffix}.{extension}",
        slugify(stem),
        now.format("%Y%m%d%H%M%S")
    )
}

fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let mut slug: String = slug.chars().take(MAX_SLUG_LEN).collect();
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        "document".to_string()
    } else {
        slug
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentOrder {
    #[default]
    Newest,
    Oldest,
    Title,
}
