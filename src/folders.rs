//! Per-affiliate folder trees, one per category group.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::access::Scope;
use crate::audit::{self, AuditEvent, SUBJECT_FOLDER};
use crate::error::{AppError, AppResult};
use crate::models::{Document, DocumentFolder, NewDocumentFolder};
use crate::schema::{document_folders, documents};

pub const MAX_FOLDER_NAME_LEN: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryGroup {
    Research,
    Governance,
}

impl CategoryGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            CategoryGroup::Research => "research",
            CategoryGroup::Governance => "governance",
        }
    }
}

impl fmt::Display for CategoryGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryGroup {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "research" => Ok(CategoryGroup::Research),
            "governance" => Ok(CategoryGroup::Governance),
            _ => Err(AppError::invalid_field(
                "category_group",
                "category_group must be one of: research, governance",
            )),
        }
    }
}

pub fn find_by_public_id(conn: &mut PgConnection, public_id: Uuid) -> AppResult<DocumentFolder> {
    document_folders::table
        .filter(document_folders::public_id.eq(public_id))
        .first::<DocumentFolder>(conn)
        .optional()?
        .ok_or_else(AppError::not_found)
}

/// Returns the affiliate's root folder for `group`, creating it on first
/// access. The partial unique index on root folders turns a concurrent
/// second insert into a no-op, so every caller reads back the same row.
pub fn get_or_create_root(
    conn: &mut PgConnection,
    affiliate_id: i64,
    group: CategoryGroup,
) -> AppResult<DocumentFolder> {
    let inserted = diesel::insert_into(document_folders::table)
        .values(&NewDocumentFolder {
            public_id: Uuid::new_v4(),
            affiliate_id,
            parent_id: None,
            name: None,
            category_group: group.as_str().to_string(),
        })
        .on_conflict_do_nothing()
        .execute(conn)?;

    if inserted > 0 {
        tracing::info!(affiliate_id, category_group = %group, "created root folder");
    }

    let root = document_folders::table
        .filter(document_folders::affiliate_id.eq(affiliate_id))
        .filter(document_folders::category_group.eq(group.as_str()))
        .filter(document_folders::parent_id.is_null())
        .first(conn)?;
    Ok(root)
}

pub fn validate_folder_name(raw: &str) -> AppResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::invalid_field("name", "name is required"));
    }
    if name.chars().count() > MAX_FOLDER_NAME_LEN {
        return Err(AppError::invalid_field(
            "name",
            format!("name may not be greater than {MAX_FOLDER_NAME_LEN} characters"),
        ));
    }
    Ok(name.to_string())
}

/// Creates a named subfolder. Without a parent the folder hangs off the
/// affiliate's root for `group`.
pub fn create_folder(
    conn: &mut PgConnection,
    affiliate_id: i64,
    group: CategoryGroup,
    parent_public_id: Option<Uuid>,
    raw_name: &str,
    actor_id: Uuid,
) -> AppResult<DocumentFolder> {
    let name = validate_folder_name(raw_name)?;

    conn.transaction::<_, AppError, _>(|conn| {
        let parent = match parent_public_id {
            Some(public_id) => {
                let parent = find_by_public_id(conn, public_id)?;
                if parent.affiliate_id != affiliate_id
                    || parent.category_group != group.as_str()
                {
                    return Err(AppError::invalid_field(
                        "parent_id",
                        "parent folder belongs to another affiliate or category group",
                    ));
                }
                parent
            }
            None => get_or_create_root(conn, affiliate_id, group)?,
        };

        let folder: DocumentFolder = diesel::insert_into(document_folders::table)
            .values(&NewDocumentFolder {
                public_id: Uuid::new_v4(),
                affiliate_id,
                parent_id: Some(parent.id),
                name: Some(name.clone()),
                category_group: group.as_str().to_string(),
            })
            .get_result(conn)?;

        audit::record(
            conn,
            Some(actor_id),
            AuditEvent::new("folder.created", SUBJECT_FOLDER, folder.id, name.clone())
                .with_new(json!({ "name": name, "parent_id": parent.public_id })),
        )?;

        tracing::info!(
            affiliate_id,
            folder_id = %folder.public_id,
            parent_id = %parent.public_id,
            "created folder"
        );
        Ok(folder)
    })
}

pub fn rename_folder(
    conn: &mut PgConnection,
    folder: &DocumentFolder,
    raw_name: &str,
    actor_id: Uuid,
) -> AppResult<DocumentFolder> {
    let name = validate_folder_name(raw_name)?;
    if folder.is_root() {
        return Err(AppError::invalid_field(
            "name",
            "the root folder cannot be renamed",
        ));
    }

    conn.transaction::<_, AppError, _>(|conn| {
        let updated: DocumentFolder = diesel::update(document_folders::table.find(folder.id))
            .set((
                document_folders::name.eq(Some(name.as_str())),
                document_folders::updated_at.eq(Utc::now().naive_utc()),
            ))
            .get_result(conn)?;

        audit::record(
            conn,
            Some(actor_id),
            AuditEvent::new("folder.renamed", SUBJECT_FOLDER, folder.id, name.clone())
                .with_old(json!({ "name": folder.name }))
                .with_new(json!({ "name": name })),
        )?;

        tracing::info!(folder_id = %folder.public_id, "renamed folder");
        Ok(updated)
    })
}

/// Every folder of one (affiliate, category group) tree, indexed by id.
pub struct FolderArena {
    folders: HashMap<i64, DocumentFolder>,
}

impl FolderArena {
    pub fn load(conn: &mut PgConnection, affiliate_id: i64, group: &str) -> AppResult<Self> {
        let folders: Vec<DocumentFolder> = document_folders::table
            .filter(document_folders::affiliate_id.eq(affiliate_id))
            .filter(document_folders::category_group.eq(group))
            .load(conn)?;
        Ok(Self::from_folders(folders))
    }

    pub fn from_folders(folders: Vec<DocumentFolder>) -> Self {
        Self {
            folders: folders.into_iter().map(|folder| (folder.id, folder)).collect(),
        }
    }

    /// Root-to-leaf path ending at `folder_id`. Stops at a missing parent or
    /// a cycle instead of looping.
    pub fn breadcrumb(&self, folder_id: i64) -> Vec<&DocumentFolder> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.folders.get(&folder_id);

        while let Some(folder) = current {
            if !seen.insert(folder.id) {
                tracing::warn!(folder_id = folder.id, "folder tree contains a cycle");
                break;
            }
            path.push(folder);
            current = folder.parent_id.and_then(|parent| self.folders.get(&parent));
        }

        path.reverse();
        path
    }

    pub fn children(&self, folder_id: i64) -> Vec<&DocumentFolder> {
        let mut children: Vec<&DocumentFolder> = self
            .folders
            .values()
            .filter(|folder| folder.parent_id == Some(folder_id))
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        children
    }
}

pub struct FolderListing {
    pub folder: DocumentFolder,
    pub path: Vec<DocumentFolder>,
    pub children: Vec<DocumentFolder>,
    pub documents: Vec<Document>,
}

pub fn list_folder(
    conn: &mut PgConnection,
    folder: DocumentFolder,
    scope: Scope,
) -> AppResult<FolderListing> {
    let arena = FolderArena::load(conn, folder.affiliate_id, &folder.category_group)?;
    let path = arena.breadcrumb(folder.id).into_iter().cloned().collect();
    let children = arena.children(folder.id).into_iter().cloned().collect();

    let documents: Vec<Document> = documents::table
        .filter(scope.document_visibility())
        .filter(documents::folder_id.eq(folder.id))
        .filter(documents::category_group.eq(&folder.category_group))
        .order((documents::created_at.desc(), documents::id.desc()))
        .load(conn)?;

    Ok(FolderListing {
        folder,
        path,
        children,
        documents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn folder(id: i64, parent_id: Option<i64>, name: Option<&str>) -> DocumentFolder {
        DocumentFolder {
            id,
            public_id: Uuid::new_v4(),
            affiliate_id: 1,
            parent_id,
            name: name.map(str::to_string),
            category_group: "governance".into(),
            created_at: NaiveDateTime::default(),
            updated_at: NaiveDateTime::default(),
        }
    }

    fn arena() -> FolderArena {
        FolderArena::from_folders(vec![
            folder(4, Some(3), Some("C")),
            folder(1, None, None),
            folder(3, Some(2), Some("B")),
            folder(2, Some(1), Some("A")),
            folder(5, Some(1), Some("Bylaws")),
        ])
    }

    #[test]
    fn breadcrumb_runs_root_to_leaf() {
        let arena = arena();
        let ids: Vec<i64> = arena.breadcrumb(4).iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn breadcrumb_of_root_is_itself() {
        let arena = arena();
        let ids: Vec<i64> = arena.breadcrumb(1).iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn breadcrumb_stops_on_cycles() {
        let arena = FolderArena::from_folders(vec![
            folder(1, Some(2), Some("x")),
            folder(2, Some(1), Some("y")),
        ]);
        assert_eq!(arena.breadcrumb(1).len(), 2);
    }

    #[test]
    fn children_sorted_by_name() {
        let arena = arena();
        let names: Vec<_> = arena
            .children(1)
            .iter()
            .map(|f| f.name.clone().unwrap_or_default())
            .collect();
        assert_eq!(names, vec!["A", "Bylaws"]);
    }

    #[test]
    fn folder_names_are_trimmed_and_bounded() {
        assert_eq!(validate_folder_name("  Minutes ").expect("valid"), "Minutes");
        assert!(validate_folder_name("   ").is_err());
        assert!(validate_folder_name(&"x".repeat(MAX_FOLDER_NAME_LEN)).is_ok());
        assert!(validate_folder_name(&"x".repeat(MAX_FOLDER_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn category_group_parses_case_insensitively() {
        assert_eq!(
            "Research".parse::<CategoryGroup>().expect("group"),
            CategoryGroup::Research
        );
        assert!("finance".parse::<CategoryGroup>().is_err());
    }
}
