//! Caller identity, tenant scope and the capability checks every
//! repository and officer operation runs before touching the store.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::sql_types::Bool;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::Document;
use crate::schema::{documents, role_grants, roles, users};
use crate::state::AppState;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_NATIONAL: &str = "national";
pub const ROLE_OFFICER: &str = "officer";
pub const ROLE_MEMBER: &str = "member";

const GLOBAL_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_NATIONAL];

pub type DocumentPredicate = Box<dyn BoxableExpression<documents::table, Pg, SqlType = Bool>>;

#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: Uuid,
    pub username: String,
    pub affiliate_id: Option<i64>,
    pub roles: Vec<String>,
}

impl Caller {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|held| held == role)
    }

    pub fn is_global(&self) -> bool {
        GLOBAL_ROLES.iter().any(|role| self.has_role(role))
    }

    /// Tenant filter applied to every listing. Tenant-scoped callers that
    /// belong to no affiliate cannot see anything.
    pub fn scope(&self) -> AppResult<Scope> {
        if self.is_global() {
            return Ok(Scope::global());
        }
        self.affiliate_id.map(Scope::tenant).ok_or_else(|| {
            tracing::warn!(user_id = %self.user_id, "tenant-scoped caller has no affiliate");
            AppError::forbidden()
        })
    }

    pub fn can_view(&self, affiliate_id: i64) -> bool {
        self.is_global() || self.affiliate_id == Some(affiliate_id)
    }

    pub fn ensure_view(&self, affiliate_id: i64) -> AppResult<()> {
        if self.can_view(affiliate_id) {
            Ok(())
        } else {
            Err(AppError::forbidden())
        }
    }

    /// Global callers manage every affiliate; officers manage their own.
    pub fn ensure_manage(&self, affiliate_id: i64) -> AppResult<()> {
        if self.is_global()
            || (self.has_role(ROLE_OFFICER) && self.affiliate_id == Some(affiliate_id))
        {
            Ok(())
        } else {
            Err(AppError::forbidden())
        }
    }

    pub fn ensure_manage_national(&self) -> AppResult<()> {
        if self.is_global() {
            Ok(())
        } else {
            Err(AppError::forbidden())
        }
    }

    /// Write access to a document owned by `affiliate_id` (`None` is national).
    pub fn ensure_manage_owner(&self, affiliate_id: Option<i64>) -> AppResult<()> {
        match affiliate_id {
            Some(affiliate_id) => self.ensure_manage(affiliate_id),
            None => self.ensure_manage_national(),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        let mut conn = state.db()?;
        load_caller(&mut conn, user)
    }
}

pub fn load_caller(conn: &mut PgConnection, user: AuthenticatedUser) -> AppResult<Caller> {
    let affiliate_id: Option<i64> = users::table
        .find(user.user_id)
        .select(users::affiliate_id)
        .first::<Option<i64>>(conn)
        .optional()?
        .ok_or_else(|| {
            tracing::warn!(user_id = %user.user_id, "token subject no longer exists");
            AppError::unauthorized()
        })?;

    let roles: Vec<String> = role_grants::table
        .inner_join(roles::table)
        .filter(role_grants::user_id.eq(user.user_id))
        .select(roles::name)
        .order(roles::name.asc())
        .load(conn)?;

    Ok(Caller {
        user_id: user.user_id,
        username: user.username,
        affiliate_id,
        roles,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    pub tenant_filter: Option<i64>,
}

impl Scope {
    pub fn global() -> Self {
        Self {
            tenant_filter: None,
        }
    }

    pub fn tenant(affiliate_id: i64) -> Self {
        Self {
            tenant_filter: Some(affiliate_id),
        }
    }

    /// Mandatory predicate for document listings: tenant callers see their
    /// own affiliate's rows plus anything public.
    pub fn document_visibility(&self) -> DocumentPredicate {
        match self.tenant_filter {
            None => Box::new(true.into_sql::<Bool>()),
            Some(affiliate_id) => Box::new(
                documents::affiliate_id
                    .is_not_null()
                    .and(documents::affiliate_id.assume_not_null().eq(affiliate_id))
                    .or(documents::is_public.eq(true)),
            ),
        }
    }

    pub fn can_see_document(&self, document: &Document) -> bool {
        match self.tenant_filter {
            None => true,
            Some(affiliate_id) => document.is_public || document.affiliate_id == Some(affiliate_id),
        }
    }
}
