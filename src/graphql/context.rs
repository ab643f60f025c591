//! Per-request context helpers
//!
//! The HTTP layer resolves the bearer token into a [`Viewer`] and attaches it
//! to every request; resolvers read it back through [`ContextExt`].

use async_graphql::{Context, ErrorExtensions, Result};
use std::sync::Arc;

use crate::db::Page;
use crate::models::User;
use crate::services::{ServiceError, Services};

/// The authenticated user of the current request, if any
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<User>);

impl ErrorExtensions for ServiceError {
    fn extend(&self) -> async_graphql::Error {
        if let ServiceError::Internal(err) = self {
            tracing::error!(error = ?err, "Internal error while resolving a GraphQL field");
        }
        let code = self.code();
        async_graphql::Error::new(self.public_message()).extend_with(|_, e| e.set("code", code))
    }
}

pub trait ContextExt {
    fn services(&self) -> &Arc<Services>;
    fn viewer(&self) -> Option<&User>;
    fn require_user(&self) -> Result<&User>;
    fn require_admin(&self) -> Result<&User>;
}

impl ContextExt for Context<'_> {
    fn services(&self) -> &Arc<Services> {
        self.data_unchecked::<Arc<Services>>()
    }

    fn viewer(&self) -> Option<&User> {
        self.data_opt::<Viewer>().and_then(|v| v.0.as_ref())
    }

    fn require_user(&self) -> Result<&User> {
        self.viewer().ok_or_else(|| ServiceError::unauthenticated().extend())
    }

    fn require_admin(&self) -> Result<&User> {
        let user = self.require_user()?;
        if user.is_admin() {
            Ok(user)
        } else {
            Err(ServiceError::forbidden().extend())
        }
    }
}

/// `limit`/`offset` arguments as a bounded page
pub fn page(limit: Option<i32>, offset: Option<i32>) -> Page {
    Page::new(limit, offset)
}
