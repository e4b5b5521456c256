//! Caller identity.
//!
//! Authentication happens in front of this server. The upstream gateway authenticates the user and forwards the
//! resolved identity in the `X-Owner-Id` and `X-Owner-Role` headers. A request without an owner id is refused.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use log::*;
use order_engine::{db_types::Role, AccessScope};

use crate::errors::{AuthError, ServerError};

pub const OWNER_ID_HEADER: &str = "X-Owner-Id";
pub const OWNER_ROLE_HEADER: &str = "X-Owner-Role";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub owner_id: String,
    pub role: Role,
}

impl Caller {
    pub fn new<S: Into<String>>(owner_id: S, role: Role) -> Self {
        Self { owner_id: owner_id.into(), role }
    }

    /// The orders this caller may see and act on.
    pub fn scope(&self) -> AccessScope {
        match self.role {
            Role::Customer => AccessScope::Owner(self.owner_id.clone()),
            Role::Vendor => AccessScope::Vendor(self.owner_id.clone()),
            Role::Admin => AccessScope::Any,
        }
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }

    pub fn from_request_headers(req: &HttpRequest) -> Result<Self, AuthError> {
        let owner_id = req
            .headers()
            .get(OWNER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(AuthError::MissingIdentity)?;
        let role = match req.headers().get(OWNER_ROLE_HEADER) {
            None => Role::Customer,
            Some(v) => v
                .to_str()
                .map_err(|e| AuthError::InvalidIdentity(e.to_string()))?
                .parse::<Role>()
                .map_err(|e| AuthError::InvalidIdentity(e.to_string()))?,
        };
        Ok(Self::new(owner_id, role))
    }
}

impl FromRequest for Caller {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        // The ACL middleware may already have resolved the caller
        if let Some(caller) = req.extensions().get::<Caller>() {
            return ready(Ok(caller.clone()));
        }
        let result = Self::from_request_headers(req).map_err(|e| {
            debug!("💻️ Request to {} has no usable identity. {e}", req.path());
            ServerError::AuthenticationError(e)
        });
        ready(result)
    }
}
