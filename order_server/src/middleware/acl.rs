//! Access control list middleware.
//!
//! Resolves the caller from the identity headers and checks that they hold at least one of the roles the route
//! requires. Requests without an identity get a 401; callers with none of the roles get a 403.

use std::{pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use futures::{
    future::{ok, Ready},
    Future,
};
use log::*;
use order_engine::db_types::Role;

use crate::{
    auth::Caller,
    errors::{AuthError, ServerError},
};

pub struct AclMiddlewareFactory {
    required_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    pub fn new(required_roles: &[Role]) -> Self {
        AclMiddlewareFactory { required_roles: required_roles.to_vec() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AclMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AclMiddlewareService { required_roles: self.required_roles.clone(), service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    required_roles: Vec<Role>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let required_roles = self.required_roles.clone();
        Box::pin(async move {
            let caller = Caller::from_request_headers(req.request()).map_err(|e| {
                debug!("💻️ Refusing anonymous request to {}. {e}", req.path());
                ServerError::AuthenticationError(e)
            })?;
            if !caller.has_any_role(&required_roles) {
                info!("💻️ {} ({}) may not call {}", caller.owner_id, caller.role, req.path());
                let roles = required_roles.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(" or ");
                let e = AuthError::InsufficientPermissions(format!("This action requires the {roles} role"));
                return Err(ServerError::AuthenticationError(e).into());
            }
            req.extensions_mut().insert(caller);
            service.call(req).await
        })
    }
}
