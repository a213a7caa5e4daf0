use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::auth::AuthUser;
use crate::error::ApiError;
use crate::resources::ResourceDef;
use crate::types::Action;

fn auth_user(request: &Request) -> Result<&AuthUser, ApiError> {
    request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))
}

/// Generic resource routes: `<product>:<resource>:<action>` with the action taken from the HTTP method
pub async fn require_resource_permission(
    State(def): State<&'static ResourceDef>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let action = Action::from_method(request.method());
    auth_user(&request)?.require(&def.permission(action))?;
    Ok(next.run(request).await)
}

/// Restoring undoes a delete, so it needs the delete permission
pub async fn require_restore_permission(
    State(def): State<&'static ResourceDef>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    auth_user(&request)?.require(&def.permission(Action::Delete))?;
    Ok(next.run(request).await)
}

/// Fixed permission for a domain route
#[derive(Clone, Copy)]
pub struct RequiredPermission(pub &'static str);

pub async fn require_permission(
    State(RequiredPermission(permission)): State<RequiredPermission>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    auth_user(&request)?.require(permission)?;
    Ok(next.run(request).await)
}

/// Elevated routes: root role only
pub async fn require_root(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = auth_user(&request)?;
    if user.role != crate::types::Role::Root {
        tracing::warn!(user_id = %user.user_id, "Root access denied");
        return Err(ApiError::forbidden("Root access required"));
    }
    Ok(next.run(request).await)
}
