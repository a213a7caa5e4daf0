//! Router assembly: public routes, organization-scoped protected routes and
//! root-only elevated routes, plus the global layers.

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::config;
use crate::error::ApiError;
use crate::handlers::{elevated, protected, public};
use crate::middleware::{
    jwt_auth_middleware, require_permission, require_resource_permission, require_restore_permission, require_root,
    validate_organization_middleware, RequiredPermission,
};
use crate::resources::{ResourceDef, RESOURCES};

pub fn app() -> Router {
    let settings = config();

    let mut router = Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .merge(protected_routes())
        .merge(elevated_routes())
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(settings.api.max_request_size_bytes));

    if let Some(cors) = cors_layer() {
        router = router.layer(cors);
    }
    if settings.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    router
}

async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

fn cors_layer() -> Option<CorsLayer> {
    let security = &config().security;
    if !security.enable_cors {
        return None;
    }
    if security.cors_origins.is_empty() || security.cors_origins.iter().any(|o| o == "*") {
        return Some(CorsLayer::permissive());
    }
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
    )
}

/// JWT first, then organization validation, then per-route permission layers
fn protected_routes() -> Router {
    let mut router = Router::new()
        .route("/api/auth/whoami", get(protected::auth::whoami))
        .route("/api/find/:product/:resource", post(protected::find::find_post));

    for def in RESOURCES.iter().copied() {
        router = router.merge(resource_routes(def));
    }

    router
        .merge(vip_routes())
        .merge(employment_routes())
        .merge(temporal_routes())
        .merge(payroll_routes())
        .merge(approval_routes())
        .layer(from_fn(validate_organization_middleware))
        .layer(from_fn(jwt_auth_middleware))
}

fn guarded(router: Router, permission: &'static str) -> Router {
    router.route_layer(from_fn_with_state(RequiredPermission(permission), require_permission))
}

/// list/create, get/update/delete and restore for one registered resource
fn resource_routes(def: &'static ResourceDef) -> Router {
    use protected::data;

    let base = def.route_base();
    let item = format!("{}/:id", base);

    let crud = if def.read_only {
        Router::new()
            .route(&base, get(data::collection_list))
            .route(&item, get(data::record_get))
    } else {
        Router::new()
            .route(&base, get(data::collection_list).post(data::collection_create))
            .route(
                &item,
                get(data::record_get)
                    .put(data::record_update)
                    .patch(data::record_update)
                    .delete(data::record_delete),
            )
    };
    let crud = crud
        .route_layer(from_fn_with_state(def, require_resource_permission))
        .with_state(def);

    if def.read_only {
        return crud;
    }

    let restore = Router::new()
        .route(&format!("{}/restore", item), post(data::record_restore))
        .route_layer(from_fn_with_state(def, require_restore_permission))
        .with_state(def);

    crud.merge(restore)
}

fn vip_routes() -> Router {
    use protected::vip;

    let manage = Router::new()
        .route("/api/hris/employees/:id/vip", post(vip::mark).delete(vip::unmark))
        .route("/api/hris/employees/:id/vip/grants", get(vip::list_grants).post(vip::grant))
        .route("/api/hris/employees/:id/vip/grants/:grant_id", axum::routing::delete(vip::revoke));

    let read = Router::new()
        .route("/api/hris/vip-employees", get(vip::list_vip))
        .route("/api/hris/employees/:id/vip/check-access", post(vip::check_access))
        .route("/api/hris/employees/:id/vip/access-log", get(vip::access_log));

    guarded(manage, vip::MANAGE).merge(guarded(read, vip::READ))
}

fn employment_routes() -> Router {
    use protected::employment;

    let read = Router::new().route("/api/hris/employees/:id/history", get(employment::history));
    let manage = Router::new()
        .route("/api/hris/employees/:id/terminate", post(employment::terminate))
        .route("/api/hris/employees/:id/rehire", post(employment::rehire));

    guarded(read, employment::READ).merge(guarded(manage, employment::MANAGE))
}

fn temporal_routes() -> Router {
    use protected::temporal;

    guarded(
        Router::new()
            .route("/api/hris/temporal-patterns/:id/evaluate", post(temporal::evaluate))
            .route("/api/hris/temporal-patterns/:id/occurrences", get(temporal::occurrences)),
        temporal::READ,
    )
}

fn payroll_routes() -> Router {
    use protected::{currency, payroll_runs, tax};

    let tax = guarded(Router::new().route("/api/payroll/tax/calculate", post(tax::calculate)), tax::CALCULATE);
    let currency = guarded(
        Router::new()
            .route("/api/payroll/currency/convert", post(currency::convert))
            .route("/api/payroll/currency/rate", get(currency::rate)),
        currency::CONVERT,
    );

    let runs = [
        ("process", post(payroll_runs::process), payroll_runs::PROCESS),
        ("approve", post(payroll_runs::approve), payroll_runs::APPROVE),
        ("pay", post(payroll_runs::pay), payroll_runs::PAY),
        ("cancel", post(payroll_runs::cancel), payroll_runs::CANCEL),
    ]
    .into_iter()
    .fold(Router::new(), |router, (action, handler, permission)| {
        let path = format!("/api/payroll/payroll-runs/:id/{}", action);
        router.merge(guarded(Router::new().route(&path, handler), permission))
    });

    tax.merge(currency).merge(runs)
}

fn approval_routes() -> Router {
    use protected::approvals;

    let decide = Router::new()
        .route("/api/hris/approval-requests/:id/approve", post(approvals::approve))
        .route("/api/hris/approval-requests/:id/reject", post(approvals::reject));
    let cancel = Router::new().route("/api/hris/approval-requests/:id/cancel", post(approvals::cancel));

    guarded(decide, approvals::DECIDE).merge(guarded(cancel, approvals::CANCEL))
}

/// JWT first, then the root role check
fn elevated_routes() -> Router {
    use elevated::root::organization;

    Router::new()
        .route("/api/root/organizations", get(organization::list).post(organization::create))
        .route(
            "/api/root/organizations/:id",
            get(organization::show)
                .put(organization::update)
                .patch(organization::update)
                .delete(organization::delete),
        )
        .route("/api/root/organizations/:id/restore", post(organization::restore))
        .layer(from_fn(require_root))
        .layer(from_fn(jwt_auth_middleware))
}
