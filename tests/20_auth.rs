mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use uuid::Uuid;

use hr_payroll_api::types::Role;

#[tokio::test]
async fn protected_routes_require_a_token() -> Result<()> {
    for uri in ["/api/auth/whoami", "/api/hris/employees", "/api/payroll/payroll-runs"] {
        let (status, body) = common::call(Method::GET, uri, None, None).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body["code"], "UNAUTHORIZED");
    }
    Ok(())
}

#[tokio::test]
async fn malformed_and_forged_tokens_are_rejected() -> Result<()> {
    let (status, _) = common::call(Method::GET, "/api/auth/whoami", Some("not-a-jwt"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let claims = hr_payroll_api::auth::Claims::new(Uuid::new_v4(), Uuid::new_v4(), None, Role::Admin, vec![]);
    let forged = hr_payroll_api::auth::generate_jwt_with_secret(&claims, "some-other-secret").expect("token");
    let (status, _) = common::call(Method::GET, "/api/auth/whoami", Some(&forged), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn root_routes_need_the_root_role() -> Result<()> {
    let admin = common::token(Uuid::new_v4(), Role::Admin, &["*"]);
    let (status, body) = common::call(Method::GET, "/api/root/organizations", Some(&admin), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = common::call(Method::GET, "/api/root/organizations", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}
