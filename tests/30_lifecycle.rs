mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

use hr_payroll_api::database::DatabaseManager;
use hr_payroll_api::services::organization_service::{CreateOrganization, OrganizationService};
use hr_payroll_api::types::Role;

fn num(value: &Value) -> f64 {
    match value {
        Value::String(s) => s.parse().unwrap_or(f64::NAN),
        other => other.as_f64().unwrap_or(f64::NAN),
    }
}

fn id_of(body: &Value) -> String {
    body["data"]["id"].as_str().expect("id").to_string()
}

fn salary_hidden(row: &Value) -> bool {
    row["base_salary"].is_null()
        && row["redacted_fields"]
            .as_array()
            .map_or(false, |fields| fields.iter().any(|f| f == "base_salary"))
}

fn row_for<'a>(body: &'a Value, id: &str) -> &'a Value {
    body["data"]
        .as_array()
        .and_then(|rows| rows.iter().find(|r| r["id"] == id))
        .expect("row in page")
}

// One test function so the shared pool lives on a single runtime
#[tokio::test]
async fn hris_and_payroll_lifecycle() -> Result<()> {
    if !common::database_configured() {
        eprintln!("DATABASE_URL not set; skipping lifecycle test");
        return Ok(());
    }

    let pool = DatabaseManager::pool().await?;
    DatabaseManager::run_migrations(&pool).await?;
    let suffix = Uuid::new_v4().simple().to_string();
    let org = OrganizationService::new(pool.clone())
        .create(CreateOrganization {
            name: "Lifecycle Test".into(),
            slug: format!("lifecycle-{}", &suffix[..12]),
            default_currency: "USD".into(),
        })
        .await?;
    let admin = common::token(org.id, Role::Admin, &[]);
    let token = Some(admin.as_str());

    // departments and employees
    let (status, dept) = common::call(
        Method::POST,
        "/api/hris/departments",
        token,
        Some(json!({ "name": "Engineering", "code": "ENG" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", dept);
    let dept_id = id_of(&dept);

    let employee = json!({
        "employee_number": "E-001",
        "first_name": "Ada",
        "last_name": "Lovelace",
        "email": "ada@example.com",
        "hire_date": "2020-01-01",
        "department_id": dept_id,
        "base_salary": "120000",
        "salary_currency": "USD",
        "pay_frequency": "monthly",
        "tax_jurisdiction": "US-CA"
    });
    let (status, created) = common::call(Method::POST, "/api/hris/employees", token, Some(employee.clone())).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    let employee_id = id_of(&created);
    assert_eq!(created["data"]["employment_status"], "active");

    let (status, _) = common::call(Method::POST, "/api/hris/employees", token, Some(employee)).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = common::call(
        Method::POST,
        "/api/hris/employees",
        token,
        Some(json!({
            "employee_number": "E-002",
            "first_name": "Grace",
            "last_name": "Hopper",
            "email": "grace@example.com",
            "hire_date": "2021-01-01",
            "department_id": Uuid::new_v4()
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // soft delete hides the row until restored
    let (status, temp) = common::call(
        Method::POST,
        "/api/hris/locations",
        token,
        Some(json!({ "name": "Remote" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let location = format!("/api/hris/locations/{}", id_of(&temp));
    let (status, _) = common::call(Method::DELETE, &location, token, None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = common::call(Method::GET, &location, token, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = common::call(Method::POST, &format!("{}/restore", location), token, None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = common::call(Method::GET, &location, token, None).await?;
    assert_eq!(status, StatusCode::OK);

    // payroll: 120000 / 12 = 10000 gross, 10% tax
    let (status, _) = common::call(
        Method::POST,
        "/api/payroll/tax-rules",
        token,
        Some(json!({
            "jurisdiction": "US-CA",
            "name": "State income",
            "tax_type": "percentage",
            "rate": "10",
            "effective_from": "2020-01-01"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, run) = common::call(
        Method::POST,
        "/api/payroll/payroll-runs",
        token,
        Some(json!({
            "name": "January 2024",
            "period_start": "2024-01-01",
            "period_end": "2024-01-31",
            "pay_date": "2024-02-01",
            "currency": "USD"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", run);
    let run_path = format!("/api/payroll/payroll-runs/{}", id_of(&run));

    let (status, _) = common::call(Method::POST, &format!("{}/pay", run_path), token, None).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, processed) = common::call(Method::POST, &format!("{}/process", run_path), token, None).await?;
    assert_eq!(status, StatusCode::OK, "{}", processed);
    assert_eq!(processed["data"]["status"], "processed");
    assert_eq!(processed["data"]["employee_count"], 1);
    assert_eq!(num(&processed["data"]["total_gross"]), 10000.0);
    assert_eq!(num(&processed["data"]["total_taxes"]), 1000.0);
    assert_eq!(num(&processed["data"]["total_net"]), 9000.0);

    // processed runs are no longer editable through the generic routes
    let (status, _) = common::call(Method::PATCH, &run_path, token, Some(json!({ "name": "Renamed" }))).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    for (action, expected) in [("approve", "approved"), ("pay", "paid")] {
        let (status, body) = common::call(Method::POST, &format!("{}/{}", run_path, action), token, None).await?;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["status"], expected);
    }

    // employment lifecycle
    let employee_path = format!("/api/hris/employees/{}", employee_id);
    let (status, terminated) = common::call(
        Method::POST,
        &format!("{}/terminate", employee_path),
        token,
        Some(json!({ "termination_date": "2024-03-31", "reason": "Moved abroad" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{}", terminated);
    assert_eq!(terminated["data"]["employment_status"], "terminated");

    let (status, _) = common::call(
        Method::POST,
        &format!("{}/rehire", employee_path),
        token,
        Some(json!({ "rehire_date": "2024-03-01" })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, rehired) = common::call(
        Method::POST,
        &format!("{}/rehire", employee_path),
        token,
        Some(json!({ "rehire_date": "2024-06-01", "job_title": "Principal Engineer" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{}", rehired);
    assert_eq!(rehired["data"]["employment_status"], "active");
    assert_eq!(rehired["data"]["rehire_count"], 1);

    let (status, history) = common::call(Method::GET, &format!("{}/history", employee_path), token, None).await?;
    assert_eq!(status, StatusCode::OK);
    let periods = history["data"].as_array().expect("history");
    assert_eq!(periods.len(), 2);
    assert_eq!(periods[0]["is_rehire"], true);
    assert!(periods[0]["end_date"].is_null());
    assert_eq!(periods[1]["end_date"], "2024-03-31");

    // VIP employees
    let (status, vip) = common::call(
        Method::POST,
        "/api/hris/employees",
        token,
        Some(json!({
            "employee_number": "E-003",
            "first_name": "Grace",
            "last_name": "Hopper",
            "email": "grace@example.com",
            "hire_date": "2021-01-01",
            "base_salary": "250000",
            "personal_email": "grace@home.example",
            "salary_currency": "USD"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", vip);
    let vip_id = id_of(&vip);
    let vip_path = format!("/api/hris/employees/{}", vip_id);

    let (status, marked) =
        common::call(Method::POST, &format!("{}/vip", vip_path), token, Some(json!({ "reason": "Board member" }))).await?;
    assert_eq!(status, StatusCode::OK, "{}", marked);
    assert_eq!(marked["data"]["is_vip"], true);

    let manager_id = Uuid::new_v4();
    let manager = common::token_for(
        manager_id,
        org.id,
        None,
        Role::Manager,
        &["hris:employees:*", "hris:vip:read", "hris:employment-history:*"],
    );
    let manager = Some(manager.as_str());

    // denied: restricted fields are nulled on every read path
    let (status, body) = common::call(Method::GET, &vip_path, manager, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(salary_hidden(&body["data"]), "{}", body);
    assert!(body["data"]["personal_email"].is_null());
    assert_eq!(body["data"]["first_name"], "Grace");

    let (status, list) = common::call(Method::GET, "/api/hris/employees", manager, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(salary_hidden(row_for(&list, &vip_id)));
    assert_eq!(num(&row_for(&list, &employee_id)["base_salary"]), 120000.0);

    let (status, _) = common::call(Method::PATCH, &vip_path, manager, Some(json!({ "base_salary": "1" }))).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) =
        common::call(Method::PATCH, &vip_path, manager, Some(json!({ "job_title": "Rear Admiral" }))).await?;
    assert_eq!(status, StatusCode::OK);

    // predicates and ordering on restricted fields skip rows the caller cannot see
    let salary_search = json!({ "where": { "base_salary": { "$gte": 200000 } } });
    let (status, found) =
        common::call(Method::POST, "/api/find/hris/employees", manager, Some(salary_search.clone())).await?;
    assert_eq!(status, StatusCode::OK, "{}", found);
    assert_eq!(found["meta"]["total"], 0);
    assert!(found["data"].as_array().expect("rows").is_empty());
    let (_, found) = common::call(Method::POST, "/api/find/hris/employees", token, Some(salary_search.clone())).await?;
    assert_eq!(found["meta"]["total"], 1);
    let (status, ordered) = common::call(
        Method::POST,
        "/api/find/hris/employees",
        manager,
        Some(json!({ "order": "base_salary desc" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ordered["meta"]["total"], 1);
    assert_eq!(ordered["data"][0]["id"], employee_id.as_str());

    // self and admin see everything
    let own = common::token_for(
        Uuid::new_v4(),
        org.id,
        Some(Uuid::parse_str(&vip_id)?),
        Role::Employee,
        &["hris:employees:read"],
    );
    let (status, body) = common::call(Method::GET, &vip_path, Some(&own), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(num(&body["data"]["base_salary"]), 250000.0);
    assert!(body["data"].get("redacted_fields").is_none());
    let (_, body) = common::call(Method::GET, &vip_path, token, None).await?;
    assert_eq!(num(&body["data"]["base_salary"]), 250000.0);

    // explicit grant, then revocation
    let (status, grant) = common::call(
        Method::POST,
        &format!("{}/vip/grants", vip_path),
        token,
        Some(json!({ "user_id": manager_id, "reason": "Compensation review" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", grant);
    let (_, body) = common::call(Method::GET, &vip_path, manager, None).await?;
    assert_eq!(num(&body["data"]["base_salary"]), 250000.0);
    let (_, found) = common::call(Method::POST, "/api/find/hris/employees", manager, Some(salary_search.clone())).await?;
    assert_eq!(found["meta"]["total"], 1);
    let (_, decision) =
        common::call(Method::POST, &format!("{}/vip/check-access", vip_path), manager, Some(json!({}))).await?;
    assert_eq!(decision["data"]["allowed"], true);
    assert_eq!(decision["data"]["reason"], "explicit_grant");

    let (status, _) = common::call(
        Method::DELETE,
        &format!("{}/vip/grants/{}", vip_path, id_of(&grant)),
        token,
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = common::call(Method::GET, &vip_path, manager, None).await?;
    assert!(salary_hidden(&body["data"]));

    // expired grants count for nothing
    let (status, _) = common::call(
        Method::POST,
        &format!("{}/vip/grants", vip_path),
        token,
        Some(json!({ "user_id": manager_id, "expires_at": "2000-01-01T00:00:00Z" })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    sqlx::query(
        "INSERT INTO vip_access_grants (organization_id, employee_id, user_id, reason, expires_at) \
         VALUES ($1, $2, $3, 'lapsed', now() - interval '1 day')",
    )
    .bind(org.id)
    .bind(Uuid::parse_str(&vip_id)?)
    .bind(manager_id)
    .execute(&pool)
    .await?;
    let (_, body) = common::call(Method::GET, &vip_path, manager, None).await?;
    assert!(salary_hidden(&body["data"]));
    let (_, decision) =
        common::call(Method::POST, &format!("{}/vip/check-access", vip_path), manager, Some(json!({}))).await?;
    assert_eq!(decision["data"]["allowed"], false);
    assert_eq!(decision["data"]["reason"], "not_authorized");

    // lifecycle responses carry the same redaction
    let (status, terminated) = common::call(
        Method::POST,
        &format!("{}/terminate", vip_path),
        manager,
        Some(json!({ "termination_date": "2024-09-30" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{}", terminated);
    assert_eq!(terminated["data"]["employment_status"], "terminated");
    assert!(salary_hidden(&terminated["data"]));

    // a terminated employee only comes back through rehire
    let (status, body) =
        common::call(Method::PATCH, &vip_path, manager, Some(json!({ "employment_status": "active" }))).await?;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);
    let (status, rehired) = common::call(
        Method::POST,
        &format!("{}/rehire", vip_path),
        manager,
        Some(json!({ "rehire_date": "2024-11-01" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{}", rehired);
    assert_eq!(rehired["data"]["employment_status"], "active");
    assert!(salary_hidden(&rehired["data"]));

    // marking by a non-admin manager is logged with that authority
    let vip_manager = common::token(org.id, Role::Manager, &["hris:vip:*"]);
    let (status, _) = common::call(
        Method::POST,
        &format!("{}/vip", employee_path),
        Some(&vip_manager),
        Some(json!({ "reason": "Acting CEO" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = common::call(Method::DELETE, &format!("{}/vip", employee_path), Some(&vip_manager), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (_, log) = common::call(Method::GET, &format!("{}/vip/access-log", employee_path), token, None).await?;
    let entries = log["data"].as_array().expect("log");
    assert!(entries.iter().any(|e| e["action"] == "mark_vip" && e["reason"] == "manage_permission"));
    assert!(entries.iter().any(|e| e["action"] == "unmark_vip" && e["reason"] == "manage_permission"));

    let (status, log) = common::call(Method::GET, &format!("{}/vip/access-log", vip_path), token, None).await?;
    assert_eq!(status, StatusCode::OK);
    let entries = log["data"].as_array().expect("log");
    assert!(entries.iter().any(|e| e["action"] == "mark_vip" && e["reason"] == "admin_override"));
    assert!(entries.iter().any(|e| e["allowed"] == false && e["reason"] == "not_authorized"));
    assert!(entries.iter().any(|e| e["reason"] == "explicit_grant"));
    assert!(entries.iter().any(|e| e["reason"] == "self_access"));

    // amounts beyond decimal range are client errors
    let (status, _) = common::call(
        Method::POST,
        "/api/payroll/exchange-rates",
        token,
        Some(json!({ "base_currency": "USD", "quote_currency": "JPY", "rate": "150", "effective_date": "2024-01-01" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = common::call(
        Method::POST,
        "/api/payroll/currency/convert",
        token,
        Some(json!({ "amount": "79228162514264337593543950335", "from": "USD", "to": "JPY", "date": "2024-06-01" })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", body);
    let (status, body) = common::call(
        Method::POST,
        "/api/payroll/tax/calculate",
        token,
        Some(json!({ "jurisdiction": "US-CA", "gross": "79228162514264337593543950335", "date": "2024-06-01" })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", body);

    // tokens naming an unknown organization are refused
    let outsider = common::token(Uuid::new_v4(), Role::Admin, &[]);
    let (status, _) = common::call(Method::GET, &employee_path, Some(&outsider), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}
