use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::currency_service::{round_money, CurrencyService, RateSource};
use super::tax_service::{apply_rules, out_of_range, percent_of, TaxLine, TaxService};
use super::{ServiceError, ServiceResult};
use crate::database::models::employee::Employee;
use crate::database::models::payroll::{Deduction, PayrollRun, TaxRule};

const RUN_COLUMNS: &str = "id, name, period_start, period_end, pay_date, currency, status, employee_count, \
    total_gross, total_deductions, total_taxes, total_net, processed_at, approved_at, paid_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Draft,
    Processed,
    Approved,
    Paid,
    Cancelled,
}

impl RunStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(RunStatus::Draft),
            "processed" => Some(RunStatus::Processed),
            "approved" => Some(RunStatus::Approved),
            "paid" => Some(RunStatus::Paid),
            "cancelled" => Some(RunStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Draft => "draft",
            RunStatus::Processed => "processed",
            RunStatus::Approved => "approved",
            RunStatus::Paid => "paid",
            RunStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_become(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Draft, RunStatus::Processed)
                | (RunStatus::Processed, RunStatus::Approved)
                | (RunStatus::Approved, RunStatus::Paid)
                | (RunStatus::Draft, RunStatus::Cancelled)
                | (RunStatus::Processed, RunStatus::Cancelled)
        )
    }
}

pub fn check_transition(run_id: Uuid, current: &str, next: RunStatus) -> ServiceResult<()> {
    let allowed = RunStatus::parse(current).map_or(false, |status| status.can_become(next));
    if allowed {
        Ok(())
    } else {
        Err(ServiceError::InvalidState(format!(
            "Payroll run {} is {} and cannot become {}",
            run_id,
            current,
            next.as_str()
        )))
    }
}

/// Pay periods per year for an employee's pay frequency. Unset means monthly.
pub fn periods_per_year(frequency: Option<&str>) -> Decimal {
    match frequency {
        Some("weekly") => Decimal::from(52),
        Some("biweekly") => Decimal::from(26),
        Some("semimonthly") => Decimal::from(24),
        Some("annual") => Decimal::ONE,
        _ => Decimal::from(12),
    }
}

pub fn deduction_active(deduction: &Deduction, period_start: NaiveDate, period_end: NaiveDate) -> bool {
    deduction.start_date <= period_end && deduction.end_date.map_or(true, |end| end >= period_start)
}

#[derive(Debug, Clone, Serialize)]
pub struct DeductionLine {
    pub deduction_id: Uuid,
    pub name: String,
    pub is_pre_tax: bool,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaycheckComputation {
    pub gross: Decimal,
    pub pre_tax_deductions: Decimal,
    pub taxable: Decimal,
    pub taxes: Decimal,
    pub post_tax_deductions: Decimal,
    pub net: Decimal,
    pub deductions: Vec<DeductionLine>,
    pub tax_lines: Vec<TaxLine>,
}

/// Fixed deductions use `amount`; otherwise `percentage` of gross. `None` on decimal overflow.
pub fn deduction_amount(deduction: &Deduction, gross: Decimal) -> Option<Decimal> {
    match (deduction.amount, deduction.percentage) {
        (Some(amount), _) => Some(round_money(amount)),
        (None, Some(pct)) => percent_of(gross, pct).map(round_money),
        (None, None) => Some(Decimal::ZERO),
    }
}

fn checked_sum<'a>(amounts: impl IntoIterator<Item = &'a Decimal>) -> ServiceResult<Decimal> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(*amount))
        .ok_or_else(|| out_of_range("gross"))
}

/// Per-period gross in the run currency
pub fn period_gross(base_salary: Decimal, periods: Decimal, rate: Decimal) -> ServiceResult<Decimal> {
    base_salary
        .checked_div(periods)
        .and_then(|per_period| per_period.checked_mul(rate))
        .map(round_money)
        .ok_or_else(|| out_of_range("base_salary"))
}

/// Net = gross - pre-tax deductions - taxes - post-tax deductions. Not clamped at zero.
pub fn compute_paycheck(
    gross: Decimal,
    deductions: &[&Deduction],
    jurisdiction: Option<&str>,
    rules: &[TaxRule],
    on: NaiveDate,
) -> ServiceResult<PaycheckComputation> {
    let lines = deductions
        .iter()
        .map(|d| {
            Ok(DeductionLine {
                deduction_id: d.id,
                name: d.name.clone(),
                is_pre_tax: d.is_pre_tax,
                amount: deduction_amount(d, gross).ok_or_else(|| out_of_range("gross"))?,
            })
        })
        .collect::<ServiceResult<Vec<_>>>()?;
    let pre_tax = checked_sum(lines.iter().filter(|l| l.is_pre_tax).map(|l| &l.amount))?;
    let post_tax = checked_sum(lines.iter().filter(|l| !l.is_pre_tax).map(|l| &l.amount))?;

    let (taxable, taxes, tax_lines) = match jurisdiction {
        Some(j) => {
            let calc = apply_rules(j, rules, gross, pre_tax, on)?;
            (calc.taxable, calc.total_tax, calc.lines)
        }
        None => {
            let taxable = gross.checked_sub(pre_tax).ok_or_else(|| out_of_range("gross"))?;
            (taxable.max(Decimal::ZERO), Decimal::ZERO, Vec::new())
        }
    };
    let net = gross
        .checked_sub(pre_tax)
        .and_then(|n| n.checked_sub(taxes))
        .and_then(|n| n.checked_sub(post_tax))
        .ok_or_else(|| out_of_range("gross"))?;

    Ok(PaycheckComputation {
        gross,
        pre_tax_deductions: pre_tax,
        taxable,
        taxes,
        post_tax_deductions: post_tax,
        net,
        deductions: lines,
        tax_lines,
    })
}

#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    count: i32,
    gross: Decimal,
    deductions: Decimal,
    taxes: Decimal,
    net: Decimal,
}

impl Totals {
    fn add(&mut self, p: &PaycheckComputation) -> ServiceResult<()> {
        self.count += 1;
        self.gross = checked_sum([&self.gross, &p.gross])?;
        self.deductions = checked_sum([&self.deductions, &p.pre_tax_deductions, &p.post_tax_deductions])?;
        self.taxes = checked_sum([&self.taxes, &p.taxes])?;
        self.net = checked_sum([&self.net, &p.net])?;
        Ok(())
    }
}

pub struct PayrollRunService {
    pool: PgPool,
    organization_id: Uuid,
}

impl PayrollRunService {
    pub fn new(pool: PgPool, organization_id: Uuid) -> Self {
        Self { pool, organization_id }
    }

    /// Compute and store one paycheck per eligible employee, then move the run to `processed`
    pub async fn process(&self, run_id: Uuid, by: Uuid) -> ServiceResult<PayrollRun> {
        let fx = CurrencyService::for_organization(self.pool.clone(), self.organization_id);
        let mut tx = self.pool.begin().await?;
        let run = self.lock_run(&mut tx, run_id).await?;
        check_transition(run.id, &run.status, RunStatus::Processed)?;

        let employees = sqlx::query_as::<_, Employee>(&format!(
            "SELECT {} FROM employees WHERE organization_id = $1 AND deleted_at IS NULL \
             AND employment_status = 'active' AND hire_date <= $2 AND base_salary IS NOT NULL \
             ORDER BY employee_number",
            Employee::COLUMNS
        ))
        .bind(self.organization_id)
        .bind(run.period_end)
        .fetch_all(&mut *tx)
        .await?;

        let deductions = sqlx::query_as::<_, Deduction>(
            "SELECT id, employee_id, name, amount, percentage, is_pre_tax, start_date, end_date \
             FROM deductions WHERE organization_id = $1 AND deleted_at IS NULL \
             AND start_date <= $3 AND (end_date IS NULL OR end_date >= $2) ORDER BY start_date, name",
        )
        .bind(self.organization_id)
        .bind(run.period_start)
        .bind(run.period_end)
        .fetch_all(&mut *tx)
        .await?;

        let mut by_employee: HashMap<Uuid, Vec<&Deduction>> = HashMap::new();
        for d in deductions.iter().filter(|d| deduction_active(d, run.period_start, run.period_end)) {
            by_employee.entry(d.employee_id).or_default().push(d);
        }

        let mut rates: HashMap<String, Decimal> = HashMap::new();
        let mut rules: HashMap<String, Vec<TaxRule>> = HashMap::new();
        let mut totals = Totals::default();

        for employee in &employees {
            let Some(base_salary) = employee.base_salary else { continue };
            let salary_currency = employee.salary_currency.clone().unwrap_or_else(|| run.currency.clone());
            let rate = match rates.get(&salary_currency).copied() {
                Some(rate) => rate,
                None => {
                    let rate = resolve_rate(&fx, &salary_currency, &run.currency, run.pay_date).await?;
                    rates.insert(salary_currency.clone(), rate);
                    rate
                }
            };

            let periods = periods_per_year(employee.pay_frequency.as_deref());
            let gross = period_gross(base_salary, periods, rate)?;

            let jurisdiction = employee.tax_jurisdiction.as_deref();
            if let Some(j) = jurisdiction {
                if !rules.contains_key(j) {
                    let loaded = TaxService::rules_for(&mut *tx, self.organization_id, j, run.pay_date).await?;
                    rules.insert(j.to_string(), loaded);
                }
            }
            let employee_rules = jurisdiction.and_then(|j| rules.get(j)).map(Vec::as_slice).unwrap_or(&[]);
            let employee_deductions = by_employee.get(&employee.id).map(Vec::as_slice).unwrap_or(&[]);

            let paycheck = compute_paycheck(gross, employee_deductions, jurisdiction, employee_rules, run.pay_date)?;
            let breakdown = json!({
                "base_salary": base_salary,
                "salary_currency": salary_currency,
                "pay_frequency": employee.pay_frequency,
                "periods_per_year": periods,
                "exchange_rate": rate,
                "taxable": paycheck.taxable,
                "deductions": paycheck.deductions,
                "taxes": paycheck.tax_lines,
            });

            sqlx::query(
                "INSERT INTO paychecks (organization_id, payroll_run_id, employee_id, currency, gross_amount, \
                 pre_tax_deductions, taxes, post_tax_deductions, net_amount, breakdown, created_by) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(self.organization_id)
            .bind(run.id)
            .bind(employee.id)
            .bind(&run.currency)
            .bind(paycheck.gross)
            .bind(paycheck.pre_tax_deductions)
            .bind(paycheck.taxes)
            .bind(paycheck.post_tax_deductions)
            .bind(paycheck.net)
            .bind(breakdown)
            .bind(by)
            .execute(&mut *tx)
            .await?;

            totals.add(&paycheck)?;
        }

        let processed = sqlx::query_as::<_, PayrollRun>(&format!(
            "UPDATE payroll_runs SET status = 'processed', employee_count = $3, total_gross = $4, \
             total_deductions = $5, total_taxes = $6, total_net = $7, processed_at = now(), processed_by = $8, \
             updated_at = now(), updated_by = $8 WHERE organization_id = $1 AND id = $2 RETURNING {}",
            RUN_COLUMNS
        ))
        .bind(self.organization_id)
        .bind(run.id)
        .bind(totals.count)
        .bind(totals.gross)
        .bind(totals.deductions)
        .bind(totals.taxes)
        .bind(totals.net)
        .bind(by)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(
            payroll_run_id = %run.id,
            employees = totals.count,
            total_net = %totals.net,
            "Processed payroll run"
        );
        Ok(processed)
    }

    pub async fn approve(&self, run_id: Uuid, by: Uuid) -> ServiceResult<PayrollRun> {
        self.advance(run_id, by, RunStatus::Approved).await
    }

    pub async fn pay(&self, run_id: Uuid, by: Uuid) -> ServiceResult<PayrollRun> {
        self.advance(run_id, by, RunStatus::Paid).await
    }

    pub async fn cancel(&self, run_id: Uuid, by: Uuid) -> ServiceResult<PayrollRun> {
        self.advance(run_id, by, RunStatus::Cancelled).await
    }

    async fn advance(&self, run_id: Uuid, by: Uuid, next: RunStatus) -> ServiceResult<PayrollRun> {
        let mut tx = self.pool.begin().await?;
        let run = self.lock_run(&mut tx, run_id).await?;
        check_transition(run.id, &run.status, next)?;

        let stamp = match next {
            RunStatus::Approved => ", approved_at = now(), approved_by = $4",
            RunStatus::Paid => ", paid_at = now()",
            _ => "",
        };
        let updated = sqlx::query_as::<_, PayrollRun>(&format!(
            "UPDATE payroll_runs SET status = $3, updated_at = now(), updated_by = $4{} \
             WHERE organization_id = $1 AND id = $2 RETURNING {}",
            stamp, RUN_COLUMNS
        ))
        .bind(self.organization_id)
        .bind(run.id)
        .bind(next.as_str())
        .bind(by)
        .fetch_one(&mut *tx)
        .await?;

        if next == RunStatus::Cancelled {
            let voided = sqlx::query(
                "UPDATE paychecks SET deleted_at = now(), deleted_by = $3 \
                 WHERE organization_id = $1 AND payroll_run_id = $2 AND deleted_at IS NULL",
            )
            .bind(self.organization_id)
            .bind(run.id)
            .bind(by)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            tracing::info!(payroll_run_id = %run.id, voided, "Voided paychecks of cancelled run");
        }

        tx.commit().await?;
        tracing::info!(payroll_run_id = %run.id, from = %run.status, to = next.as_str(), "Payroll run status changed");
        Ok(updated)
    }

    async fn lock_run(&self, tx: &mut Transaction<'_, Postgres>, run_id: Uuid) -> ServiceResult<PayrollRun> {
        sqlx::query_as::<_, PayrollRun>(&format!(
            "SELECT {} FROM payroll_runs WHERE organization_id = $1 AND id = $2 AND deleted_at IS NULL FOR UPDATE",
            RUN_COLUMNS
        ))
        .bind(self.organization_id)
        .bind(run_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Payroll run {} not found", run_id)))
    }
}

async fn resolve_rate<S: RateSource>(
    fx: &CurrencyService<S>,
    from: &str,
    to: &str,
    on: NaiveDate,
) -> ServiceResult<Decimal> {
    match fx.rate(from, to, on).await {
        Ok(resolved) => Ok(resolved.rate),
        Err(ServiceError::NotFound(msg)) => Err(ServiceError::unprocessable("currency", msg)),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn deduction(name: &str, amount: Option<&str>, pct: Option<&str>, pre_tax: bool) -> Deduction {
        Deduction {
            id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            name: name.into(),
            amount: amount.map(dec),
            percentage: pct.map(dec),
            is_pre_tax: pre_tax,
            start_date: day("2024-01-01"),
            end_date: None,
        }
    }

    #[test]
    fn status_machine() {
        use RunStatus::*;
        assert!(Draft.can_become(Processed));
        assert!(Processed.can_become(Approved));
        assert!(Approved.can_become(Paid));
        assert!(Draft.can_become(Cancelled));
        assert!(Processed.can_become(Cancelled));
        assert!(!Approved.can_become(Cancelled));
        assert!(!Paid.can_become(Cancelled));
        assert!(!Draft.can_become(Approved));
        assert!(!Cancelled.can_become(Draft));

        let id = Uuid::new_v4();
        assert!(check_transition(id, "draft", Processed).is_ok());
        assert!(matches!(check_transition(id, "paid", Approved), Err(ServiceError::InvalidState(_))));
        assert!(check_transition(id, "bogus", Processed).is_err());
    }

    #[test]
    fn pay_periods() {
        assert_eq!(periods_per_year(Some("weekly")), dec("52"));
        assert_eq!(periods_per_year(Some("biweekly")), dec("26"));
        assert_eq!(periods_per_year(Some("semimonthly")), dec("24"));
        assert_eq!(periods_per_year(Some("annual")), dec("1"));
        assert_eq!(periods_per_year(None), dec("12"));
    }

    #[test]
    fn deduction_windows() {
        let mut d = deduction("401k", Some("100"), None, true);
        d.start_date = day("2024-02-01");
        d.end_date = Some(day("2024-02-29"));
        assert!(deduction_active(&d, day("2024-02-01"), day("2024-02-29")));
        assert!(deduction_active(&d, day("2024-01-15"), day("2024-02-14")));
        assert!(!deduction_active(&d, day("2024-03-01"), day("2024-03-31")));
        assert!(!deduction_active(&d, day("2024-01-01"), day("2024-01-31")));
    }

    #[test]
    fn paycheck_math() {
        let rules = vec![TaxRule {
            id: Uuid::new_v4(),
            jurisdiction: "NL".into(),
            name: "income".into(),
            tax_type: "percentage".into(),
            rate: Some(dec("20")),
            brackets: None,
            effective_from: day("2024-01-01"),
            effective_to: None,
        }];
        let pension = deduction("pension", None, Some("5"), true);
        let union = deduction("union", Some("25"), None, false);
        let p = compute_paycheck(dec("5000"), &[&pension, &union], Some("NL"), &rules, day("2024-01-31")).unwrap();
        assert_eq!(p.pre_tax_deductions, dec("250"));
        assert_eq!(p.taxable, dec("4750"));
        assert_eq!(p.taxes, dec("950"));
        assert_eq!(p.post_tax_deductions, dec("25"));
        assert_eq!(p.net, dec("3775"));
        assert_eq!(p.deductions.len(), 2);
    }

    #[test]
    fn net_is_not_clamped_and_no_jurisdiction_means_no_tax() {
        let garnish = deduction("garnishment", Some("1200"), None, false);
        let p = compute_paycheck(dec("1000"), &[&garnish], None, &[], day("2024-01-31")).unwrap();
        assert_eq!(p.taxes, Decimal::ZERO);
        assert_eq!(p.net, dec("-200"));
    }

    #[test]
    fn overflowing_amounts_are_unprocessable() {
        let everything = deduction("everything", None, Some("200"), true);
        assert_eq!(deduction_amount(&everything, Decimal::MAX), None);
        let err = compute_paycheck(Decimal::MAX, &[&everything], None, &[], day("2024-01-31")).unwrap_err();
        assert!(matches!(err, ServiceError::Unprocessable { .. }));

        let a = deduction("a", Some("79228162514264337593543950335"), None, false);
        let b = deduction("b", Some("1"), None, false);
        assert!(compute_paycheck(dec("1"), &[&a, &b], None, &[], day("2024-01-31")).is_err());

        assert_eq!(period_gross(dec("120000"), dec("12"), dec("0.9")).unwrap(), dec("9000.00"));
        assert!(matches!(
            period_gross(Decimal::MAX, Decimal::ONE, dec("2")),
            Err(ServiceError::Unprocessable { .. })
        ));
    }
}
