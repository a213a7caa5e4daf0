use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use super::currency_service::round_money;
use super::{ServiceError, ServiceResult};
use crate::database::models::payroll::TaxRule;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxKind {
    /// `rate` is a fixed amount per pay period
    Flat,
    /// `rate` percent of the taxable amount
    Percentage,
    /// Marginal brackets
    Progressive,
}

impl TaxKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "flat" => Some(TaxKind::Flat),
            "percentage" => Some(TaxKind::Percentage),
            "progressive" => Some(TaxKind::Progressive),
            _ => None,
        }
    }
}

/// Income up to `up_to` (exclusive of lower brackets) taxed at `rate` percent.
/// A null `up_to` is open-ended and only valid on the last bracket.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Bracket {
    pub up_to: Option<Decimal>,
    pub rate: Decimal,
}

pub fn parse_brackets(value: &Value) -> Result<Vec<Bracket>, String> {
    let brackets: Vec<Bracket> =
        serde_json::from_value(value.clone()).map_err(|e| format!("Invalid brackets: {}", e))?;
    if brackets.is_empty() {
        return Err("Brackets must not be empty".to_string());
    }
    let mut floor = Decimal::ZERO;
    for (i, bracket) in brackets.iter().enumerate() {
        if bracket.rate.is_sign_negative() {
            return Err(format!("Bracket {} has a negative rate", i));
        }
        match bracket.up_to {
            Some(limit) if limit <= floor => {
                return Err(format!("Bracket {} must end above {}", i, floor));
            }
            Some(limit) => floor = limit,
            None if i + 1 != brackets.len() => {
                return Err("Only the last bracket may be open-ended".to_string());
            }
            None => {}
        }
    }
    Ok(brackets)
}

/// Marginal tax. Income above the last closed bracket is taxed at the last rate.
/// `None` when the amount overflows decimal range.
pub fn progressive_tax(taxable: Decimal, brackets: &[Bracket]) -> Option<Decimal> {
    let mut tax = Decimal::ZERO;
    let mut lower = Decimal::ZERO;
    for bracket in brackets {
        if taxable <= lower {
            return Some(tax);
        }
        let upper = match bracket.up_to {
            Some(limit) => taxable.min(limit),
            None => taxable,
        };
        tax = tax.checked_add(percent_of(upper.checked_sub(lower)?, bracket.rate)?)?;
        lower = upper;
    }
    if taxable > lower {
        if let Some(last) = brackets.last() {
            tax = tax.checked_add(percent_of(taxable.checked_sub(lower)?, last.rate)?)?;
        }
    }
    Some(tax)
}

pub fn percent_of(amount: Decimal, rate: Decimal) -> Option<Decimal> {
    amount.checked_mul(rate)?.checked_div(HUNDRED)
}

/// Arithmetic that leaves decimal range is a client input problem, never a panic
pub fn out_of_range(field: &str) -> ServiceError {
    ServiceError::unprocessable(field, "Amount is too large to calculate")
}

#[derive(Debug, Clone, Serialize)]
pub struct TaxLine {
    pub rule_id: Uuid,
    pub name: String,
    pub tax_type: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaxCalculation {
    pub jurisdiction: String,
    pub date: NaiveDate,
    pub gross: Decimal,
    pub pre_tax_deductions: Decimal,
    pub taxable: Decimal,
    pub lines: Vec<TaxLine>,
    pub total_tax: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaxRequest {
    pub jurisdiction: String,
    pub gross: Decimal,
    #[serde(default)]
    pub pre_tax_deductions: Decimal,
    pub date: Option<NaiveDate>,
}

pub fn rule_applies(rule: &TaxRule, on: NaiveDate) -> bool {
    rule.effective_from <= on && rule.effective_to.map_or(true, |end| on <= end)
}

/// Apply every rule effective on `on` to `gross - pre_tax`, clamped at zero
pub fn apply_rules(
    jurisdiction: &str,
    rules: &[TaxRule],
    gross: Decimal,
    pre_tax: Decimal,
    on: NaiveDate,
) -> ServiceResult<TaxCalculation> {
    let taxable = gross.checked_sub(pre_tax).ok_or_else(|| out_of_range("gross"))?.max(Decimal::ZERO);
    let mut lines = Vec::new();

    for rule in rules.iter().filter(|r| r.jurisdiction == jurisdiction && rule_applies(r, on)) {
        let kind = TaxKind::parse(&rule.tax_type).ok_or_else(|| {
            ServiceError::Validation(format!("Tax rule {} has unknown type '{}'", rule.id, rule.tax_type))
        })?;
        let raw = match kind {
            TaxKind::Flat => rule_rate(rule)?,
            TaxKind::Percentage => percent_of(taxable, rule_rate(rule)?).ok_or_else(|| out_of_range("gross"))?,
            TaxKind::Progressive => {
                let value = rule.brackets.as_ref().ok_or_else(|| {
                    ServiceError::Validation(format!("Progressive tax rule {} has no brackets", rule.id))
                })?;
                let brackets = parse_brackets(value)
                    .map_err(|e| ServiceError::Validation(format!("Tax rule {}: {}", rule.id, e)))?;
                progressive_tax(taxable, &brackets).ok_or_else(|| out_of_range("gross"))?
            }
        };
        lines.push(TaxLine {
            rule_id: rule.id,
            name: rule.name.clone(),
            tax_type: rule.tax_type.clone(),
            amount: round_money(raw),
        });
    }

    let total_tax = lines
        .iter()
        .try_fold(Decimal::ZERO, |acc, l| acc.checked_add(l.amount))
        .ok_or_else(|| out_of_range("gross"))?;
    Ok(TaxCalculation {
        jurisdiction: jurisdiction.to_string(),
        date: on,
        gross,
        pre_tax_deductions: pre_tax,
        taxable,
        lines,
        total_tax,
    })
}

fn rule_rate(rule: &TaxRule) -> ServiceResult<Decimal> {
    rule.rate
        .ok_or_else(|| ServiceError::Validation(format!("Tax rule {} has no rate", rule.id)))
}

pub struct TaxService {
    pool: PgPool,
    organization_id: Uuid,
}

impl TaxService {
    pub fn new(pool: PgPool, organization_id: Uuid) -> Self {
        Self { pool, organization_id }
    }

    pub async fn rules_for<'c, E>(executor: E, organization_id: Uuid, jurisdiction: &str, on: NaiveDate) -> ServiceResult<Vec<TaxRule>>
    where
        E: sqlx::PgExecutor<'c>,
    {
        let rules = sqlx::query_as::<_, TaxRule>(
            "SELECT id, jurisdiction, name, tax_type, rate, brackets, effective_from, effective_to \
             FROM tax_rules WHERE organization_id = $1 AND jurisdiction = $2 AND deleted_at IS NULL \
             AND effective_from <= $3 AND (effective_to IS NULL OR effective_to >= $3) \
             ORDER BY effective_from, name",
        )
        .bind(organization_id)
        .bind(jurisdiction)
        .bind(on)
        .fetch_all(executor)
        .await?;
        Ok(rules)
    }

    pub async fn calculate(&self, request: TaxRequest) -> ServiceResult<TaxCalculation> {
        if request.jurisdiction.trim().is_empty() {
            return Err(ServiceError::unprocessable("jurisdiction", "Jurisdiction is required"));
        }
        if request.gross.is_sign_negative() {
            return Err(ServiceError::unprocessable("gross", "Gross amount cannot be negative"));
        }
        if request.pre_tax_deductions.is_sign_negative() {
            return Err(ServiceError::unprocessable("pre_tax_deductions", "Deductions cannot be negative"));
        }
        let on = request.date.unwrap_or_else(|| chrono::Utc::now().date_naive());
        let rules = Self::rules_for(&self.pool, self.organization_id, &request.jurisdiction, on).await?;
        tracing::debug!(jurisdiction = %request.jurisdiction, rules = rules.len(), "Calculating tax");
        apply_rules(&request.jurisdiction, &rules, request.gross, request.pre_tax_deductions, on)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn rule(tax_type: &str, rate: Option<&str>, brackets: Option<Value>, from: &str, to: Option<&str>) -> TaxRule {
        TaxRule {
            id: Uuid::new_v4(),
            jurisdiction: "US-CA".into(),
            name: format!("{} tax", tax_type),
            tax_type: tax_type.into(),
            rate: rate.map(dec),
            brackets,
            effective_from: from.parse().unwrap(),
            effective_to: to.map(|d| d.parse().unwrap()),
        }
    }

    fn brackets() -> Value {
        json!([
            { "up_to": "1000", "rate": "10" },
            { "up_to": "5000", "rate": "20" },
            { "up_to": null, "rate": "30" }
        ])
    }

    #[test]
    fn progressive_is_marginal() {
        let b = parse_brackets(&brackets()).unwrap();
        assert_eq!(progressive_tax(dec("500"), &b), Some(dec("50")));
        assert_eq!(progressive_tax(dec("1000"), &b), Some(dec("100")));
        // 100 + 800 + 300
        assert_eq!(progressive_tax(dec("6000"), &b), Some(dec("1200")));
        assert_eq!(progressive_tax(Decimal::ZERO, &b), Some(Decimal::ZERO));
    }

    #[test]
    fn income_beyond_closed_brackets_uses_last_rate() {
        let b = parse_brackets(&json!([{ "up_to": 1000, "rate": 10 }, { "up_to": 2000, "rate": 20 }])).unwrap();
        assert_eq!(progressive_tax(dec("3000"), &b), Some(dec("500")));
    }

    #[test]
    fn amounts_beyond_decimal_range_are_unprocessable() {
        let on: NaiveDate = "2024-06-15".parse().unwrap();
        let huge = Decimal::MAX;
        assert_eq!(progressive_tax(huge, &parse_brackets(&brackets()).unwrap()), None);

        for rules in [
            vec![rule("percentage", Some("150"), None, "2024-01-01", None)],
            vec![rule("progressive", None, Some(brackets()), "2024-01-01", None)],
            vec![
                rule("flat", Some("79228162514264337593543950335"), None, "2024-01-01", None),
                rule("flat", Some("1"), None, "2024-01-01", None),
            ],
        ] {
            let err = apply_rules("US-CA", &rules, huge, Decimal::ZERO, on).unwrap_err();
            assert!(matches!(err, ServiceError::Unprocessable { .. }), "{:?}", err);
        }
        assert!(apply_rules("US-CA", &[], huge, -Decimal::ONE, on).is_err());
    }

    #[test]
    fn bracket_validation() {
        assert!(parse_brackets(&json!([])).is_err());
        assert!(parse_brackets(&json!([{ "up_to": null, "rate": 10 }, { "up_to": 100, "rate": 20 }])).is_err());
        assert!(parse_brackets(&json!([{ "up_to": 100, "rate": 10 }, { "up_to": 50, "rate": 20 }])).is_err());
        assert!(parse_brackets(&json!({ "rate": 10 })).is_err());
    }

    #[test]
    fn applies_effective_rules_and_rounds_lines() {
        let on: NaiveDate = "2024-06-15".parse().unwrap();
        let rules = vec![
            rule("percentage", Some("7.65"), None, "2024-01-01", None),
            rule("flat", Some("12.50"), None, "2024-01-01", Some("2024-12-31")),
            rule("progressive", None, Some(brackets()), "2024-01-01", None),
            rule("flat", Some("99"), None, "2023-01-01", Some("2023-12-31")),
        ];
        let calc = apply_rules("US-CA", &rules, dec("3333.33"), dec("333.33"), on).unwrap();
        assert_eq!(calc.taxable, dec("3000.00"));
        assert_eq!(calc.lines.len(), 3);
        assert_eq!(calc.lines[0].amount, dec("229.50"));
        assert_eq!(calc.lines[1].amount, dec("12.50"));
        assert_eq!(calc.lines[2].amount, dec("500"));
        assert_eq!(calc.total_tax, dec("742.00"));
    }

    #[test]
    fn taxable_never_negative() {
        let on: NaiveDate = "2024-06-15".parse().unwrap();
        let rules = vec![rule("percentage", Some("10"), None, "2024-01-01", None)];
        let calc = apply_rules("US-CA", &rules, dec("100"), dec("250"), on).unwrap();
        assert_eq!(calc.taxable, Decimal::ZERO);
        assert_eq!(calc.total_tax, Decimal::ZERO);
    }

    #[test]
    fn broken_rules_are_reported() {
        let on: NaiveDate = "2024-06-15".parse().unwrap();
        let rules = vec![rule("percentage", None, None, "2024-01-01", None)];
        assert!(matches!(
            apply_rules("US-CA", &rules, dec("100"), Decimal::ZERO, on),
            Err(ServiceError::Validation(_))
        ));
    }
}
