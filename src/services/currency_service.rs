use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::database::models::payroll::ExchangeRate;
use crate::database::record::is_currency_code;

/// Round a monetary amount to the configured money scale, half away from zero
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(crate::config::config().payroll.money_scale, RoundingStrategy::MidpointAwayFromZero)
}

fn round_rate(rate: Decimal) -> Decimal {
    rate.round_dp_with_strategy(crate::config::config().payroll.fx_rate_scale, RoundingStrategy::MidpointAwayFromZero)
}

/// Where exchange rates come from. Returns the newest rate for the exact
/// base/quote pair effective on or before `on`.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn latest_rate(&self, base: &str, quote: &str, on: NaiveDate) -> ServiceResult<Option<ExchangeRate>>;
}

pub struct PgRateSource {
    pool: PgPool,
    organization_id: Uuid,
}

impl PgRateSource {
    pub fn new(pool: PgPool, organization_id: Uuid) -> Self {
        Self { pool, organization_id }
    }
}

#[async_trait]
impl RateSource for PgRateSource {
    async fn latest_rate(&self, base: &str, quote: &str, on: NaiveDate) -> ServiceResult<Option<ExchangeRate>> {
        let rate = sqlx::query_as::<_, ExchangeRate>(
            "SELECT base_currency, quote_currency, rate, effective_date FROM exchange_rates \
             WHERE organization_id = $1 AND base_currency = $2 AND quote_currency = $3 \
             AND effective_date <= $4 AND deleted_at IS NULL \
             ORDER BY effective_date DESC LIMIT 1",
        )
        .bind(self.organization_id)
        .bind(base)
        .bind(quote)
        .bind(on)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateOrigin {
    Identity,
    Direct,
    Inverse,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedRate {
    pub from: String,
    pub to: String,
    pub rate: Decimal,
    pub origin: RateOrigin,
    pub effective_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConvertRequest {
    pub amount: Decimal,
    pub from: String,
    pub to: String,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateQuery {
    pub from: String,
    pub to: String,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    pub amount: Decimal,
    pub converted_amount: Decimal,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub rate: ResolvedRate,
}

pub struct CurrencyService<S: RateSource> {
    source: S,
}

impl CurrencyService<PgRateSource> {
    pub fn for_organization(pool: PgPool, organization_id: Uuid) -> Self {
        Self::new(PgRateSource::new(pool, organization_id))
    }
}

impl<S: RateSource> CurrencyService<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub async fn rate(&self, from: &str, to: &str, on: NaiveDate) -> ServiceResult<ResolvedRate> {
        check_code("from", from)?;
        check_code("to", to)?;

        if from == to {
            return Ok(ResolvedRate {
                from: from.to_string(),
                to: to.to_string(),
                rate: Decimal::ONE,
                origin: RateOrigin::Identity,
                effective_date: None,
            });
        }

        if let Some(direct) = self.source.latest_rate(from, to, on).await? {
            if !direct.rate.is_zero() {
                return Ok(ResolvedRate {
                    from: from.to_string(),
                    to: to.to_string(),
                    rate: direct.rate,
                    origin: RateOrigin::Direct,
                    effective_date: Some(direct.effective_date),
                });
            }
        }

        if let Some(opposite) = self.source.latest_rate(to, from, on).await? {
            if let Some(inverse) = Decimal::ONE.checked_div(opposite.rate) {
                return Ok(ResolvedRate {
                    from: from.to_string(),
                    to: to.to_string(),
                    rate: round_rate(inverse),
                    origin: RateOrigin::Inverse,
                    effective_date: Some(opposite.effective_date),
                });
            }
        }

        Err(ServiceError::NotFound(format!("No exchange rate from {} to {} on or before {}", from, to, on)))
    }

    pub async fn convert(&self, amount: Decimal, from: &str, to: &str, on: NaiveDate) -> ServiceResult<Conversion> {
        let rate = self.rate(from, to, on).await?;
        let converted = amount
            .checked_mul(rate.rate)
            .ok_or_else(|| ServiceError::unprocessable("amount", "Amount is too large to convert"))?;
        Ok(Conversion {
            amount,
            converted_amount: round_money(converted),
            date: on,
            rate,
        })
    }
}

fn check_code(field: &str, code: &str) -> ServiceResult<()> {
    if is_currency_code(code) {
        Ok(())
    } else {
        Err(ServiceError::unprocessable(field, format!("Invalid currency code: {}", code)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    struct StaticRates(Vec<ExchangeRate>);

    #[async_trait]
    impl RateSource for StaticRates {
        async fn latest_rate(&self, base: &str, quote: &str, on: NaiveDate) -> ServiceResult<Option<ExchangeRate>> {
            Ok(self
                .0
                .iter()
                .filter(|r| r.base_currency == base && r.quote_currency == quote && r.effective_date <= on)
                .max_by_key(|r| r.effective_date)
                .cloned())
        }
    }

    fn rate(base: &str, quote: &str, value: &str, date: &str) -> ExchangeRate {
        ExchangeRate {
            base_currency: base.into(),
            quote_currency: quote.into(),
            rate: Decimal::from_str(value).unwrap(),
            effective_date: date.parse().unwrap(),
        }
    }

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn service() -> CurrencyService<StaticRates> {
        CurrencyService::new(StaticRates(vec![
            rate("USD", "EUR", "0.90", "2024-01-01"),
            rate("USD", "EUR", "0.92", "2024-03-01"),
            rate("GBP", "USD", "1.25", "2024-01-01"),
        ]))
    }

    #[tokio::test]
    async fn same_currency_is_identity() {
        let resolved = service().rate("USD", "USD", day("2020-01-01")).await.unwrap();
        assert_eq!(resolved.rate, Decimal::ONE);
        assert_eq!(resolved.origin, RateOrigin::Identity);
    }

    #[tokio::test]
    async fn picks_latest_direct_rate_not_after_date() {
        let svc = service();
        let feb = svc.rate("USD", "EUR", day("2024-02-15")).await.unwrap();
        assert_eq!(feb.rate, Decimal::from_str("0.90").unwrap());
        let apr = svc.rate("USD", "EUR", day("2024-04-01")).await.unwrap();
        assert_eq!(apr.rate, Decimal::from_str("0.92").unwrap());
        assert_eq!(apr.effective_date, Some(day("2024-03-01")));
    }

    #[tokio::test]
    async fn falls_back_to_inverse() {
        let resolved = service().rate("USD", "GBP", day("2024-06-01")).await.unwrap();
        assert_eq!(resolved.origin, RateOrigin::Inverse);
        assert_eq!(resolved.rate, Decimal::from_str("0.8").unwrap());
    }

    #[tokio::test]
    async fn missing_rate_is_not_found() {
        let err = service().rate("USD", "EUR", day("2023-12-31")).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        let err = service().rate("USD", "usd", day("2024-01-01")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unprocessable { .. }));
    }

    #[tokio::test]
    async fn converts_and_rounds() {
        let out = service()
            .convert(Decimal::from_str("1000.555").unwrap(), "USD", "EUR", day("2024-03-02"))
            .await
            .unwrap();
        // 1000.555 * 0.92 = 920.5106
        assert_eq!(out.converted_amount, Decimal::from_str("920.51").unwrap());
    }

    #[tokio::test]
    async fn conversion_beyond_decimal_range_is_unprocessable() {
        let err = service()
            .convert(Decimal::MAX, "GBP", "USD", day("2024-03-02"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unprocessable { field_errors, .. } if field_errors.contains_key("amount")));
    }

    #[test]
    fn money_rounding_is_half_away_from_zero() {
        assert_eq!(round_money(Decimal::from_str("2.345").unwrap()), Decimal::from_str("2.35").unwrap());
        assert_eq!(round_money(Decimal::from_str("-2.345").unwrap()), Decimal::from_str("-2.35").unwrap());
    }
}
