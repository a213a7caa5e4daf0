use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::database::models::temporal_pattern::TemporalPattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "daily" => Some(Frequency::Daily),
            "weekly" => Some(Frequency::Weekly),
            "monthly" => Some(Frequency::Monthly),
            "yearly" => Some(Frequency::Yearly),
            _ => None,
        }
    }
}

/// A validated recurrence rule. Unset weekday/day/month fields default to the anchor's.
#[derive(Debug, Clone)]
pub struct Recurrence {
    pub frequency: Frequency,
    pub interval: u32,
    pub days_of_week: Vec<Weekday>,
    pub day_of_month: u32,
    pub month_of_year: u32,
    pub anchor: NaiveDate,
    pub until: Option<NaiveDate>,
}

impl TryFrom<&TemporalPattern> for Recurrence {
    type Error = ServiceError;

    fn try_from(p: &TemporalPattern) -> Result<Self, Self::Error> {
        let frequency = Frequency::parse(&p.frequency)
            .ok_or_else(|| ServiceError::unprocessable("frequency", format!("Unknown frequency '{}'", p.frequency)))?;

        let interval = match p.interval {
            None => 1,
            Some(n) if n >= 1 => n as u32,
            Some(_) => return Err(ServiceError::unprocessable("interval", "Interval must be at least 1")),
        };

        let days_of_week = match &p.days_of_week {
            None | Some(Value::Null) => vec![p.anchor_date.weekday()],
            Some(value) => parse_weekdays(value)?,
        };

        let day_of_month = match p.day_of_month {
            None => p.anchor_date.day(),
            Some(d @ 1..=31) => d as u32,
            Some(_) => return Err(ServiceError::unprocessable("day_of_month", "Day of month must be 1-31")),
        };

        let month_of_year = match p.month_of_year {
            None => p.anchor_date.month(),
            Some(m @ 1..=12) => m as u32,
            Some(_) => return Err(ServiceError::unprocessable("month_of_year", "Month of year must be 1-12")),
        };

        Ok(Recurrence {
            frequency,
            interval,
            days_of_week,
            day_of_month,
            month_of_year,
            anchor: p.anchor_date,
            until: p.until_date,
        })
    }
}

fn parse_weekdays(value: &Value) -> ServiceResult<Vec<Weekday>> {
    let invalid = || ServiceError::unprocessable("days_of_week", "Expected an array of weekday names like \"mon\"");
    let items = value.as_array().ok_or_else(invalid)?;
    if items.is_empty() {
        return Err(invalid());
    }
    items
        .iter()
        .map(|item| item.as_str().and_then(|s| s.parse::<Weekday>().ok()).ok_or_else(invalid))
        .collect()
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map_or(31, |d| d.day())
}

fn month_index(date: NaiveDate) -> i64 {
    date.year() as i64 * 12 + date.month0() as i64
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - chrono::Duration::days(date.weekday().num_days_from_monday() as i64)
}

impl Recurrence {
    pub fn matches(&self, date: NaiveDate) -> bool {
        if date < self.anchor || self.until.map_or(false, |until| date > until) {
            return false;
        }
        let every = self.interval as i64;
        match self.frequency {
            Frequency::Daily => (date - self.anchor).num_days() % every == 0,
            Frequency::Weekly => {
                let weeks = (week_start(date) - week_start(self.anchor)).num_days() / 7;
                weeks % every == 0 && self.days_of_week.contains(&date.weekday())
            }
            Frequency::Monthly => {
                let months = month_index(date) - month_index(self.anchor);
                months % every == 0 && date.day() == self.target_day(date)
            }
            Frequency::Yearly => {
                let years = (date.year() - self.anchor.year()) as i64;
                years % every == 0 && date.month() == self.month_of_year && date.day() == self.target_day(date)
            }
        }
    }

    /// Configured day of month, clamped to the length of `date`'s month
    fn target_day(&self, date: NaiveDate) -> u32 {
        self.day_of_month.min(days_in_month(date.year(), date.month()))
    }

    /// Index of the active period containing `start`, counted from the anchor's
    fn first_period(&self, start: NaiveDate) -> i64 {
        let elapsed = match self.frequency {
            Frequency::Daily => (start - self.anchor).num_days(),
            Frequency::Weekly => (week_start(start) - week_start(self.anchor)).num_days() / 7,
            Frequency::Monthly => month_index(start) - month_index(self.anchor),
            Frequency::Yearly => (start.year() - self.anchor.year()) as i64,
        };
        elapsed.max(0) / self.interval as i64
    }

    /// Candidate dates of the `n`th active period, ascending. `None` past the end of the calendar.
    fn period(&self, n: i64) -> Option<Vec<NaiveDate>> {
        let step = n.checked_mul(self.interval as i64)?;
        match self.frequency {
            Frequency::Daily => Some(vec![self.anchor.checked_add_days(Days::new(u64::try_from(step).ok()?))?]),
            Frequency::Weekly => {
                let days = u64::try_from(step.checked_mul(7)?).ok()?;
                let week = week_start(self.anchor).checked_add_days(Days::new(days))?;
                let mut offsets: Vec<u64> =
                    self.days_of_week.iter().map(|d| d.num_days_from_monday() as u64).collect();
                offsets.sort_unstable();
                offsets.dedup();
                offsets.into_iter().map(|o| week.checked_add_days(Days::new(o))).collect()
            }
            Frequency::Monthly => {
                let index = month_index(self.anchor).checked_add(step)?;
                let year = i32::try_from(index.div_euclid(12)).ok()?;
                self.day_in(year, index.rem_euclid(12) as u32 + 1).map(|d| vec![d])
            }
            Frequency::Yearly => {
                let year = i32::try_from((self.anchor.year() as i64).checked_add(step)?).ok()?;
                self.day_in(year, self.month_of_year).map(|d| vec![d])
            }
        }
    }

    fn day_in(&self, year: i32, month: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, month, 1)?;
        NaiveDate::from_ymd_opt(year, month, self.day_of_month.min(days_in_month(year, month)))
    }

    /// Matching dates in `[from, to]`, at most `limit` of them. Second value is true when truncated.
    /// Walks active periods only, so sparse patterns over long ranges stay cheap.
    pub fn occurrences(&self, from: NaiveDate, to: NaiveDate, limit: usize) -> (Vec<NaiveDate>, bool) {
        let start = from.max(self.anchor);
        let end = match self.until {
            Some(until) => to.min(until),
            None => to,
        };
        let mut found = Vec::new();
        if start > end {
            return (found, false);
        }
        let mut n = self.first_period(start);
        while let Some(dates) = self.period(n) {
            for date in dates {
                if date > end {
                    return (found, false);
                }
                if date >= start && self.matches(date) {
                    if found.len() == limit {
                        return (found, true);
                    }
                    found.push(date);
                }
            }
            n += 1;
        }
        (found, false)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateRequest {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OccurrencesQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub pattern_id: Uuid,
    pub date: NaiveDate,
    pub matches: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Occurrences {
    pub pattern_id: Uuid,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub dates: Vec<NaiveDate>,
    pub truncated: bool,
}

pub struct TemporalPatternService {
    pool: PgPool,
    organization_id: Uuid,
}

impl TemporalPatternService {
    pub fn new(pool: PgPool, organization_id: Uuid) -> Self {
        Self { pool, organization_id }
    }

    async fn load(&self, id: Uuid) -> ServiceResult<(TemporalPattern, Recurrence)> {
        let pattern = sqlx::query_as::<_, TemporalPattern>(&format!(
            "SELECT {} FROM temporal_patterns WHERE organization_id = $1 AND id = $2 AND deleted_at IS NULL",
            TemporalPattern::COLUMNS
        ))
        .bind(self.organization_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Temporal pattern {} not found", id)))?;
        let recurrence = Recurrence::try_from(&pattern)?;
        Ok((pattern, recurrence))
    }

    pub async fn evaluate(&self, id: Uuid, request: EvaluateRequest) -> ServiceResult<Evaluation> {
        let (pattern, recurrence) = self.load(id).await?;
        Ok(Evaluation { pattern_id: pattern.id, date: request.date, matches: recurrence.matches(request.date) })
    }

    pub async fn occurrences(&self, id: Uuid, query: OccurrencesQuery) -> ServiceResult<Occurrences> {
        if query.to < query.from {
            return Err(ServiceError::unprocessable("to", "'to' must not be before 'from'"));
        }
        let max = crate::config::config().payroll.max_pattern_occurrences;
        let limit = query.limit.unwrap_or(max).min(max);
        if limit == 0 {
            return Err(ServiceError::unprocessable("limit", "Limit must be at least 1"));
        }
        let (pattern, recurrence) = self.load(id).await?;
        let (dates, truncated) = recurrence.occurrences(query.from, query.to, limit);
        Ok(Occurrences { pattern_id: pattern.id, from: query.from, to: query.to, dates, truncated })
    }
}
