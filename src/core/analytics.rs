//! Spending analytics - trends, group-by patterns, vendor rankings and custom reports.
//!
//! Every aggregator reads the organization's expenses through [`ExpenseQuery`] and groups
//! them in memory. Comparisons are always against the same timeframe immediately before
//! the requested one.

use crate::{
    core::{
        expense::{ExpenseQuery, find_expenses},
        session::Actor,
    },
    entities::{Business, Location, business, expense, location},
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, Months, Utc};
use sea_orm::{DatabaseConnection, prelude::*};
use serde::Serialize;
use std::{collections::HashMap, fmt, str::FromStr};

const CATEGORY_TREND_THRESHOLD: f64 = 10.0;
const VENDOR_TREND_THRESHOLD: f64 = 15.0;
const UNASSIGNED_LOCATION: &str = "Unassigned";
const UNKNOWN_VENDOR: &str = "Unknown";

/// Look-back window of an analytics request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    /// Last 7 days, daily buckets
    Last7Days,
    /// Last 30 days, 4 weekly buckets
    Last30Days,
    /// Last 90 days, 13 weekly buckets
    Last90Days,
    /// Last 12 months, monthly buckets
    Last12Months,
}

impl Timeframe {
    /// Start of the window ending at `now`.
    pub fn start(self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let start = match self {
            Self::Last7Days => now.checked_sub_signed(Duration::days(7)),
            Self::Last30Days => now.checked_sub_signed(Duration::days(30)),
            Self::Last90Days => now.checked_sub_signed(Duration::days(90)),
            Self::Last12Months => now.checked_sub_months(Months::new(12)),
        };
        start.ok_or_else(out_of_range)
    }

    /// Back-to-back trend buckets ending at `now`, oldest first.
    fn buckets(self, now: DateTime<Utc>) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>> {
        let (count, days) = match self {
            Self::Last7Days => (7, 1),
            Self::Last30Days => (4, 7),
            Self::Last90Days => (13, 7),
            Self::Last12Months => {
                return (0..12u32)
                    .rev()
                    .map(|k| {
                        let start = now.checked_sub_months(Months::new(k + 1));
                        let end = now.checked_sub_months(Months::new(k));
                        start.zip(end).ok_or_else(out_of_range)
                    })
                    .collect();
            }
        };
        (0..count)
            .rev()
            .map(|k: i64| {
                let end = now.checked_sub_signed(Duration::days(k * days));
                let start = now.checked_sub_signed(Duration::days((k + 1) * days));
                start.zip(end).ok_or_else(out_of_range)
            })
            .collect()
    }

    const fn label_format(self) -> &'static str {
        match self {
            Self::Last7Days => "%Y-%m-%d",
            Self::Last30Days | Self::Last90Days => "%G-W%V",
            Self::Last12Months => "%Y-%m",
        }
    }
}

impl FromStr for Timeframe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last7days" => Ok(Self::Last7Days),
            "last30days" => Ok(Self::Last30Days),
            "last90days" => Ok(Self::Last90Days),
            "last12months" => Ok(Self::Last12Months),
            _ => Err(Error::validation(
                "timeframe",
                format!("unknown timeframe '{s}'"),
            )),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Last7Days => "last7days",
            Self::Last30Days => "last30days",
            Self::Last90Days => "last90days",
            Self::Last12Months => "last12months",
        };
        f.write_str(name)
    }
}

fn out_of_range() -> Error {
    Error::validation("timeframe", "date out of range")
}

/// Direction of spending against the previous period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    /// Above the threshold
    Increasing,
    /// Below the negative threshold
    Decreasing,
    /// Within the threshold
    Stable,
}

impl Trend {
    fn classify(change_percent: f64, threshold: f64) -> Self {
        if change_percent > threshold {
            Self::Increasing
        } else if change_percent < -threshold {
            Self::Decreasing
        } else {
            Self::Stable
        }
    }
}

/// Percentage change from `previous` to `current`; zero without a baseline.
fn percent_change(previous: f64, current: f64) -> f64 {
    if previous > 0.0 {
        (current - previous) / previous * 100.0
    } else {
        0.0
    }
}

/// One bucket of a spending trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    /// Bucket label (day, ISO week or month of its start)
    pub label: String,
    /// Bucket start
    pub period_start: DateTime<Utc>,
    /// Bucket end (exclusive)
    pub period_end: DateTime<Utc>,
    /// Sum of amounts
    pub total_amount: f64,
    /// Number of expenses
    pub transaction_count: usize,
    /// Change against the previous bucket, in percent
    pub change_percent: f64,
}

/// Spending of one group over the requested timeframe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternRecord {
    /// Group key (category, location or vendor name)
    pub key: String,
    /// Sum of amounts
    pub total_amount: f64,
    /// Number of expenses
    pub transaction_count: usize,
    /// Mean amount
    pub average_amount: f64,
    /// Sum of amounts in the previous period
    pub previous_amount: f64,
    /// Change against the previous period, in percent
    pub change_percent: f64,
    /// Classified change
    pub trend: Trend,
}

#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    amount: f64,
    count: usize,
}

impl Totals {
    fn add(&mut self, amount: f64) {
        self.amount += amount;
        self.count += 1;
    }
}

fn group_totals<F>(expenses: &[expense::Model], key: F) -> HashMap<String, Totals>
where
    F: Fn(&expense::Model) -> Option<String>,
{
    let mut groups: HashMap<String, Totals> = HashMap::new();
    for expense in expenses {
        if let Some(k) = key(expense) {
            groups.entry(k).or_default().add(expense.amount);
        }
    }
    groups
}

/// Builds pattern records, ranked by total amount. `threshold` of `None` skips the
/// comparison with the previous period.
fn patterns(
    current: &HashMap<String, Totals>,
    previous: &HashMap<String, Totals>,
    threshold: Option<f64>,
) -> Vec<PatternRecord> {
    let mut records: Vec<PatternRecord> = current
        .iter()
        .map(|(key, totals)| {
            let previous_amount = previous.get(key).map_or(0.0, |t| t.amount);
            let (change_percent, trend) = threshold.map_or((0.0, Trend::Stable), |threshold| {
                let change = percent_change(previous_amount, totals.amount);
                (change, Trend::classify(change, threshold))
            });
            #[allow(clippy::cast_precision_loss)]
            let average_amount = totals.amount / totals.count as f64;
            PatternRecord {
                key: key.clone(),
                total_amount: totals.amount,
                transaction_count: totals.count,
                average_amount,
                previous_amount,
                change_percent,
                trend,
            }
        })
        .collect();
    records.sort_by(|a, b| {
        b.total_amount
            .total_cmp(&a.total_amount)
            .then_with(|| a.key.cmp(&b.key))
    });
    records
}

/// Expenses of the timeframe ending at `now` and of the same timeframe ending where it
/// starts. For `Last12Months` that is the calendar-aligned year before.
async fn current_and_previous(
    db: &DatabaseConnection,
    organization_id: i64,
    timeframe: Timeframe,
    now: DateTime<Utc>,
) -> Result<(Vec<expense::Model>, Vec<expense::Model>)> {
    let start = timeframe.start(now)?;
    let previous_start = timeframe.start(start)?;
    let current = find_expenses(db, organization_id, &ExpenseQuery::between(start, now)).await?;
    let previous =
        find_expenses(db, organization_id, &ExpenseQuery::between(previous_start, start)).await?;
    Ok((current, previous))
}

/// Display label per location id. A name shared by locations of different businesses
/// is qualified as "Business / Location" so each location keeps its own group.
async fn location_names(
    db: &DatabaseConnection,
    organization_id: i64,
) -> Result<HashMap<i64, String>> {
    let locations = Location::find()
        .filter(location::Column::OrganizationId.eq(organization_id))
        .all(db)
        .await?;
    let businesses: HashMap<i64, String> = Business::find()
        .filter(business::Column::OrganizationId.eq(organization_id))
        .all(db)
        .await?
        .into_iter()
        .map(|b| (b.id, b.name))
        .collect();

    let mut name_counts: HashMap<&str, usize> = HashMap::new();
    for l in &locations {
        *name_counts.entry(l.name.as_str()).or_default() += 1;
    }

    Ok(locations
        .iter()
        .map(|l| {
            let label = match businesses.get(&l.business_id) {
                Some(business) if name_counts.get(l.name.as_str()) > Some(&1) => {
                    format!("{business} / {}", l.name)
                }
                _ => l.name.clone(),
            };
            (l.id, label)
        })
        .collect())
}

fn location_key(names: &HashMap<i64, String>, location_id: Option<i64>) -> String {
    location_id
        .and_then(|id| names.get(&id).cloned())
        .unwrap_or_else(|| UNASSIGNED_LOCATION.to_string())
}

/// Spending per bucket over `timeframe`, with the change against the preceding bucket.
/// The first bucket has no predecessor and reports zero change.
pub async fn trend(
    db: &DatabaseConnection,
    actor: &Actor,
    timeframe: Timeframe,
    now: DateTime<Utc>,
) -> Result<Vec<TrendPoint>> {
    let buckets = timeframe.buckets(now)?;
    let Some(first_start) = buckets.first().map(|(start, _)| *start) else {
        return Ok(Vec::new());
    };
    let expenses = find_expenses(
        db,
        actor.organization_id,
        &ExpenseQuery::between(first_start, now),
    )
    .await?;

    let mut totals = vec![Totals::default(); buckets.len()];
    for expense in &expenses {
        if let Some(index) = buckets
            .iter()
            .position(|(start, end)| *start <= expense.date && expense.date < *end)
        {
            totals[index].add(expense.amount);
        }
    }

    let mut previous: Option<f64> = None;
    let format = timeframe.label_format();
    Ok(buckets
        .into_iter()
        .zip(totals)
        .map(|((period_start, period_end), totals)| {
            let change_percent = previous.map_or(0.0, |p| percent_change(p, totals.amount));
            previous = Some(totals.amount);
            TrendPoint {
                label: period_start.format(format).to_string(),
                period_start,
                period_end,
                total_amount: totals.amount,
                transaction_count: totals.count,
                change_percent,
            }
        })
        .collect())
}

/// Spending per primary category, classified with a ±10% threshold.
pub async fn category_patterns(
    db: &DatabaseConnection,
    actor: &Actor,
    timeframe: Timeframe,
    now: DateTime<Utc>,
) -> Result<Vec<PatternRecord>> {
    let (current, previous) = current_and_previous(db, actor.organization_id, timeframe, now).await?;
    let key = |e: &expense::Model| Some(e.category.clone());
    Ok(patterns(
        &group_totals(&current, key),
        &group_totals(&previous, key),
        Some(CATEGORY_TREND_THRESHOLD),
    ))
}

/// Spending per location. Locations carry no baseline comparison and always report
/// [`Trend::Stable`]; expenses without a location group under "Unassigned".
///
/// Each location is its own group. A location name used under several businesses is
/// reported as "Business / Location".
pub async fn location_patterns(
    db: &DatabaseConnection,
    actor: &Actor,
    timeframe: Timeframe,
    now: DateTime<Utc>,
) -> Result<Vec<PatternRecord>> {
    let start = timeframe.start(now)?;
    let expenses = find_expenses(db, actor.organization_id, &ExpenseQuery::between(start, now))
        .await?;
    let names = location_names(db, actor.organization_id).await?;
    let current = group_totals(&expenses, |e| Some(location_key(&names, e.location_id)));
    Ok(patterns(&current, &HashMap::new(), None))
}

/// Top `limit` vendors by spending, classified with a ±15% threshold. Expenses without a
/// vendor are left out.
pub async fn vendor_analysis(
    db: &DatabaseConnection,
    actor: &Actor,
    timeframe: Timeframe,
    limit: usize,
    now: DateTime<Utc>,
) -> Result<Vec<PatternRecord>> {
    let (current, previous) = current_and_previous(db, actor.organization_id, timeframe, now).await?;
    let key = |e: &expense::Model| e.vendor.clone();
    let mut records = patterns(
        &group_totals(&current, key),
        &group_totals(&previous, key),
        Some(VENDOR_TREND_THRESHOLD),
    );
    records.truncate(limit);
    Ok(records)
}

/// Grouping key of a custom report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    /// Calendar day
    Day,
    /// ISO week
    Week,
    /// Calendar month
    Month,
    /// Primary category
    Category,
    /// Location name
    Location,
    /// Vendor name
    Vendor,
}

/// Ordering of a custom report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Oldest first
    Date,
    /// Largest first
    Amount,
    /// Alphabetical by category (groups: by key)
    Category,
}

/// A custom report request.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    /// Which expenses to include
    pub query: ExpenseQuery,
    /// How to group them
    pub group_by: GroupBy,
    /// How to order groups and their expenses
    pub sort_by: SortBy,
}

/// One group of a custom report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportGroup {
    /// Group key
    pub key: String,
    /// Sum of amounts
    pub total_amount: f64,
    /// Number of expenses
    pub transaction_count: usize,
    /// Date of the earliest expense
    pub first_date: DateTime<Utc>,
    /// The grouped expenses
    pub expenses: Vec<expense::Model>,
}

/// A custom report.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Groups in the requested order
    pub groups: Vec<ReportGroup>,
    /// Sum over all groups
    pub total_amount: f64,
    /// Expenses over all groups
    pub transaction_count: usize,
}

fn sort_expenses(expenses: &mut [expense::Model], sort_by: SortBy) {
    match sort_by {
        SortBy::Date => expenses.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id))),
        SortBy::Amount => expenses.sort_by(|a, b| b.amount.total_cmp(&a.amount)),
        SortBy::Category => expenses.sort_by(|a, b| a.category.cmp(&b.category)),
    }
}

/// Runs an arbitrary filter over the caller's organization and groups the result.
///
/// # Arguments
/// * `db` - Database connection
/// * `actor` - Any member of the organization
/// * `request` - Filter, grouping and ordering
///
/// # Returns
/// Groups ordered by `request.sort_by`, with totals over all of them
///
/// # Errors
/// `Validation` when `min_amount` exceeds `max_amount`.
pub async fn custom_report(
    db: &DatabaseConnection,
    actor: &Actor,
    request: &ReportRequest,
) -> Result<Report> {
    let (min, max) = (request.query.min_amount, request.query.max_amount);
    if min.zip(max).is_some_and(|(min, max)| min > max) {
        return Err(Error::validation("min_amount", "must not exceed max_amount"));
    }

    let expenses = find_expenses(db, actor.organization_id, &request.query).await?;
    let names = match request.group_by {
        GroupBy::Location => location_names(db, actor.organization_id).await?,
        _ => HashMap::new(),
    };

    let mut groups: HashMap<String, Vec<expense::Model>> = HashMap::new();
    for expense in expenses {
        let key = match request.group_by {
            GroupBy::Day => expense.date.format("%Y-%m-%d").to_string(),
            GroupBy::Week => expense.date.format("%G-W%V").to_string(),
            GroupBy::Month => expense.date.format("%Y-%m").to_string(),
            GroupBy::Category => expense.category.clone(),
            GroupBy::Location => location_key(&names, expense.location_id),
            GroupBy::Vendor => expense
                .vendor
                .clone()
                .unwrap_or_else(|| UNKNOWN_VENDOR.to_string()),
        };
        groups.entry(key).or_default().push(expense);
    }

    let mut groups: Vec<ReportGroup> = groups
        .into_iter()
        .filter_map(|(key, mut expenses)| {
            let first_date = expenses.iter().map(|e| e.date).min()?;
            sort_expenses(&mut expenses, request.sort_by);
            Some(ReportGroup {
                key,
                total_amount: expenses.iter().map(|e| e.amount).sum(),
                transaction_count: expenses.len(),
                first_date,
                expenses,
            })
        })
        .collect();
    match request.sort_by {
        SortBy::Date => groups.sort_by(|a, b| a.first_date.cmp(&b.first_date)),
        SortBy::Amount => groups.sort_by(|a, b| b.total_amount.total_cmp(&a.total_amount)),
        SortBy::Category => groups.sort_by(|a, b| a.key.cmp(&b.key)),
    }

    Ok(Report {
        total_amount: groups.iter().map(|g| g.total_amount).sum(),
        transaction_count: groups.iter().map(|g| g.transaction_count).sum(),
        groups,
    })
}
