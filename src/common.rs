/// Common types and utilities shared across handlers and services
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{errors::ServiceError, models::Listable};

/// Query parameters accepted by every list endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub search: Option<String>,
    /// Inclusive lower bound on `created_at`: `YYYY-MM-DD` or RFC 3339
    pub from: Option<String>,
    /// Inclusive upper bound on `created_at`: `YYYY-MM-DD` (whole day) or RFC 3339
    pub to: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Parsed `from`/`to` bounds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| at >= s) && self.end.map_or(true, |e| at <= e)
    }
}

fn parse_bound(field: &str, raw: &str, end_of_day: bool) -> Result<DateTime<Utc>, ServiceError> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        ServiceError::ValidationError(format!(
            "Invalid {} date '{}': expected YYYY-MM-DD or RFC 3339",
            field, raw
        ))
    })?;
    let time: Option<NaiveDateTime> = if end_of_day {
        date.and_hms_milli_opt(23, 59, 59, 999)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.map(|t| t.and_utc())
        .ok_or_else(|| ServiceError::ValidationError(format!("Invalid {} date", field)))
}

impl ListParams {
    pub fn date_range(&self) -> Result<DateRange, ServiceError> {
        let non_empty = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let range = DateRange {
            start: non_empty(&self.from)
                .map(|raw| parse_bound("from", &raw, false))
                .transpose()?,
            end: non_empty(&self.to)
                .map(|raw| parse_bound("to", &raw, true))
                .transpose()?,
        };
        if let (Some(start), Some(end)) = (range.start, range.end) {
            if start > end {
                return Err(ServiceError::ValidationError(
                    "'from' must not be after 'to'".to_string(),
                ));
            }
        }
        Ok(range)
    }

    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Filters, then slices one page out of `records`.
    ///
    /// `limit` is resolved by the caller (config default and cap).
    pub fn apply<T: Listable>(&self, records: Vec<T>, limit: u64) -> Result<Page<T>, ServiceError> {
        let range = self.date_range()?;
        let status = self
            .status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("all"));
        let needle = self
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let matching: Vec<T> = records
            .into_iter()
            .filter(|r| {
                status.map_or(true, |wanted| {
                    r.status_code()
                        .map_or(false, |code| code.eq_ignore_ascii_case(wanted))
                })
            })
            .filter(|r| {
                needle.as_deref().map_or(true, |n| {
                    r.search_text().iter().any(|t| t.to_lowercase().contains(n))
                })
            })
            .filter(|r| range.contains(r.created_at()))
            .collect();

        Ok(Page::slice(matching, self.page(), limit))
    }
}

/// One page of a filtered list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn slice(all: Vec<T>, page: u64, limit: u64) -> Self {
        let limit = limit.max(1);
        let total = all.len() as u64;
        let total_pages = if total == 0 {
            0
        } else {
            (total + limit - 1) / limit
        };
        let offset = page.saturating_sub(1).saturating_mul(limit);
        let items = all
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect();
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}
