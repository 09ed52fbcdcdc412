// libs/consultation-cell/src/services/projector.rs
//
// Read-only views derived from the consultation collection. Every function here
// recomputes from scratch; nothing is cached between sync ticks.

use std::cmp::Ordering;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};

use crate::models::{
    ConsultationRecord, ConsultationStatus, HistoryView, Page, SortDirection, SortField,
    StatusSummary, TableQuery,
};

/// The instant views are computed against, plus the display offset used to
/// decide where a local day or week begins.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionClock {
    pub now: DateTime<Utc>,
    pub offset: FixedOffset,
}

impl ProjectionClock {
    pub fn utc(now: DateTime<Utc>) -> Self {
        Self { now, offset: Utc.fix() }
    }

    pub fn with_offset_minutes(now: DateTime<Utc>, offset_minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(offset_minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix());
        Self { now, offset }
    }

    fn local_today(&self) -> NaiveDate {
        self.now.with_timezone(&self.offset).date_naive()
    }

    fn local_midnight_utc(&self, date: NaiveDate) -> DateTime<Utc> {
        let local = date.and_time(NaiveTime::default());
        (local - Duration::seconds(self.offset.local_minus_utc() as i64)).and_utc()
    }

    /// `[start, end)` of the local day containing `now`.
    pub fn day_bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.local_midnight_utc(self.local_today());
        (start, start + Duration::days(1))
    }

    /// `[Sunday 00:00, next Sunday 00:00)` of the local week containing `now`.
    pub fn week_bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let today = self.local_today();
        let sunday = today - Duration::days(today.weekday().num_days_from_sunday() as i64);
        let start = self.local_midnight_utc(sunday);
        (start, start + Duration::days(7))
    }
}

fn by_id(a: &ConsultationRecord, b: &ConsultationRecord) -> Ordering {
    a.id.cmp(&b.id)
}

/// Pending requests, oldest first.
pub fn pending_queue(records: &[ConsultationRecord]) -> Vec<ConsultationRecord> {
    let mut queue: Vec<ConsultationRecord> = records
        .iter()
        .filter(|record| record.status == ConsultationStatus::Pending)
        .cloned()
        .collect();

    queue.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| by_id(a, b)));
    queue
}

fn schedule_within(
    records: &[ConsultationRecord],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<ConsultationRecord> {
    let mut schedule: Vec<ConsultationRecord> = records
        .iter()
        .filter(|record| {
            matches!(record.status, ConsultationStatus::Scheduled | ConsultationStatus::InProgress)
                && record.has_doctor()
                && record.scheduled_at >= start
                && record.scheduled_at < end
        })
        .cloned()
        .collect();

    schedule.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at).then_with(|| by_id(a, b)));
    schedule
}

pub fn week_schedule(records: &[ConsultationRecord], clock: &ProjectionClock) -> Vec<ConsultationRecord> {
    let (start, end) = clock.week_bounds();
    schedule_within(records, start, end)
}

pub fn todays_schedule(records: &[ConsultationRecord], clock: &ProjectionClock) -> Vec<ConsultationRecord> {
    let (start, end) = clock.day_bounds();
    schedule_within(records, start, end)
}

/// Completed consultations, most recent first, split at `recent_days` before now.
pub fn history(records: &[ConsultationRecord], clock: &ProjectionClock, recent_days: i64) -> HistoryView {
    let cutoff = clock.now - Duration::days(recent_days.max(0));

    let mut completed: Vec<ConsultationRecord> = records
        .iter()
        .filter(|record| record.status == ConsultationStatus::Completed)
        .cloned()
        .collect();
    completed.sort_by(|a, b| b.scheduled_at.cmp(&a.scheduled_at).then_with(|| by_id(a, b)));

    let (recent, older): (Vec<_>, Vec<_>) = completed
        .into_iter()
        .partition(|record| record.scheduled_at >= cutoff);

    HistoryView { recent, older }
}

fn matches_text(record: &ConsultationRecord, needle: &str) -> bool {
    let fields = [
        Some(record.chief_complaint.as_str()),
        Some(record.consultation_type.as_str()),
        Some(record.consultation_type.label()),
        record.doctor_name.as_deref(),
    ];

    fields
        .iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(needle) || field.replace('_', " ").to_lowercase().contains(needle))
}

fn lowercase(value: Option<&str>) -> Option<String> {
    value.map(str::to_lowercase)
}

fn compare_field(a: &ConsultationRecord, b: &ConsultationRecord, field: SortField) -> Ordering {
    match field {
        SortField::ScheduledAt => a.scheduled_at.cmp(&b.scheduled_at),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortField::Priority => a.priority.cmp(&b.priority),
        SortField::Status => a.status.as_str().cmp(b.status.as_str()),
        SortField::ConsultationType => a.consultation_type.as_str().cmp(b.consultation_type.as_str()),
        SortField::ChiefComplaint => a.chief_complaint.to_lowercase().cmp(&b.chief_complaint.to_lowercase()),
        SortField::DoctorName => lowercase(a.doctor_name.as_deref()).cmp(&lowercase(b.doctor_name.as_deref())),
    }
}

/// Filter, sort and page the consultation table.
///
/// Sorting is total: ties on the chosen field fall back to the record id, so the
/// same input always yields the same order. Pages are 1-indexed and clamped.
pub fn search_filter_sort_paginate(records: &[ConsultationRecord], query: &TableQuery) -> Page<ConsultationRecord> {
    let needle = query
        .text
        .as_deref()
        .map(|text| text.trim().to_lowercase())
        .filter(|text| !text.is_empty());

    let mut rows: Vec<ConsultationRecord> = records
        .iter()
        .filter(|record| needle.as_deref().map_or(true, |needle| matches_text(record, needle)))
        .filter(|record| query.status.map_or(true, |status| record.status == status))
        .filter(|record| query.priority.map_or(true, |priority| record.priority == priority))
        .filter(|record| query.from.map_or(true, |from| record.scheduled_at >= from))
        .filter(|record| query.to.map_or(true, |to| record.scheduled_at <= to))
        .cloned()
        .collect();

    rows.sort_by(|a, b| {
        let primary = compare_field(a, b, query.sort_field);
        let primary = match query.sort_direction {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        };
        primary.then_with(|| by_id(a, b))
    });

    let page_size = query.page_size.max(1);
    let total_items = rows.len();
    let total_pages = total_items.div_ceil(page_size).max(1);
    let page = query.page.clamp(1, total_pages);

    let items = rows
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();

    Page {
        items,
        page,
        page_size,
        total_items,
        total_pages,
    }
}

pub fn status_summary(records: &[ConsultationRecord]) -> StatusSummary {
    let count = |status: ConsultationStatus| records.iter().filter(|r| r.status == status).count();

    let total = records.len();
    let completed = count(ConsultationStatus::Completed);
    let cancelled = count(ConsultationStatus::Cancelled);
    let rate = |n: usize| if total == 0 { 0.0 } else { n as f64 / total as f64 };

    StatusSummary {
        total,
        pending: count(ConsultationStatus::Pending),
        scheduled: count(ConsultationStatus::Scheduled),
        in_progress: count(ConsultationStatus::InProgress),
        completed,
        cancelled,
        completion_rate: rate(completed),
        cancellation_rate: rate(cancelled),
    }
}
