//! Moderation reports.
//!
//! Any user files a report; admins list, review and act on them.

use socialnet_types::{Report, ReportId, ReportStatus, ReportTarget, Result, Timestamp, UserId};

use crate::engine::{allocate, lock, MemoryStore};

/// Report storage.
pub trait ReportStore: Send + Sync {
    /// Stores a new `Pending` report.
    fn create_report(
        &self,
        reporter: UserId,
        target: ReportTarget,
        target_id: u64,
        reason: &str,
        now: Timestamp,
    ) -> Result<Report>;

    /// Returns the report, if it exists.
    fn get_report(&self, id: ReportId) -> Result<Option<Report>>;

    /// Reports in `status`, newest first, at most `limit`.
    fn reports_with_status(&self, status: ReportStatus, limit: usize) -> Result<Vec<Report>>;

    /// Sets the status. Returns `None` if the report does not exist.
    fn update_report_status(&self, id: ReportId, status: ReportStatus) -> Result<Option<Report>>;
}

impl ReportStore for MemoryStore {
    fn create_report(
        &self,
        reporter: UserId,
        target: ReportTarget,
        target_id: u64,
        reason: &str,
        now: Timestamp,
    ) -> Result<Report> {
        let mut table = lock(&self.reports, "reports")?;
        let id = ReportId::new(allocate(&mut table.next_id));
        let report = Report {
            id,
            reporter,
            target,
            target_id,
            reason: reason.to_owned(),
            status: ReportStatus::Pending,
            created_at: now,
        };
        table.rows.insert(id, report.clone());
        Ok(report)
    }

    fn get_report(&self, id: ReportId) -> Result<Option<Report>> {
        Ok(lock(&self.reports, "reports")?.rows.get(&id).cloned())
    }

    fn reports_with_status(&self, status: ReportStatus, limit: usize) -> Result<Vec<Report>> {
        let table = lock(&self.reports, "reports")?;
        let mut rows: Vec<Report> = table
            .rows
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        drop(table);

        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        rows.truncate(limit);
        Ok(rows)
    }

    fn update_report_status(&self, id: ReportId, status: ReportStatus) -> Result<Option<Report>> {
        let mut table = lock(&self.reports, "reports")?;
        Ok(table.rows.get_mut(&id).map(|report| {
            report.status = status;
            report.clone()
        }))
    }
}
