use crate::domain::application::LoanApplication;
use crate::domain::disbursement::Disbursement;
use crate::error::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::io::Write;

/// One output row per application. Optional columns stay empty until the
/// lifecycle reaches them.
#[derive(Debug, Serialize)]
struct ReportRow {
    application: u64,
    status: String,
    requested_amount: i64,
    approved_amount: Option<i64>,
    processing_fee: Option<i64>,
    disbursement_reference: Option<String>,
    estimated_delivery: Option<NaiveDate>,
}

/// Writes the final lifecycle report as CSV.
///
/// Wraps `csv::Writer`; the header row is derived from the field names of
/// [`ReportRow`].
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    /// Creates a new `ReportWriter` targeting any `Write` sink (e.g., Stdout).
    pub fn new(destination: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(destination),
        }
    }

    /// Serializes one row per application, sorted by application id so the
    /// output is stable across runs.
    pub fn write_report(
        &mut self,
        mut rows: Vec<(LoanApplication, Option<Disbursement>)>,
    ) -> Result<()> {
        rows.sort_by_key(|(application, _)| application.id);
        for (application, disbursement) in rows {
            self.writer.serialize(ReportRow {
                application: application.id.0,
                status: application.status.to_string(),
                requested_amount: application.requested_amount.minor_units(),
                approved_amount: application.approved_amount.map(|a| a.minor_units()),
                processing_fee: application.processing_fee_amount.map(|a| a.minor_units()),
                disbursement_reference: disbursement
                    .as_ref()
                    .map(|d| d.reference_number.clone()),
                estimated_delivery: disbursement.as_ref().map(|d| d.estimated_delivery_date),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
