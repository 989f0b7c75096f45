use std::collections::BTreeSet;
use std::sync::Arc;

use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::dates::format_ts;
use crate::domains::event::EventRecord;
use crate::error::Result;
use crate::interfaces::directory::{UsernameResolver, UNKNOWN_USER};
use crate::ledger::EventLedger;

const COLUMNS: [&str; 14] = [
    "id",
    "kind",
    "actor_id",
    "actor_name",
    "message_id",
    "message_state",
    "channel_id",
    "created_at",
    "customer_name",
    "set_at",
    "has_bill",
    "system_size",
    "setter_id",
    "setter_name",
];

/// Distinguishes "nothing to export" from "export failed": an empty
/// ledger is an expected outcome, not an error.
#[derive(Debug, Clone)]
pub enum ExportOutcome {
    Empty,
    Ready(CsvExport),
}

#[derive(Debug, Clone)]
pub struct CsvExport {
    pub filename: String,
    pub csv: String,
    pub rows: usize,
}

/// Point-in-time dump of the whole ledger, id ascending, enriched with
/// resolved display names.
#[derive(Clone)]
pub struct ExportGenerator {
    ledger: Arc<EventLedger>,
    directory: Arc<dyn UsernameResolver>,
    offset: UtcOffset,
}

impl ExportGenerator {
    pub fn new(
        ledger: Arc<EventLedger>,
        directory: Arc<dyn UsernameResolver>,
        offset: UtcOffset,
    ) -> Self {
        Self {
            ledger,
            directory,
            offset,
        }
    }

    pub async fn generate(&self) -> Result<ExportOutcome> {
        let rows = self.ledger.list_all().await?;
        if rows.is_empty() {
            return Ok(ExportOutcome::Empty);
        }

        // Each distinct id is resolved exactly once, no matter how many
        // rows reference it as actor or setter.
        let mut distinct: BTreeSet<String> = BTreeSet::new();
        for row in &rows {
            distinct.insert(row.actor_id.clone());
            if let Some(setter) = &row.setter_id {
                distinct.insert(setter.clone());
            }
        }
        let ids: Vec<String> = distinct.into_iter().collect();
        let names = self.directory.resolve(&ids).await;
        let display = |id: &str| -> String {
            names
                .get(id)
                .map(String::as_str)
                .unwrap_or(UNKNOWN_USER)
                .to_string()
        };

        let mut lines = Vec::with_capacity(rows.len() + 1);
        lines.push(COLUMNS.map(escape_csv).join(","));
        for row in &rows {
            lines.push(self.csv_line(row, &display));
        }

        Ok(ExportOutcome::Ready(CsvExport {
            filename: export_filename(self.offset),
            csv: lines.join("\n"),
            rows: rows.len(),
        }))
    }

    fn csv_line(&self, row: &EventRecord, display: &dyn Fn(&str) -> String) -> String {
        let fields = [
            row.id.to_string(),
            row.kind.as_str().to_string(),
            row.actor_id.clone(),
            display(&row.actor_id),
            row.message_id.clone().unwrap_or_default(),
            row.message_state.as_str().to_string(),
            row.channel_id.clone(),
            format_ts(row.created_at, self.offset),
            row.customer_name.clone(),
            row.set_at.map(|ts| format_ts(ts, self.offset)).unwrap_or_default(),
            row.has_bill
                .map(|b| if b { "1" } else { "0" }.to_string())
                .unwrap_or_default(),
            row.system_size.map(|s| s.to_string()).unwrap_or_default(),
            row.setter_id.clone().unwrap_or_default(),
            row.setter_id.as_deref().map(display).unwrap_or_default(),
        ];
        fields
            .iter()
            .map(|f| escape_csv(f))
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn export_filename(offset: UtcOffset) -> String {
    let format = format_description!("[year][month][day]_[hour][minute][second]");
    let stamp = OffsetDateTime::now_utc()
        .to_offset(offset)
        .format(format)
        .unwrap_or_else(|_| "now".to_string());
    format!("suntally_export_{stamp}.csv")
}

/// Quotes a field when it contains a comma, quote, or newline; embedded
/// quotes are doubled.
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
