use std::collections::HashMap;
use std::sync::Arc;

use time::UtcOffset;
use tracing::info;

use crate::dates::{local_today, midnight_ts, parse_business_date};
use crate::domains::actor::ActorRef;
use crate::domains::event::{EventDraft, EventRecord};
use crate::error::{LedgerError, Result};
use crate::export::{ExportGenerator, ExportOutcome};
use crate::interfaces::directory::{UsernameResolver, UNKNOWN_USER};
use crate::interfaces::permissions::{Capability, PermissionGate};
use crate::ledger::EventLedger;
use crate::stats::StatsAggregator;

/// Attachment metadata as the gateway reports it; only the content type
/// matters to the core.
#[derive(Debug, Clone)]
pub struct AttachmentMeta {
    pub filename: String,
    pub content_type: Option<String>,
    pub url: String,
}

impl AttachmentMeta {
    fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("image/"))
    }
}

#[derive(Debug, Clone)]
pub struct RecordSet {
    pub actor: ActorRef,
    pub channel_id: String,
    pub customer_name: String,
    /// Raw business-date string as typed; `None` means today.
    pub date: Option<String>,
    pub bill_attachment: Option<AttachmentMeta>,
}

#[derive(Debug, Clone)]
pub struct RecordClosed {
    pub actor: ActorRef,
    pub channel_id: String,
    pub customer_name: String,
    pub system_size: f64,
    pub setter_id: String,
}

#[derive(Debug, Clone)]
pub struct RecordInstall {
    pub actor: ActorRef,
    pub channel_id: String,
    pub customer_name: String,
    pub setter_id: String,
}

/// Soft conditions worth surfacing next to a successful recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordWarning {
    /// The date string was unparseable; today was used instead.
    InvalidDate { raw: String },
    /// The attachment is not an image, so it does not count as a bill.
    NonImageAttachment { filename: String },
}

#[derive(Debug, Clone)]
pub struct RecordOutcome {
    pub event_id: i64,
    pub event: EventRecord,
    pub warnings: Vec<RecordWarning>,
}

/// A gated command either completes or reports denial; denial is an
/// expected outcome, not an error.
#[derive(Debug, Clone)]
pub enum CommandOutcome<T> {
    Denied,
    Completed(T),
}

#[derive(Debug, Clone)]
pub struct LeaderboardEntry {
    pub actor_id: String,
    pub display_name: String,
    pub sets: i64,
}

#[derive(Debug, Clone)]
pub struct StatsReport {
    pub daily_sets: i64,
    pub weekly_closes: i64,
    pub monthly_closes: i64,
    pub monthly_installs: i64,
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// The command surface the gateway glue talks to. Returns structured
/// outcome values; rendering them is the collaborator's job.
pub struct CommandHandlers {
    ledger: Arc<EventLedger>,
    directory: Arc<dyn UsernameResolver>,
    gate: Arc<dyn PermissionGate>,
    stats: StatsAggregator,
    exporter: ExportGenerator,
    offset: UtcOffset,
}

impl CommandHandlers {
    pub fn new(
        ledger: Arc<EventLedger>,
        directory: Arc<dyn UsernameResolver>,
        gate: Arc<dyn PermissionGate>,
        offset: UtcOffset,
    ) -> Self {
        let stats = StatsAggregator::new(ledger.clone(), offset);
        let exporter = ExportGenerator::new(ledger.clone(), directory.clone(), offset);
        Self {
            ledger,
            directory,
            gate,
            stats,
            exporter,
            offset,
        }
    }

    pub async fn record_set(&self, req: RecordSet) -> Result<CommandOutcome<RecordOutcome>> {
        if !self.gate.allows(&req.actor, Capability::RecordActivity) {
            return Ok(CommandOutcome::Denied);
        }

        let mut warnings = Vec::new();
        let today = local_today(self.offset);
        let set_date = match req.date.as_deref() {
            None => today,
            Some(raw) => match parse_business_date(raw, today) {
                Some(date) => date,
                None => {
                    warnings.push(RecordWarning::InvalidDate {
                        raw: raw.to_string(),
                    });
                    today
                }
            },
        };
        let has_bill = match &req.bill_attachment {
            Some(attachment) if attachment.is_image() => true,
            Some(attachment) => {
                warnings.push(RecordWarning::NonImageAttachment {
                    filename: attachment.filename.clone(),
                });
                false
            }
            None => false,
        };

        let draft = EventDraft::Set {
            actor_id: req.actor.id.clone(),
            channel_id: req.channel_id,
            customer_name: req.customer_name,
            set_at: midnight_ts(set_date, self.offset),
            has_bill,
        };
        let outcome = self.append(draft, warnings).await?;
        info!(event_id = outcome.event_id, actor_id = %req.actor.id, "set recorded");
        Ok(CommandOutcome::Completed(outcome))
    }

    pub async fn record_closed(&self, req: RecordClosed) -> Result<CommandOutcome<RecordOutcome>> {
        if !self.gate.allows(&req.actor, Capability::CloseDeals) {
            return Ok(CommandOutcome::Denied);
        }
        let draft = EventDraft::Closed {
            actor_id: req.actor.id.clone(),
            channel_id: req.channel_id,
            customer_name: req.customer_name,
            system_size: req.system_size,
            setter_id: req.setter_id,
        };
        let outcome = self.append(draft, Vec::new()).await?;
        info!(event_id = outcome.event_id, actor_id = %req.actor.id, "close recorded");
        Ok(CommandOutcome::Completed(outcome))
    }

    pub async fn record_install(
        &self,
        req: RecordInstall,
    ) -> Result<CommandOutcome<RecordOutcome>> {
        if !self.gate.allows(&req.actor, Capability::CloseDeals) {
            return Ok(CommandOutcome::Denied);
        }
        let draft = EventDraft::InstallScheduled {
            actor_id: req.actor.id.clone(),
            channel_id: req.channel_id,
            customer_name: req.customer_name,
            setter_id: req.setter_id,
        };
        let outcome = self.append(draft, Vec::new()).await?;
        info!(event_id = outcome.event_id, actor_id = %req.actor.id, "install recorded");
        Ok(CommandOutcome::Completed(outcome))
    }

    pub async fn stats(&self, actor: &ActorRef) -> Result<CommandOutcome<StatsReport>> {
        if !self.gate.allows(actor, Capability::ViewStats) {
            return Ok(CommandOutcome::Denied);
        }
        let snapshot = self.stats.snapshot().await?;

        let ids: Vec<String> = snapshot
            .leaderboard
            .iter()
            .map(|(actor_id, _)| actor_id.clone())
            .collect();
        let names: HashMap<String, String> = self.directory.resolve(&ids).await;
        let leaderboard = snapshot
            .leaderboard
            .into_iter()
            .map(|(actor_id, sets)| LeaderboardEntry {
                display_name: names
                    .get(&actor_id)
                    .map(String::as_str)
                    .unwrap_or(UNKNOWN_USER)
                    .to_string(),
                actor_id,
                sets,
            })
            .collect();

        Ok(CommandOutcome::Completed(StatsReport {
            daily_sets: snapshot.daily_sets,
            weekly_closes: snapshot.weekly_closes,
            monthly_closes: snapshot.monthly_closes,
            monthly_installs: snapshot.monthly_installs,
            leaderboard,
        }))
    }

    pub async fn export(&self, actor: &ActorRef) -> Result<CommandOutcome<ExportOutcome>> {
        if !self.gate.allows(actor, Capability::ManageLedger) {
            return Ok(CommandOutcome::Denied);
        }
        Ok(CommandOutcome::Completed(self.exporter.generate().await?))
    }

    /// Second write phase, called after the announcement message posted.
    pub async fn finalize_announcement(&self, event_id: i64, message_id: &str) -> Result<()> {
        self.ledger.attach_message(event_id, message_id).await
    }

    /// Called when the announcement post failed; the row stays valid.
    pub async fn announcement_failed(&self, event_id: i64) -> Result<()> {
        self.ledger.mark_orphaned(event_id).await
    }

    async fn append(&self, draft: EventDraft, warnings: Vec<RecordWarning>) -> Result<RecordOutcome> {
        let event_id = self.ledger.append(&draft).await?;
        let event = self
            .ledger
            .get_by_id(event_id)
            .await?
            .ok_or(LedgerError::NotFound(event_id))?;
        Ok(RecordOutcome {
            event_id,
            event,
            warnings,
        })
    }
}
