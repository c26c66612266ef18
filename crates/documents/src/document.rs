use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{Aggregate, AggregateId, AggregateRoot, DomainError, LocationId, UserId};
use stockledger_events::Event;

use crate::line::{AppliedLine, DocumentLine, total_amount};
use crate::status::{DocumentKind, DocumentStatus, LifecycleAction, transition};

/// Document identifier (receipt or sale).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub AggregateId);

impl DocumentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(AggregateId::new())
    }
}

impl core::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Supplier (receipts) or customer (sales).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CounterpartyId(pub AggregateId);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    Cash,
    Card,
    Transfer,
    Check,
    Credit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentHeader {
    pub location_id: LocationId,
    pub counterparty_id: Option<CounterpartyId>,
    pub document_date: NaiveDate,
    /// ISO currency code.
    pub currency: String,
    /// External reference, e.g. the supplier's invoice number.
    pub reference: Option<String>,
    pub payment_type: Option<PaymentType>,
    pub comment: Option<String>,
}

impl DocumentHeader {
    pub fn new(location_id: LocationId, document_date: NaiveDate, currency: impl Into<String>) -> Self {
        Self {
            location_id,
            counterparty_id: None,
            document_date,
            currency: currency.into(),
            reference: None,
            payment_type: None,
            comment: None,
        }
    }

    fn validate(&self) -> Result<(), DomainError> {
        if self.currency.trim().is_empty() {
            return Err(DomainError::validation("currency cannot be empty"));
        }
        Ok(())
    }
}

/// Draft edits. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPatch {
    pub location_id: Option<LocationId>,
    pub counterparty_id: Option<CounterpartyId>,
    pub document_date: Option<NaiveDate>,
    pub currency: Option<String>,
    pub reference: Option<String>,
    pub payment_type: Option<PaymentType>,
    pub comment: Option<String>,
    /// Replacement lines, already validated.
    pub lines: Option<Vec<DocumentLine>>,
}

impl DocumentPatch {
    fn apply_to(&self, header: &DocumentHeader) -> DocumentHeader {
        let mut next = header.clone();
        if let Some(location_id) = self.location_id {
            next.location_id = location_id;
        }
        if let Some(counterparty_id) = self.counterparty_id {
            next.counterparty_id = Some(counterparty_id);
        }
        if let Some(date) = self.document_date {
            next.document_date = date;
        }
        if let Some(currency) = &self.currency {
            next.currency = currency.clone();
        }
        if let Some(reference) = &self.reference {
            next.reference = Some(reference.clone());
        }
        if let Some(payment_type) = self.payment_type {
            next.payment_type = Some(payment_type);
        }
        if let Some(comment) = &self.comment {
            next.comment = Some(comment.clone());
        }
        next
    }
}

/// Who did something, and when.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    pub by: UserId,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTrail {
    pub created: Option<Stamp>,
    pub updated: Option<Stamp>,
    pub confirmed: Option<Stamp>,
    pub cancelled: Option<Stamp>,
    pub cancel_reason: Option<String>,
    pub shipped: Option<Stamp>,
    pub delivered: Option<Stamp>,
    /// Set by a soft delete. The document is kept but hidden.
    pub deleted: Option<Stamp>,
}

/// Aggregate root: Document.
///
/// Lines, header and totals only change while the document is a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    id: DocumentId,
    kind: DocumentKind,
    number: Option<String>,
    status: DocumentStatus,
    header: Option<DocumentHeader>,
    lines: Vec<DocumentLine>,
    total_amount: u64,
    audit: AuditTrail,
    version: u64,
    created: bool,
}

impl Document {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: DocumentId) -> Self {
        Self {
            id,
            kind: DocumentKind::PurchaseReceipt,
            number: None,
            status: DocumentStatus::Draft,
            header: None,
            lines: Vec::new(),
            total_amount: 0,
            audit: AuditTrail::default(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> DocumentId {
        self.id
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn number(&self) -> Option<&str> {
        self.number.as_deref()
    }

    pub fn status(&self) -> DocumentStatus {
        self.status
    }

    pub fn header(&self) -> Option<&DocumentHeader> {
        self.header.as_ref()
    }

    pub fn lines(&self) -> &[DocumentLine] {
        &self.lines
    }

    pub fn total_amount(&self) -> u64 {
        self.total_amount
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn is_deleted(&self) -> bool {
        self.audit.deleted.is_some()
    }

    pub fn is_editable(&self) -> bool {
        self.created && !self.is_deleted() && self.status == DocumentStatus::Draft
    }
}

impl AggregateRoot for Document {
    type Id = DocumentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateDocument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDocument {
    pub document_id: DocumentId,
    pub kind: DocumentKind,
    pub number: Option<String>,
    pub header: DocumentHeader,
    pub lines: Vec<DocumentLine>,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateDocument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDocument {
    pub document_id: DocumentId,
    pub patch: DocumentPatch,
    pub updated_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmDocument.
///
/// `applied` holds, per line in order, what the ledger used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmDocument {
    pub document_id: DocumentId,
    pub applied: Vec<AppliedLine>,
    pub confirmed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelDocument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelDocument {
    pub document_id: DocumentId,
    pub reason: Option<String>,
    pub cancelled_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteDocument. Drafts only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteDocument {
    pub document_id: DocumentId,
    pub deleted_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ShipDocument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipDocument {
    pub document_id: DocumentId,
    pub shipped_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeliverDocument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverDocument {
    pub document_id: DocumentId,
    pub delivered_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentCommand {
    Create(CreateDocument),
    Update(UpdateDocument),
    Confirm(ConfirmDocument),
    Cancel(CancelDocument),
    Ship(ShipDocument),
    Deliver(DeliverDocument),
    Delete(DeleteDocument),
}

/// Event: DocumentCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCreated {
    pub document_id: DocumentId,
    pub kind: DocumentKind,
    pub number: Option<String>,
    pub header: DocumentHeader,
    pub lines: Vec<DocumentLine>,
    pub total_amount: u64,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DocumentUpdated. Carries the full post-edit header and lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUpdated {
    pub document_id: DocumentId,
    pub header: DocumentHeader,
    pub lines: Vec<DocumentLine>,
    pub total_amount: u64,
    pub updated_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DocumentConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentConfirmed {
    pub document_id: DocumentId,
    pub applied: Vec<AppliedLine>,
    pub confirmed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DocumentCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCancelled {
    pub document_id: DocumentId,
    pub reason: Option<String>,
    pub cancelled_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DocumentShipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentShipped {
    pub document_id: DocumentId,
    pub shipped_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DocumentDelivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDelivered {
    pub document_id: DocumentId,
    pub delivered_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DocumentDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDeleted {
    pub document_id: DocumentId,
    pub deleted_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentEvent {
    DocumentCreated(DocumentCreated),
    DocumentUpdated(DocumentUpdated),
    DocumentConfirmed(DocumentConfirmed),
    DocumentCancelled(DocumentCancelled),
    DocumentShipped(DocumentShipped),
    DocumentDelivered(DocumentDelivered),
    DocumentDeleted(DocumentDeleted),
}

impl Event for DocumentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DocumentEvent::DocumentCreated(_) => "documents.document.created",
            DocumentEvent::DocumentUpdated(_) => "documents.document.updated",
            DocumentEvent::DocumentConfirmed(_) => "documents.document.confirmed",
            DocumentEvent::DocumentCancelled(_) => "documents.document.cancelled",
            DocumentEvent::DocumentShipped(_) => "documents.document.shipped",
            DocumentEvent::DocumentDelivered(_) => "documents.document.delivered",
            DocumentEvent::DocumentDeleted(_) => "documents.document.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DocumentEvent::DocumentCreated(e) => e.occurred_at,
            DocumentEvent::DocumentUpdated(e) => e.occurred_at,
            DocumentEvent::DocumentConfirmed(e) => e.occurred_at,
            DocumentEvent::DocumentCancelled(e) => e.occurred_at,
            DocumentEvent::DocumentShipped(e) => e.occurred_at,
            DocumentEvent::DocumentDelivered(e) => e.occurred_at,
            DocumentEvent::DocumentDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Document {
    type Command = DocumentCommand;
    type Event = DocumentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            DocumentEvent::DocumentCreated(e) => {
                self.id = e.document_id;
                self.kind = e.kind;
                self.number = e.number.clone();
                self.status = DocumentStatus::Draft;
                self.header = Some(e.header.clone());
                self.lines = e.lines.clone();
                self.total_amount = e.total_amount;
                self.audit.created = Some(Stamp {
                    by: e.created_by,
                    at: e.occurred_at,
                });
                self.created = true;
            }
            DocumentEvent::DocumentUpdated(e) => {
                self.header = Some(e.header.clone());
                self.lines = e.lines.clone();
                self.total_amount = e.total_amount;
                self.audit.updated = Some(Stamp {
                    by: e.updated_by,
                    at: e.occurred_at,
                });
            }
            DocumentEvent::DocumentConfirmed(e) => {
                for (line, applied) in self.lines.iter_mut().zip(&e.applied) {
                    line.record_applied(applied);
                }
                self.status = DocumentStatus::Confirmed;
                self.audit.confirmed = Some(Stamp {
                    by: e.confirmed_by,
                    at: e.occurred_at,
                });
            }
            DocumentEvent::DocumentCancelled(e) => {
                self.status = DocumentStatus::Cancelled;
                self.audit.cancelled = Some(Stamp {
                    by: e.cancelled_by,
                    at: e.occurred_at,
                });
                self.audit.cancel_reason = e.reason.clone();
            }
            DocumentEvent::DocumentShipped(e) => {
                self.status = DocumentStatus::Shipped;
                self.audit.shipped = Some(Stamp {
                    by: e.shipped_by,
                    at: e.occurred_at,
                });
            }
            DocumentEvent::DocumentDelivered(e) => {
                self.status = DocumentStatus::Delivered;
                self.audit.delivered = Some(Stamp {
                    by: e.delivered_by,
                    at: e.occurred_at,
                });
            }
            DocumentEvent::DocumentDeleted(e) => {
                self.audit.deleted = Some(Stamp {
                    by: e.deleted_by,
                    at: e.occurred_at,
                });
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            DocumentCommand::Create(cmd) => self.handle_create(cmd),
            DocumentCommand::Update(cmd) => self.handle_update(cmd),
            DocumentCommand::Confirm(cmd) => self.handle_confirm(cmd),
            DocumentCommand::Cancel(cmd) => self.handle_cancel(cmd),
            DocumentCommand::Ship(cmd) => self.handle_ship(cmd),
            DocumentCommand::Deliver(cmd) => self.handle_deliver(cmd),
            DocumentCommand::Delete(cmd) => self.handle_delete(cmd),
        }
    }
}

impl Document {
    /// Soft-deleted documents count as missing.
    fn ensure_exists(&self, document_id: DocumentId) -> Result<(), DomainError> {
        if !self.created || self.is_deleted() {
            return Err(DomainError::DocumentNotFound(document_id.to_string()));
        }
        if self.id != document_id {
            return Err(DomainError::invariant("document_id mismatch"));
        }
        Ok(())
    }

    fn ensure_lines(lines: &[DocumentLine]) -> Result<u64, DomainError> {
        if lines.is_empty() {
            return Err(DomainError::validation("document needs at least one line"));
        }
        total_amount(lines)
    }

    /// Lines renumbered 1..=n in submitted order.
    fn numbered(lines: &[DocumentLine]) -> Vec<DocumentLine> {
        lines
            .iter()
            .zip(1u32..)
            .map(|(line, line_no)| DocumentLine {
                line_no,
                applied_tracking: None,
                applied_tracking_type: None,
                ..line.clone()
            })
            .collect()
    }

    fn handle_create(&self, cmd: &CreateDocument) -> Result<Vec<DocumentEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("document already exists"));
        }
        cmd.header.validate()?;
        let total_amount = Self::ensure_lines(&cmd.lines)?;

        Ok(vec![DocumentEvent::DocumentCreated(DocumentCreated {
            document_id: cmd.document_id,
            kind: cmd.kind,
            number: cmd.number.clone(),
            header: cmd.header.clone(),
            lines: Self::numbered(&cmd.lines),
            total_amount,
            created_by: cmd.created_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateDocument) -> Result<Vec<DocumentEvent>, DomainError> {
        self.ensure_exists(cmd.document_id)?;
        if self.status != DocumentStatus::Draft {
            return Err(DomainError::DocumentNotEditable(self.status.to_string()));
        }
        let current = self
            .header
            .as_ref()
            .ok_or_else(|| DomainError::invariant("created document without header"))?;

        let header = cmd.patch.apply_to(current);
        header.validate()?;

        let lines = match &cmd.patch.lines {
            Some(lines) => Self::numbered(lines),
            None => self.lines.clone(),
        };
        let total_amount = Self::ensure_lines(&lines)?;

        Ok(vec![DocumentEvent::DocumentUpdated(DocumentUpdated {
            document_id: cmd.document_id,
            header,
            lines,
            total_amount,
            updated_by: cmd.updated_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(&self, cmd: &ConfirmDocument) -> Result<Vec<DocumentEvent>, DomainError> {
        self.ensure_exists(cmd.document_id)?;
        transition(self.kind, LifecycleAction::Confirm, self.status)?;

        if cmd.applied.len() != self.lines.len() {
            return Err(DomainError::invariant(format!(
                "applied payloads ({}) must match lines ({})",
                cmd.applied.len(),
                self.lines.len()
            )));
        }

        Ok(vec![DocumentEvent::DocumentConfirmed(DocumentConfirmed {
            document_id: cmd.document_id,
            applied: cmd.applied.clone(),
            confirmed_by: cmd.confirmed_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelDocument) -> Result<Vec<DocumentEvent>, DomainError> {
        self.ensure_exists(cmd.document_id)?;
        transition(self.kind, LifecycleAction::Cancel, self.status)?;

        Ok(vec![DocumentEvent::DocumentCancelled(DocumentCancelled {
            document_id: cmd.document_id,
            reason: cmd.reason.clone(),
            cancelled_by: cmd.cancelled_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_ship(&self, cmd: &ShipDocument) -> Result<Vec<DocumentEvent>, DomainError> {
        self.ensure_exists(cmd.document_id)?;
        transition(self.kind, LifecycleAction::Ship, self.status)?;

        Ok(vec![DocumentEvent::DocumentShipped(DocumentShipped {
            document_id: cmd.document_id,
            shipped_by: cmd.shipped_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deliver(&self, cmd: &DeliverDocument) -> Result<Vec<DocumentEvent>, DomainError> {
        self.ensure_exists(cmd.document_id)?;
        transition(self.kind, LifecycleAction::Deliver, self.status)?;

        Ok(vec![DocumentEvent::DocumentDelivered(DocumentDelivered {
            document_id: cmd.document_id,
            delivered_by: cmd.delivered_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteDocument) -> Result<Vec<DocumentEvent>, DomainError> {
        self.ensure_exists(cmd.document_id)?;
        if self.status != DocumentStatus::Draft {
            return Err(DomainError::DocumentNotEditable(self.status.to_string()));
        }

        Ok(vec![DocumentEvent::DocumentDeleted(DocumentDeleted {
            document_id: cmd.document_id,
            deleted_by: cmd.deleted_by,
            occurred_at: cmd.occurred_at,
        })])
    }
}
