//! Document lifecycle controller.
//!
//! Drives purchase receipts and sales through one transition table and turns
//! confirm/cancel into ordered ledger calls:
//!
//! - confirm: strict validation of every line, then one ledger call per line
//!   (increase for receipts, decrease for sales), then the status write.
//! - cancel: the inverse call per line, replaying the payload recorded at
//!   confirmation, then the status write.
//!
//! Line processing is fail-stop: the first ledger rejection ends the call and
//! earlier lines stay applied. The document status is always written last.
//!
//! Transitions on one document are serialized by a per-document guard that
//! lives only while some call holds it.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value as JsonValue;

use stockledger_catalog::{ProductCatalog, ProductInfo, TrackingType};
use stockledger_core::{Aggregate, AggregateRoot, DomainError, ExpectedVersion, LocationId, UserId};
use stockledger_documents::{
    AppliedLine, CancelDocument, ConfirmDocument, CounterpartyId, CreateDocument, DeleteDocument,
    DeliverDocument, Document, DocumentCommand, DocumentEvent, DocumentFilter, DocumentHeader,
    DocumentId, DocumentKind, DocumentLine, DocumentNumbering, DocumentPatch, LifecycleAction,
    LineInput, PaymentType, SequenceGenerator, ShipDocument, UpdateDocument, ValidationMode,
    build_line, ensure_transactable, transition, validate_tracking,
};
use stockledger_events::{EventBus, EventEnvelope};
use stockledger_inventory::{
    DecreaseStock, IncreaseStock, MovementKind, StockCommand, StockDirection, StockKey,
    TrackingPayload,
};

use crate::config::LedgerConfig;
use crate::error::{ServiceError, ServiceResult, StoreError};
use crate::ledger::StockLedger;
use crate::store::{DocumentStore, InventoryStore};

pub const DOCUMENT_AGGREGATE_TYPE: &str = "documents.document";

/// Who is acting, and the time the action takes effect.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: UserId,
    pub at: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(user_id: UserId, at: DateTime<Utc>) -> Self {
        Self { user_id, at }
    }

    pub fn now(user_id: UserId) -> Self {
        Self::new(user_id, Utc::now())
    }
}

/// Input for [`DocumentLifecycle::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub kind: DocumentKind,
    pub location_id: LocationId,
    pub counterparty_id: Option<CounterpartyId>,
    pub document_date: NaiveDate,
    /// Falls back to the configured default currency.
    pub currency: Option<String>,
    pub reference: Option<String>,
    pub payment_type: Option<PaymentType>,
    pub comment: Option<String>,
    pub lines: Vec<LineInput>,
}

impl NewDocument {
    pub fn new(
        kind: DocumentKind,
        location_id: LocationId,
        document_date: NaiveDate,
        lines: Vec<LineInput>,
    ) -> Self {
        Self {
            kind,
            location_id,
            counterparty_id: None,
            document_date,
            currency: None,
            reference: None,
            payment_type: None,
            comment: None,
            lines,
        }
    }
}

/// Input for [`DocumentLifecycle::update`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentEdit {
    /// Header changes. Its `lines` field is ignored; use `lines` below.
    pub header: DocumentPatch,
    /// Replacement lines, validated like on create.
    pub lines: Option<Vec<LineInput>>,
}

pub struct DocumentLifecycle<S, D, B> {
    ledger: StockLedger<S, B>,
    documents: D,
    catalog: Arc<dyn ProductCatalog>,
    sequence: Arc<dyn SequenceGenerator>,
    bus: B,
    numbering: DocumentNumbering,
    default_currency: String,
    guards: Mutex<HashMap<DocumentId, Arc<Mutex<()>>>>,
}

impl<S, D, B> DocumentLifecycle<S, D, B> {
    pub fn new(
        ledger: StockLedger<S, B>,
        documents: D,
        catalog: Arc<dyn ProductCatalog>,
        sequence: Arc<dyn SequenceGenerator>,
        bus: B,
        config: &LedgerConfig,
    ) -> Self {
        Self {
            ledger,
            documents,
            catalog,
            sequence,
            bus,
            numbering: DocumentNumbering::new(
                config.sale_number_prefix.clone(),
                config.sequence_width,
            ),
            default_currency: config.default_currency.clone(),
            guards: Mutex::new(HashMap::new()),
        }
    }

    pub fn ledger(&self) -> &StockLedger<S, B> {
        &self.ledger
    }

    pub fn documents(&self) -> &D {
        &self.documents
    }

    /// Run `f` holding the document's mutex; transitions on one document
    /// never interleave.
    fn guarded<T>(&self, id: DocumentId, f: impl FnOnce() -> ServiceResult<T>) -> ServiceResult<T> {
        let guard = {
            let mut guards = self.guards.lock().map_err(|_| guard_table_poisoned())?;
            Arc::clone(guards.entry(id).or_default())
        };

        let result = match guard.lock() {
            Ok(_held) => f(),
            Err(_) => Err(StoreError::Unavailable("document guard poisoned".to_string()).into()),
        };

        self.release(id, guard);
        result
    }

    /// Drop the table entry once no other call holds or waits on it.
    fn release(&self, id: DocumentId, guard: Arc<Mutex<()>>) {
        let Ok(mut guards) = self.guards.lock() else {
            return;
        };
        // One reference in the table, one here.
        if Arc::strong_count(&guard) == 2 {
            guards.remove(&id);
        }
    }

    #[cfg(test)]
    pub(crate) fn live_guards(&self) -> usize {
        self.guards.lock().map(|guards| guards.len()).unwrap_or(0)
    }
}

fn guard_table_poisoned() -> ServiceError {
    StoreError::Unavailable("document guard table poisoned".to_string()).into()
}

impl<S, D, B> DocumentLifecycle<S, D, B>
where
    S: InventoryStore,
    D: DocumentStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Create a draft. Lines get lenient tracking validation.
    pub fn create(&self, ctx: &RequestContext, request: NewDocument) -> ServiceResult<Document> {
        let lines = self.build_lines(request.lines, ValidationMode::Lenient)?;

        let number = match request.kind {
            DocumentKind::Sale => Some(
                self.numbering
                    .next_number(self.sequence.as_ref(), ctx.at.date_naive()),
            ),
            DocumentKind::PurchaseReceipt => None,
        };

        let header = DocumentHeader {
            location_id: request.location_id,
            counterparty_id: request.counterparty_id,
            document_date: request.document_date,
            currency: request
                .currency
                .unwrap_or_else(|| self.default_currency.clone()),
            reference: request.reference,
            payment_type: request.payment_type,
            comment: request.comment,
        };

        let id = DocumentId::generate();
        let document = Document::empty(id);
        let command = DocumentCommand::Create(CreateDocument {
            document_id: id,
            kind: request.kind,
            number,
            header,
            lines,
            created_by: ctx.user_id,
            occurred_at: ctx.at,
        });

        let document = self.commit(document, &command)?;
        tracing::info!(
            document = %id,
            kind = %document.kind(),
            number = document.number().unwrap_or_default(),
            lines = document.lines().len(),
            total_amount = document.total_amount(),
            "document created"
        );
        Ok(document)
    }

    /// Edit a draft. Replaced lines get lenient tracking validation.
    pub fn update(
        &self,
        ctx: &RequestContext,
        id: DocumentId,
        edit: DocumentEdit,
    ) -> ServiceResult<Document> {
        self.guarded(id, || {
            let document = self.get(id)?;
            if !document.is_editable() {
                return Err(DomainError::DocumentNotEditable(document.status().to_string()).into());
            }

            let mut patch = edit.header;
            patch.lines = match edit.lines {
                Some(inputs) => Some(self.build_lines(inputs, ValidationMode::Lenient)?),
                None => None,
            };

            let command = DocumentCommand::Update(UpdateDocument {
                document_id: id,
                patch,
                updated_by: ctx.user_id,
                occurred_at: ctx.at,
            });
            let document = self.commit(document, &command)?;
            tracing::info!(document = %id, total_amount = document.total_amount(), "document updated");
            Ok(document)
        })
    }

    /// DRAFT -> CONFIRMED, moving stock for every line.
    pub fn confirm(&self, ctx: &RequestContext, id: DocumentId) -> ServiceResult<Document> {
        self.guarded(id, || {
            let document = self.get(id)?;
            transition(document.kind(), LifecycleAction::Confirm, document.status())?;
            let direction = ledger_direction(&document, LifecycleAction::Confirm)?;
            let location_id = location_of(&document)?;

            // Every line is checked before the first one touches the ledger.
            let products = document
                .lines()
                .iter()
                .map(|line| {
                    let product = self.catalog.get_product(line.product_id)?;
                    ensure_transactable(&product)?;
                    validate_tracking(
                        product.tracking_type,
                        line.quantity,
                        &line.tracking,
                        ValidationMode::Strict,
                    )?;
                    Ok(product)
                })
                .collect::<Result<Vec<ProductInfo>, DomainError>>()?;

            let mut applied = Vec::with_capacity(products.len());
            for (line, product) in document.lines().iter().zip(&products) {
                let command = stock_command(
                    direction,
                    MovementKind::Issue,
                    line,
                    product.tracking_type,
                    location_id,
                    line.tracking.clone(),
                    ctx.at,
                );
                match self.ledger.execute(command) {
                    Ok(movement) => {
                        applied.push(AppliedLine::new(product.tracking_type, movement.applied));
                    }
                    Err(err) => {
                        halted(&document, LifecycleAction::Confirm, line.line_no, applied.len(), &err);
                        return Err(err);
                    }
                }
            }

            let used: BTreeSet<_> = products.iter().map(|p| p.id).collect();
            for product_id in used {
                if let Err(err) = self.catalog.mark_used(product_id) {
                    let err = ServiceError::from(err);
                    tracing::warn!(
                        document = %id,
                        product = %product_id,
                        lines_applied = applied.len(),
                        code = err.code(),
                        "marking products used failed after stock moved; document stays draft"
                    );
                    return Err(err);
                }
            }

            let command = DocumentCommand::Confirm(ConfirmDocument {
                document_id: id,
                applied,
                confirmed_by: ctx.user_id,
                occurred_at: ctx.at,
            });
            let document = self.commit(document, &command)?;
            tracing::info!(document = %id, kind = %document.kind(), "document confirmed");
            Ok(document)
        })
    }

    /// CONFIRMED -> CANCELLED, reversing every line's stock movement.
    pub fn cancel(
        &self,
        ctx: &RequestContext,
        id: DocumentId,
        reason: Option<String>,
    ) -> ServiceResult<Document> {
        self.guarded(id, || {
            let document = self.get(id)?;
            transition(document.kind(), LifecycleAction::Cancel, document.status())?;
            let direction = ledger_direction(&document, LifecycleAction::Cancel)?;
            let location_id = location_of(&document)?;

            for (reversed, line) in document.lines().iter().enumerate() {
                let tracking_type = match line.applied_tracking_type {
                    Some(tracking_type) => tracking_type,
                    None => self.catalog.get_product(line.product_id)?.tracking_type,
                };
                let command = stock_command(
                    direction,
                    MovementKind::Reversal,
                    line,
                    tracking_type,
                    location_id,
                    line.reversal_tracking().clone(),
                    ctx.at,
                );
                if let Err(err) = self.ledger.execute(command) {
                    halted(&document, LifecycleAction::Cancel, line.line_no, reversed, &err);
                    return Err(err);
                }
            }

            let command = DocumentCommand::Cancel(CancelDocument {
                document_id: id,
                reason,
                cancelled_by: ctx.user_id,
                occurred_at: ctx.at,
            });
            let document = self.commit(document, &command)?;
            tracing::info!(document = %id, kind = %document.kind(), "document cancelled");
            Ok(document)
        })
    }

    /// Sales only: CONFIRMED -> SHIPPED.
    pub fn ship(&self, ctx: &RequestContext, id: DocumentId) -> ServiceResult<Document> {
        self.guarded(id, || {
            let document = self.get(id)?;
            let command = DocumentCommand::Ship(ShipDocument {
                document_id: id,
                shipped_by: ctx.user_id,
                occurred_at: ctx.at,
            });
            let document = self.commit(document, &command)?;
            tracing::info!(document = %id, "document shipped");
            Ok(document)
        })
    }

    /// Sales only: SHIPPED -> DELIVERED.
    pub fn deliver(&self, ctx: &RequestContext, id: DocumentId) -> ServiceResult<Document> {
        self.guarded(id, || {
            let document = self.get(id)?;
            let command = DocumentCommand::Deliver(DeliverDocument {
                document_id: id,
                delivered_by: ctx.user_id,
                occurred_at: ctx.at,
            });
            let document = self.commit(document, &command)?;
            tracing::info!(document = %id, "document delivered");
            Ok(document)
        })
    }

    /// Soft-delete a draft. Stock is never touched.
    pub fn delete(&self, ctx: &RequestContext, id: DocumentId) -> ServiceResult<Document> {
        self.guarded(id, || {
            let document = self.get(id)?;
            let command = DocumentCommand::Delete(DeleteDocument {
                document_id: id,
                deleted_by: ctx.user_id,
                occurred_at: ctx.at,
            });
            let document = self.commit(document, &command)?;
            tracing::info!(document = %id, kind = %document.kind(), "document deleted");
            Ok(document)
        })
    }

    /// Soft-deleted documents read as missing.
    pub fn get(&self, id: DocumentId) -> ServiceResult<Document> {
        self.documents
            .load(id)?
            .filter(|document| !document.is_deleted())
            .ok_or_else(|| DomainError::DocumentNotFound(id.to_string()).into())
    }

    pub fn list(&self, filter: &DocumentFilter) -> ServiceResult<Vec<Document>> {
        Ok(self.documents.list(filter)?)
    }

    fn build_lines(
        &self,
        inputs: Vec<LineInput>,
        mode: ValidationMode,
    ) -> ServiceResult<Vec<DocumentLine>> {
        let mut lines = Vec::with_capacity(inputs.len());
        for (line_no, input) in (1u32..).zip(inputs) {
            let product = self.catalog.get_product(input.product_id)?;
            lines.push(build_line(line_no, input, &product, mode)?);
        }
        Ok(lines)
    }

    /// Decide, apply, save (CAS on the loaded version), publish.
    fn commit(&self, mut document: Document, command: &DocumentCommand) -> ServiceResult<Document> {
        let base_version = document.version();
        let events = document.handle(command)?;
        document.apply_all(&events);

        self.documents
            .save(&document, ExpectedVersion::Exact(base_version))?;
        self.publish(&document, base_version, &events);

        Ok(document)
    }

    fn publish(&self, document: &Document, base_version: u64, events: &[DocumentEvent]) {
        let key = document.id_typed().to_string();
        for (sequence_number, event) in (base_version + 1..).zip(events) {
            let envelope = match EventEnvelope::from_typed(
                DOCUMENT_AGGREGATE_TYPE,
                key.as_str(),
                sequence_number,
                event,
            ) {
                Ok(envelope) => envelope,
                Err(err) => {
                    tracing::warn!(document = %key, error = %err, "document event serialization failed");
                    continue;
                }
            };

            if let Err(err) = self.bus.publish(envelope) {
                tracing::warn!(document = %key, error = ?err, "document event publication failed");
            }
        }
    }
}

fn location_of(document: &Document) -> Result<LocationId, DomainError> {
    document
        .header()
        .map(|header| header.location_id)
        .ok_or_else(|| DomainError::invariant("document has no header"))
}

/// Ledger direction `action` drives for this document's kind.
fn ledger_direction(
    document: &Document,
    action: LifecycleAction,
) -> Result<StockDirection, DomainError> {
    action.ledger_direction(document.kind()).ok_or_else(|| {
        DomainError::invariant(format!("{} does not move stock", action.as_str()))
    })
}

fn stock_command(
    direction: StockDirection,
    kind: MovementKind,
    line: &DocumentLine,
    tracking_type: TrackingType,
    location_id: LocationId,
    payload: TrackingPayload,
    occurred_at: DateTime<Utc>,
) -> StockCommand {
    let key = StockKey::new(line.product_id, location_id);
    match direction {
        StockDirection::Increase => StockCommand::Increase(IncreaseStock {
            key,
            quantity: line.quantity,
            tracking_type,
            payload,
            kind,
            occurred_at,
        }),
        StockDirection::Decrease => StockCommand::Decrease(DecreaseStock {
            key,
            quantity: line.quantity,
            tracking_type,
            payload,
            kind,
            occurred_at,
        }),
    }
}

fn halted(
    document: &Document,
    action: LifecycleAction,
    failed_line: u32,
    lines_applied: usize,
    err: &ServiceError,
) {
    if lines_applied > 0 {
        tracing::warn!(
            document = %document.id_typed(),
            action = action.as_str(),
            failed_line,
            lines_applied,
            code = err.code(),
            "ledger rejected a line part-way; earlier lines remain applied"
        );
    }
}
