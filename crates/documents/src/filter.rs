//! Listing criteria for documents.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockledger_core::LocationId;

use crate::document::{CounterpartyId, Document};
use crate::status::{DocumentKind, DocumentStatus};

/// Every set field must match. Date bounds are inclusive and compare against
/// the header's document date. Soft-deleted documents never match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFilter {
    pub kind: Option<DocumentKind>,
    pub status: Option<DocumentStatus>,
    pub location_id: Option<LocationId>,
    pub counterparty_id: Option<CounterpartyId>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl DocumentFilter {
    pub fn kind(kind: DocumentKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn matches(&self, document: &Document) -> bool {
        if !document.is_created() || document.is_deleted() {
            return false;
        }
        let Some(header) = document.header() else {
            return false;
        };

        self.kind.is_none_or(|kind| kind == document.kind())
            && self.status.is_none_or(|status| status == document.status())
            && self.location_id.is_none_or(|id| id == header.location_id)
            && self
                .counterparty_id
                .is_none_or(|id| Some(id) == header.counterparty_id)
            && self.date_from.is_none_or(|from| header.document_date >= from)
            && self.date_to.is_none_or(|to| header.document_date <= to)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use stockledger_catalog::ProductId;
    use stockledger_core::{Aggregate, AggregateId, UserId};

    use super::*;
    use crate::document::{CreateDocument, DeleteDocument, DocumentCommand, DocumentHeader, DocumentId};
    use crate::line::{DocumentLine, LineInput};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn document(kind: DocumentKind, header: DocumentHeader) -> Document {
        let id = DocumentId::generate();
        let mut doc = Document::empty(id);
        let line = DocumentLine::from_input(1, LineInput::new(ProductId::generate(), 1, 10)).unwrap();
        let events = doc
            .handle(&DocumentCommand::Create(CreateDocument {
                document_id: id,
                kind,
                number: None,
                header,
                lines: vec![line],
                created_by: UserId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        doc.apply_all(&events);
        doc
    }

    #[test]
    fn empty_filter_matches_any_live_document() {
        let doc = document(DocumentKind::Sale, DocumentHeader::new(LocationId::new(), date(1), "UZS"));
        assert!(DocumentFilter::default().matches(&doc));
        assert!(!DocumentFilter::default().matches(&Document::empty(DocumentId::generate())));
    }

    #[test]
    fn fields_and_inclusive_date_range_narrow_the_match() {
        let location = LocationId::new();
        let supplier = CounterpartyId(AggregateId::new());
        let mut header = DocumentHeader::new(location, date(10), "UZS");
        header.counterparty_id = Some(supplier);
        let doc = document(DocumentKind::PurchaseReceipt, header);

        let filter = DocumentFilter {
            kind: Some(DocumentKind::PurchaseReceipt),
            status: Some(DocumentStatus::Draft),
            location_id: Some(location),
            counterparty_id: Some(supplier),
            date_from: Some(date(10)),
            date_to: Some(date(10)),
        };
        assert!(filter.matches(&doc));

        assert!(!DocumentFilter::kind(DocumentKind::Sale).matches(&doc));
        assert!(
            !DocumentFilter {
                location_id: Some(LocationId::new()),
                ..filter.clone()
            }
            .matches(&doc)
        );
        assert!(
            !DocumentFilter {
                date_from: Some(date(11)),
                ..filter.clone()
            }
            .matches(&doc)
        );
        assert!(
            !DocumentFilter {
                status: Some(DocumentStatus::Confirmed),
                ..filter
            }
            .matches(&doc)
        );
    }

    #[test]
    fn deleted_documents_never_match() {
        let mut doc = document(DocumentKind::Sale, DocumentHeader::new(LocationId::new(), date(1), "UZS"));
        let events = doc
            .handle(&DocumentCommand::Delete(DeleteDocument {
                document_id: doc.id_typed(),
                deleted_by: UserId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        doc.apply_all(&events);

        assert!(!DocumentFilter::default().matches(&doc));
    }
}
