//! Cross-checks of line payloads against product tracking types.
//!
//! Lenient mode runs while a document is a draft and only asks that the
//! discipline's identifying field is present. Strict mode runs on confirmation
//! and additionally requires one serial per unit.

use stockledger_catalog::{ProductInfo, TrackingType};
use stockledger_core::{DomainError, DomainResult};
use stockledger_inventory::TrackingPayload;

use crate::line::{DocumentLine, LineInput};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ValidationMode {
    Lenient,
    Strict,
}

pub fn validate_tracking(
    tracking_type: TrackingType,
    quantity: i64,
    payload: &TrackingPayload,
    mode: ValidationMode,
) -> DomainResult<()> {
    match tracking_type {
        TrackingType::Serialized => match mode {
            ValidationMode::Lenient if payload.serial_numbers.is_empty() => {
                Err(DomainError::SerialNumbersRequired)
            }
            ValidationMode::Strict if payload.serial_numbers.len() as i64 != quantity => {
                Err(DomainError::SerialCountMismatch {
                    expected: quantity,
                    actual: payload.serial_numbers.len(),
                })
            }
            _ => Ok(()),
        },
        TrackingType::LotTracked if payload.non_blank_lot_code().is_none() => {
            Err(DomainError::LotCodeRequired)
        }
        TrackingType::LotTracked | TrackingType::Simple | TrackingType::Expirable => Ok(()),
    }
}

/// Variant parents only group variants; they never move stock.
pub fn ensure_transactable(product: &ProductInfo) -> DomainResult<()> {
    if product.is_variant_parent {
        return Err(DomainError::VariantParentNotTransactable(product.name.clone()));
    }
    Ok(())
}

/// Validate one submitted line against its product and build it.
pub fn build_line(
    line_no: u32,
    input: LineInput,
    product: &ProductInfo,
    mode: ValidationMode,
) -> DomainResult<DocumentLine> {
    ensure_transactable(product)?;
    let line = DocumentLine::from_input(line_no, input)?;
    validate_tracking(product.tracking_type, line.quantity, &line.tracking, mode)?;
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_catalog::ProductId;

    fn product(tracking_type: TrackingType) -> ProductInfo {
        ProductInfo::new(ProductId::generate(), "Widget", tracking_type)
    }

    #[test]
    fn lenient_serialized_only_needs_some_serials() {
        let payload = TrackingPayload::serials(["SN1"]);
        assert!(
            validate_tracking(TrackingType::Serialized, 2, &payload, ValidationMode::Lenient)
                .is_ok()
        );

        let err = validate_tracking(
            TrackingType::Serialized,
            2,
            &TrackingPayload::none(),
            ValidationMode::Lenient,
        )
        .unwrap_err();
        assert_eq!(err, DomainError::SerialNumbersRequired);
    }

    #[test]
    fn strict_serialized_needs_one_serial_per_unit() {
        let payload = TrackingPayload::serials(["SN1"]);
        let err = validate_tracking(TrackingType::Serialized, 2, &payload, ValidationMode::Strict)
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::SerialCountMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn lot_code_is_required_in_both_modes() {
        for mode in [ValidationMode::Lenient, ValidationMode::Strict] {
            let err = validate_tracking(TrackingType::LotTracked, 1, &TrackingPayload::lot(" "), mode)
                .unwrap_err();
            assert_eq!(err, DomainError::LotCodeRequired);
        }
    }

    #[test]
    fn simple_and_expirable_need_nothing() {
        for tt in [TrackingType::Simple, TrackingType::Expirable] {
            assert!(
                validate_tracking(tt, 5, &TrackingPayload::none(), ValidationMode::Strict).is_ok()
            );
        }
    }

    #[test]
    fn variant_parent_is_rejected() {
        let parent = product(TrackingType::Simple).variant_parent();
        let input = LineInput::new(parent.id, 1, 100);
        let err = build_line(1, input, &parent, ValidationMode::Lenient).unwrap_err();
        assert_eq!(err.code(), "VARIANT_PARENT_NOT_TRANSACTABLE");
    }

    #[test]
    fn build_line_validates_and_prices() {
        let info = product(TrackingType::LotTracked);
        let input = LineInput::new(info.id, 4, 10).with_tracking(TrackingPayload::lot("L1"));
        let line = build_line(3, input, &info, ValidationMode::Strict).unwrap();
        assert_eq!(line.line_no, 3);
        assert_eq!(line.line_total, 40);
    }
}
