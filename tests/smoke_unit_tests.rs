//! Smoke Screen Unit tests for stock approval components
//!
//! These tests span the public API of each module in isolation from the
//! integration scenarios. They are intended as a smoke screen and mostly
//! cover the happy path.

use chrono::{Datelike, Timelike, Utc};
use stock_approval::{
    catalog,
    config::StockConfig,
    ledger::InventoryLedger,
    request::{MaterialRequest, RequestDraft, RequestLine},
    types::{MovementType, RequestStatus, TimeStamp},
    utils::{new_uuid_to_bech32, request_debit_id},
};

// UTILS MODULE TESTS
mod utils_tests {
    use super::*;

    /// Generated ids carry the requested human-readable prefix
    #[test]
    fn generates_valid_bech32_with_hrp() {
        let encoded = new_uuid_to_bech32("req_").unwrap();
        assert!(encoded.starts_with("req_1"));
        assert!(encoded.len() > 10);
    }

    /// Empty prefixes cannot be encoded
    #[test]
    fn handles_empty_hrp() {
        assert!(new_uuid_to_bech32("").is_err());
    }

    /// Successive ids are unique
    #[test]
    fn generates_unique_ids() {
        let id1 = new_uuid_to_bech32("tx_").unwrap();
        let id2 = new_uuid_to_bech32("tx_").unwrap();
        assert_ne!(id1, id2);
    }

    #[test]
    fn debit_ids_follow_request_and_material() {
        assert_eq!(request_debit_id("abc", "m7"), "req-out-abc-m7");
    }
}

// TYPES MODULE TESTS
mod types_tests {
    use super::*;

    /// TimeStamp::new() is close to the current time
    #[test]
    fn timestamp_new_creates_current_time() {
        let ts = TimeStamp::new();
        let diff = (Utc::now() - ts.to_datetime_utc()).num_seconds().abs();
        assert!(diff < 1);
    }

    #[test]
    fn timestamp_new_with_creates_specific_time() {
        let dt = TimeStamp::new_with(2024, 6, 15, 10, 30, 0).to_datetime_utc();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 6);
        assert_eq!(dt.day(), 15);
        assert_eq!(dt.hour(), 10);
        assert_eq!(dt.minute(), 30);
    }

    #[test]
    fn movement_names() {
        assert_eq!(MovementType::Entrada.to_string(), "entrada");
        assert_eq!(MovementType::Saida.as_str(), "saida");
    }

    #[test]
    fn status_cbor_roundtrip() {
        let encoded = minicbor::to_vec(RequestStatus::NaoAtendido).unwrap();
        let decoded: RequestStatus = minicbor::decode(&encoded).unwrap();
        assert_eq!(decoded, RequestStatus::NaoAtendido);
    }
}

// CATALOG AND LEDGER TESTS
mod ledger_tests {
    use super::*;

    /// A seeded ledger has every catalog material at zero
    #[test]
    fn seeded_ledger_starts_empty() {
        let ledger = InventoryLedger::seeded(catalog::materials());
        assert_eq!(ledger.len(), catalog::materials().len());
        assert!(ledger.get().iter().all(|i| i.quantity == 0));
        assert!(ledger.requestable("").is_empty());
    }
}

// REQUEST MODULE TESTS
mod request_tests {
    use super::*;

    #[test]
    fn blank_fields_fail_validation() {
        let line = vec![RequestLine::new("m1", "Luva", 1)];
        assert!(MaterialRequest::new("1", " ", "Ana", line.clone()).validate().is_err());
        assert!(MaterialRequest::new("1", "12", "", line.clone()).validate().is_err());
        assert!(MaterialRequest::new("1", "12", "Ana", vec![]).validate().is_err());
        assert!(MaterialRequest::new("1", "12", "Ana", line).validate().is_ok());
    }

    #[test]
    fn empty_draft_cannot_be_finalised() {
        assert!(RequestDraft::new().finalise().is_err());
    }
}

// CONFIG MODULE TESTS
mod config_tests {
    use super::*;

    #[test]
    fn default_config_is_local_only() {
        let config = StockConfig::default();
        assert!(config.remote.endpoint().is_none());
    }
}
