//! Material requests submitted by field crews and the queue that holds them
use super::error::LedgerError;
use super::ledger::InventoryItem;
use super::types::{RequestStatus, TimeStamp};
use super::utils::{REQUEST_HRP, new_uuid_to_bech32};
use chrono::Utc;
use std::collections::VecDeque;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    #[n(0)]
    pub material_id: String,
    #[n(1)]
    pub material_name: String, // snapshot at submission, never re-resolved
    #[n(2)]
    pub quantity: u64,
}

impl RequestLine {
    pub fn new(material_id: impl Into<String>, material_name: impl Into<String>, quantity: u64) -> Self {
        Self {
            material_id: material_id.into(),
            material_name: material_name.into(),
            quantity,
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct MaterialRequest {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub vtr: String, // truck identifier
    #[n(2)]
    pub requester_name: String,
    #[n(3)]
    pub date: TimeStamp<Utc>,
    #[n(4)]
    pub items: Vec<RequestLine>,
    #[n(5)]
    pub status: RequestStatus,
}

impl MaterialRequest {
    pub fn new(
        id: impl Into<String>,
        vtr: impl Into<String>,
        requester_name: impl Into<String>,
        items: Vec<RequestLine>,
    ) -> Self {
        Self {
            id: id.into(),
            vtr: vtr.into(),
            requester_name: requester_name.into(),
            date: TimeStamp::new(),
            items,
            status: RequestStatus::Pendente,
        }
    }

    /// Field checks a submission must pass before it enters the queue.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.id.trim().is_empty() {
            return Err(LedgerError::InvalidRequest("request id is empty".into()));
        }
        if self.vtr.trim().is_empty() {
            return Err(LedgerError::InvalidRequest("VTR is not set".into()));
        }
        if self.requester_name.trim().is_empty() {
            return Err(LedgerError::InvalidRequest("requester name is not set".into()));
        }
        if self.items.is_empty() {
            return Err(LedgerError::InvalidRequest("request has no items".into()));
        }
        if self.items.iter().any(|line| line.quantity == 0) {
            return Err(LedgerError::InvalidQuantity);
        }
        // each material gets exactly one debit when the request is fulfilled
        for (idx, line) in self.items.iter().enumerate() {
            if self.items[..idx]
                .iter()
                .any(|prev| prev.material_id == line.material_id)
            {
                return Err(LedgerError::InvalidRequest(format!(
                    "material {} appears more than once",
                    line.material_id
                )));
            }
        }
        Ok(())
    }

    /// `Luva (x4), Fita (x2)`
    pub fn items_summary(&self) -> String {
        self.items
            .iter()
            .map(|line| format!("{} (x{})", line.material_name, line.quantity))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Builder a crew fills in before submitting. Availability is checked as lines are added.
#[derive(Debug, Default, Clone)]
pub struct RequestDraft {
    vtr: Option<String>,
    requester_name: Option<String>,
    items: Vec<RequestLine>,
}

impl RequestDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_vtr(mut self, vtr: &str) -> Self {
        self.vtr = Some(vtr.trim().to_string());
        self
    }
    pub fn set_requester(mut self, name: &str) -> Self {
        self.requester_name = Some(name.trim().to_string());
        self
    }
    /// Add `quantity` of a material. A material already in the draft has its line increased.
    pub fn add_item(mut self, item: &InventoryItem, quantity: u64) -> Result<Self, LedgerError> {
        if quantity == 0 {
            return Err(LedgerError::InvalidQuantity);
        }
        let existing = self
            .items
            .iter()
            .position(|line| line.material_id == item.id());
        let already = existing.map(|idx| self.items[idx].quantity).unwrap_or(0);
        let total = already.checked_add(quantity).ok_or_else(|| {
            LedgerError::InvalidRequest(format!("quantity for {} is too large", item.name()))
        })?;

        if total > item.quantity {
            return Err(LedgerError::InvalidRequest(format!(
                "insufficient stock for {}: {} available",
                item.name(),
                item.quantity.saturating_sub(already)
            )));
        }

        match existing {
            Some(idx) => self.items[idx].quantity = total,
            None => self
                .items
                .push(RequestLine::new(item.id(), item.name(), quantity)),
        }
        Ok(self)
    }
    pub fn remove_item(mut self, material_id: &str) -> Self {
        self.items.retain(|line| line.material_id != material_id);
        self
    }
    pub fn items(&self) -> &[RequestLine] {
        &self.items
    }
    /// Checks fields and produces a pending request with a fresh id.
    pub fn finalise(self) -> Result<MaterialRequest, LedgerError> {
        let vtr = self.vtr.unwrap_or_default();
        let requester_name = self.requester_name.unwrap_or_default();
        let id = new_uuid_to_bech32(REQUEST_HRP)?;

        let request = MaterialRequest::new(id, vtr, requester_name, self.items);
        request.validate()?;
        Ok(request)
    }
}

/// Submitted requests, newest first.
#[derive(Debug, Default, Clone)]
pub struct RequestQueue {
    entries: VecDeque<MaterialRequest>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_newest_first(entries: Vec<MaterialRequest>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    /// Every submission enters as `Pendente`, whatever status it carried.
    pub fn submit(&mut self, mut request: MaterialRequest) {
        request.status = RequestStatus::Pendente;
        self.entries.push_front(request);
    }

    pub fn list(&self) -> impl Iterator<Item = &MaterialRequest> {
        self.entries.iter()
    }

    pub fn find_by_id(&self, id: &str) -> Option<&MaterialRequest> {
        self.entries.iter().find(|r| r.id == id)
    }

    pub(crate) fn find_mut(&mut self, id: &str) -> Option<&mut MaterialRequest> {
        self.entries.iter_mut().find(|r| r.id == id)
    }

    pub fn pending(&self) -> impl Iterator<Item = &MaterialRequest> {
        self.entries
            .iter()
            .filter(|r| r.status == RequestStatus::Pendente)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
