//! Line Items Manager: the ordered line collection of one document.
//!
//! Every mutation validates first and only then touches the collection, so a
//! failed call leaves the document exactly as it was. Totals are recomputed
//! from the items on every call; nothing derived is cached.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use docflow_core::{DomainError, DomainResult, LineItemId};

use crate::line::{LineItem, LineItemPatch};
use crate::service::{CalculationService, DocumentTotals, LineComputation};

/// A line edit expressed as data, so documents can record it as an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LineCommand {
    Add { item: LineItem },
    Update { id: LineItemId, patch: LineItemPatch },
    Remove { id: LineItemId },
    Reorder { id: LineItemId, index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineItemsManager {
    items: Vec<LineItem>,
    service: CalculationService,
}

impl LineItemsManager {
    pub fn new(service: CalculationService) -> Self {
        Self {
            items: Vec::new(),
            service,
        }
    }

    /// Rebuild a manager from stored items, re-checking every invariant.
    pub fn from_items(
        service: CalculationService,
        items: impl IntoIterator<Item = LineItem>,
    ) -> DomainResult<Self> {
        let mut manager = Self::new(service);
        for item in items {
            manager.add(item)?;
        }
        Ok(manager)
    }

    pub fn service(&self) -> &CalculationService {
        &self.service
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: LineItemId) -> Option<&LineItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn position(&self, id: LineItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    pub fn totals(&self) -> DomainResult<DocumentTotals> {
        self.service.compute_document(&self.items)
    }

    pub fn grand_total(&self) -> DomainResult<Decimal> {
        Ok(self.totals()?.grand_total)
    }

    /// Per-line breakdown, in document order.
    pub fn computations(&self) -> DomainResult<Vec<(LineItemId, LineComputation)>> {
        self.items
            .iter()
            .map(|item| Ok((item.id, self.service.compute_line(item)?)))
            .collect()
    }

    pub fn add(&mut self, item: LineItem) -> DomainResult<DocumentTotals> {
        item.validate()?;
        if self.get(item.id).is_some() {
            return Err(DomainError::conflict(format!(
                "line item {} already exists",
                item.id
            )));
        }
        self.service.compute_line(&item)?;
        self.items.push(item);
        self.totals()
    }

    pub fn remove(&mut self, id: LineItemId) -> DomainResult<DocumentTotals> {
        let idx = self.require(id)?;
        self.items.remove(idx);
        self.totals()
    }

    /// Move a line to `new_index` (its position after the move).
    pub fn reorder(&mut self, id: LineItemId, new_index: usize) -> DomainResult<DocumentTotals> {
        let idx = self.require(id)?;
        if new_index >= self.items.len() {
            return Err(DomainError::validation(format!(
                "reorder index {new_index} out of range for {} line(s)",
                self.items.len()
            )));
        }
        let item = self.items.remove(idx);
        self.items.insert(new_index, item);
        self.totals()
    }

    pub fn update(&mut self, id: LineItemId, patch: &LineItemPatch) -> DomainResult<DocumentTotals> {
        let idx = self.require(id)?;
        let next = patch.applied_to(&self.items[idx]);
        next.validate()?;
        self.service.compute_line(&next)?;
        self.items[idx] = next;
        self.totals()
    }

    pub fn execute(&mut self, command: &LineCommand) -> DomainResult<DocumentTotals> {
        match command {
            LineCommand::Add { item } => self.add(item.clone()),
            LineCommand::Update { id, patch } => self.update(*id, patch),
            LineCommand::Remove { id } => self.remove(*id),
            LineCommand::Reorder { id, index } => self.reorder(*id, *index),
        }
    }

    fn require(&self, id: LineItemId) -> DomainResult<usize> {
        self.position(id)
            .ok_or_else(|| DomainError::not_found(format!("line item {id}")))
    }
}
