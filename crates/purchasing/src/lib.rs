//! Purchasing domain module (purchase orders, event-sourced).
//!
//! Purchase orders follow draft, submitted, approved, received and billed.
//! Deterministic domain logic only.

pub mod order;
pub mod workflow;

pub use order::{
    CreatePurchaseOrder, EditLines, FireEvent, LinesEdited, PurchaseOrder, PurchaseOrderCommand,
    PurchaseOrderCreated, PurchaseOrderEvent, PurchaseOrderTransitioned,
};
pub use workflow::{PurchaseOrderHeader, PurchaseOrderPatch, PurchaseOrderSnapshot};
