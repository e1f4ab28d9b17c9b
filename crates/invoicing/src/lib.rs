//! Invoicing domain module (event-sourced).
//!
//! Invoices move through draft, sent, partial, overdue and paid under the
//! invoice workflow; payments are recorded as workflow events. Pure domain
//! logic, no IO.

pub mod invoice;
pub mod workflow;

pub use invoice::{
    CreateInvoice, EditLines, FireEvent, Invoice, InvoiceCommand, InvoiceCreated, InvoiceEvent,
    InvoiceTransitioned, LinesEdited,
};
pub use workflow::{InvoiceHeader, InvoicePatch, InvoiceSnapshot};
