//! Quotations domain module (event-sourced).
//!
//! Business rules for quotations, implemented purely as deterministic domain
//! logic (no IO, no storage). Status is governed by the generic workflow
//! engine; totals come from the calculation pipeline.

pub mod quotation;
pub mod workflow;

pub use quotation::{
    CreateQuotation, EditLines, FireEvent, LinesEdited, Quotation, QuotationCommand,
    QuotationCreated, QuotationEvent, QuotationTransitioned,
};
pub use workflow::{QuotationHeader, QuotationPatch, QuotationSnapshot};
