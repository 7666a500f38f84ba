//! # einvoice
//!
//! Multi-format e-invoicing engine: one canonical invoice model, a family of
//! format generators (XRechnung UBL/CII, Peppol BIS, Factur-X, FatturaPA,
//! KSeF, NLCIUS, CIUS-RO), and the extraction-side plumbing that feeds it —
//! locale-aware numeric normalization, totals cross-validation, a bounded
//! corrective-retry loop toward the AI provider, and optimistic-concurrency
//! persistence.
//!
//! All monetary values use [`rust_decimal::Decimal`] — never floating point.
//! Fields that an extraction may fail to produce are `Option`al; the
//! validator reports what is missing instead of guessing.
//!
//! ## Quick Start
//!
//! ```rust
//! use einvoice::core::*;
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//!
//! let mut invoice = CanonicalInvoice::new(FormatId::XrechnungUbl);
//! invoice.invoice_number = "RE-2026-001".into();
//! invoice.issue_date = NaiveDate::from_ymd_opt(2026, 3, 1);
//! invoice.seller.name = "ACME GmbH".into();
//! invoice.buyer.name = "Kunde AG".into();
//! invoice.lines.push(LineItem {
//!     description: "Beratung".into(),
//!     quantity: Some(dec!(10)),
//!     unit_price: Some(dec!(150)),
//!     total_price: Some(dec!(1500)),
//!     tax_rate: Some(dec!(19)),
//!     ..LineItem::default()
//! });
//! invoice.totals = MonetaryTotals {
//!     subtotal: Some(dec!(1500)),
//!     tax_amount: Some(dec!(285)),
//!     total_amount: Some(dec!(1785)),
//! };
//!
//! let outcome = validate(&invoice);
//! assert!(outcome.valid, "{:?}", outcome.issues);
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Canonical model, numeric normalizer, extraction validator |
//! | `formats` | Format generators + registry, PDF/A-3 Factur-X embedding |
//! | `extraction` | Provider boundary, retry loop, rate limiter, job pipeline |
//! | `store` | Optimistic-concurrency versioned store |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "formats")]
pub mod formats;

#[cfg(feature = "extraction")]
pub mod extraction;

#[cfg(feature = "store")]
pub mod store;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
