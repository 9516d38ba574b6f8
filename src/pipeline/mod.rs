//! Pipeline stages for exam-document conversion.
//!
//! Each submodule implements one step. Keeping stages separate makes each
//! independently testable and lets the image backend be swapped without
//! touching classification or the batch loop.
//!
//! ## Data Flow
//!
//! ```text
//! classify ──▶ convert ──▶ backend ──▶ resample ──▶ encode
//! (geometry/   (route by    (decode or   (exact      (JPEG/PNG + DPI,
//!  filename)    class)       pass)        W×H)        size ceiling)
//! ```
//!
//! 1. [`classify`] — assign a [`crate::DocumentClass`]; never fails
//! 2. [`convert`]  — photos and signatures go to the backend, everything
//!    else is checked against the exam's allow-list and passed through
//! 3. [`backend`]  — the [`backend::ImageBackend`] capability seam,
//!    selected once per [`crate::Pipeline`]
//! 4. [`resample`] — deterministic area-average / bicubic resize, then the
//!    opt-in [`enhance`] adjustments
//! 5. [`encode`]   — DPI-tagged encoding, stepping JPEG quality down until
//!    the output fits

pub mod backend;
pub mod classify;
pub mod convert;
pub mod encode;
pub mod enhance;
pub mod resample;
