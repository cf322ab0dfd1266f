#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::missing_crate_level_docs
)]

//! Multi-tenant email sending library.
//!
//! Messages are dispatched either through a single statically configured
//! provider, or through a provider resolved per namespace from the config
//! service.

pub mod cache;
pub mod domain;
pub mod infrastructure;
