//! Remote catalog client.
//!
//! Pulls product listings page by page from the commerce platform's admin API.
//! Products are handed out undecoded ([`RemoteProduct`]) so that one malformed
//! listing only fails itself, not the page it arrived on.

pub mod client;
pub mod error;
pub mod source;
pub mod types;

pub use {
    client::HttpCatalog,
    error::{Error, Result},
    source::CatalogSource,
    types::{Image, ProductListing, RemoteProduct, Variant},
};
