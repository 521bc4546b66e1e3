//! Page-side collaborators of redo records.
//!
//! Records describe mutations; the modules here own the page layout that
//! performs them and the store that holds durable page images.

/// Version 1 slotted data page layout.
pub mod data_page;

/// Page-format handler trait and version registry.
pub mod format;

/// Durable page image stores.
pub mod store;

pub use data_page::{DataPageV1, FORMAT_VERSION_V1, NO_NEXT_LINK};
pub use format::{DataItem, DataPageFormat, DataPageVersions};
pub use store::{MemPageStore, PageStore};
