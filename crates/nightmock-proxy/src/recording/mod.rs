//! Recorded variants: types, the variant tree, its store, persistence and
//! the recorder that feeds it from upstream responses.

mod persistence;
mod recorder;
mod store;
mod tree;
mod types;

pub use persistence::{Persister, SAVE_DEBOUNCE};
pub use recorder::{should_record, Recorder};
pub use store::{StoreError, VariantStore};
pub use tree::{select_default, Removal, VariantTree};
pub use types::{headers_from_map, HeaderField, Headers, Node, Record, VariantMap};
