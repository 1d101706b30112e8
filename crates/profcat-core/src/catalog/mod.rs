//! Session catalog module.
//!
//! # Module Structure
//!
//! - `manager`: The `SessionsManager`, owner of all catalog state
//! - `entry`: Rows of the display-ordered list and their identities
//! - `selection`: Implicit selection after a list republish
//! - `aspect`: Change notifications
//! - `import`: Imported sessions and the `ImportHandler` trait
//! - `state`: Internal catalog state and the view range cache

mod aspect;
mod entry;
mod import;
mod manager;
mod selection;
mod state;

pub use aspect::SessionAspect;
pub use entry::{CatalogEntry, EntryIdentity, compare_entries, flatten_items, same_identities};
pub use import::{ImportHandler, ImportedSession, imported_session_id};
pub use manager::SessionsManager;
pub use selection::{InferredSelection, Selection, infer_selection};
pub use state::ViewRange;
