//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: The reconciled session entity (`Session`), its metadata and type
//! - `item`: The stateful wrapper the catalog keeps per session (`SessionItem`)

mod item;
mod model;

pub use item::SessionItem;
pub use model::{ONGOING_END_TIMESTAMP, Session, SessionMetadata, SessionType};
