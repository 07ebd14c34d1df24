//! Stateful sessions over doc definitions.
//!
//! [`BuilderDesk`] edits the `{doc, schema, actions}` triple of one doc and
//! saves it in a single step. [`RuntimeDocSession`] renders a doc's list,
//! report and form views from its definition and runs its actions.

pub mod desk;
pub mod error;
pub mod runtime;
pub mod source;

#[cfg(test)]
pub(crate) mod testing;

pub use desk::{load_shared, shared, BuilderDesk, DeskState, LoadTicket, SaveTicket, SharedDesk, StudioConfig};
pub use error::{DeskError, DeskResult};
pub use runtime::{run_action_shared, ActionTicket, RuntimeDocSession, SharedSession};
pub use source::{DocDefinitionSource, LoadedDefinition};
