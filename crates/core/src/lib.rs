//! Native doc runtime domain library.
//!
//! Pure logic with no I/O: hierarchy keys, schema and layout interpretation,
//! the `depends_on` expression language, the doc definition bundle and its
//! patch lenses, runtime UI config, form/list state, catalog option
//! building, and runtime action request rules.

pub mod action;
pub mod bundle;
pub mod catalog;
pub mod doc;
pub mod error;
pub mod expression;
pub mod form;
pub mod hierarchy;
pub mod layout;
pub mod list;
pub mod schema;
pub mod types;
pub mod ui_config;
