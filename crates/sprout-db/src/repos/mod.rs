//! Typed CRUD over the relational schema. Each public method is one
//! transaction; the free `query_*` helpers run on whatever connection or
//! transaction the caller already holds.

mod devices;
mod pw_reset;
mod sessions;
mod users;

pub use devices::ProvisionOutcome;
