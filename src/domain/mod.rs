//! Domain types and the ports the application layer depends on.

pub mod idempotency;
pub mod ledger;
pub mod ports;
pub mod transfer;
