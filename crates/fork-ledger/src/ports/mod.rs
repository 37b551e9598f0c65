//! Ports.
//!
//! The ledger persists records and touches consumer entities only through
//! these interfaces; the durable store behind them is shared with the rest
//! of the consumer's data and is otherwise out of scope.

mod outbound;

pub use outbound::{
    EntityError, EntityGateway, EntityResolver, ForkRecordStore, RevertHook, RevertObserver,
    StoreError,
};
