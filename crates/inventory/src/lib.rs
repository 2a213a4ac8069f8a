//! Inventory domain module: the stock ledger.
//!
//! Stock is never stored as a mutable counter. Every change is an immutable
//! [`StockMovement`]; current stock is a fold over the movements of one
//! [`StockKey`]. This crate is pure domain logic (no IO, no storage).

pub mod movement;
pub mod projection;

pub use movement::{MovementKind, MovementOrigin, NewStockMovement, StockKey, StockMovement};
pub use projection::{RunningTotal, StockProjection, fold};
