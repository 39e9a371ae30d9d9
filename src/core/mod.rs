//! Core data types shared across the pipeline and CLI.

pub mod turn;

pub use turn::{PreparedTurn, Retrieval, RouteDecision, RoutedTurn, Turn, TurnState, Verdict};
