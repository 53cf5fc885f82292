pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod gen;
pub mod orchestration;
pub mod sim;

pub use config::{BreakClearPolicy, Config, ValidationMode};
pub use db::{init_db, Repository};
pub use domain::{
    Break, BreakReason, CounterpartyTrade, Position, Side, Symbol, Trade, TradeInput,
};
pub use error::AppError;
pub use orchestration::IngestOrchestrator;
pub use sim::SimulatorParams;
