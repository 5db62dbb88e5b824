#![doc = include_str!("../README.md")]

mod config;
mod document;
mod error;
mod execution;
mod id;
mod invalidation;
mod parser;
mod policy;
mod range_store;
mod scheduler;
mod text;
mod tracer;

pub mod report;
pub mod toy;

pub use config::*;
pub use document::*;
pub use error::*;
pub use execution::*;
pub use id::*;
pub use invalidation::*;
pub use parser::*;
pub use policy::*;
pub use range_store::*;
pub use scheduler::*;
pub use text::*;
pub use tracer::*;
