mod parser;
pub mod types;
pub mod validation;
mod wire;

pub use parser::{ParseError, parse_schema};
pub use validation::{SchemaLimits, ValidationError, validate_schema};
pub use wire::{WireError, decode_schema};
