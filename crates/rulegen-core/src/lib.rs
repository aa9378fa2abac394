pub mod compiler;
pub mod render;
pub mod rules;
pub mod schema;

pub use compiler::{CompileError, CompilerOptions, ErrorKind, compile, compile_with};
pub use render::to_sql;
pub use rules::{BinaryRule, RelationTypeRestriction, SchemaQueryRules, UnaryRule};
