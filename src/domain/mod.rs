pub mod chunking;
pub mod entities;
pub mod errors;
pub mod parser;
pub mod ports;
pub mod tools;

pub use chunking::{chunk_text, split_sentences};
pub use entities::*;
pub use errors::{DomainError, Result};
pub use parser::{parse_course, ParseError, ParsedCourse, Section};
pub use tools::{OutlineArgs, SearchArgs, ToolCall, ToolError, ToolSpec};
