//! The closed set of tools offered to the language model.
//!
//! Each tool's argument struct declares its fields through [`ToolArgs`]; the
//! JSON schema sent to the model is derived from that declaration.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool '{0}' not found")]
    UnknownTool(String),

    #[error("Invalid arguments for '{tool}': {message}")]
    InvalidArguments { tool: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
}

impl FieldKind {
    fn json_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub description: &'static str,
    pub required: bool,
}

pub trait ToolArgs: DeserializeOwned {
    const TOOL_NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn fields() -> &'static [FieldSpec];

    fn spec() -> ToolSpec {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for field in Self::fields() {
            properties.insert(
                field.name.to_string(),
                json!({
                    "type": field.kind.json_type(),
                    "description": field.description,
                }),
            );
            if field.required {
                required.push(Value::from(field.name));
            }
        }

        ToolSpec {
            name: Self::TOOL_NAME.to_string(),
            description: Self::DESCRIPTION.to_string(),
            parameters: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchArgs {
    pub query: String,
    #[serde(default)]
    pub course_name: Option<String>,
    #[serde(default)]
    pub lesson_number: Option<u32>,
}

impl ToolArgs for SearchArgs {
    const TOOL_NAME: &'static str = "search_course_content";
    const DESCRIPTION: &'static str =
        "Search course materials with smart course name matching and lesson filtering";

    fn fields() -> &'static [FieldSpec] {
        &[
            FieldSpec {
                name: "query",
                kind: FieldKind::String,
                description: "What to search for in the course content",
                required: true,
            },
            FieldSpec {
                name: "course_name",
                kind: FieldKind::String,
                description: "Course title (partial matches work, e.g. 'MCP', 'Introduction')",
                required: false,
            },
            FieldSpec {
                name: "lesson_number",
                kind: FieldKind::Integer,
                description: "Specific lesson number to search within (e.g. 1, 2, 3)",
                required: false,
            },
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineArgs {
    pub course_name: String,
}

impl ToolArgs for OutlineArgs {
    const TOOL_NAME: &'static str = "get_course_outline";
    const DESCRIPTION: &'static str =
        "Get a course outline: title, course link, instructor and every lesson's number and title";

    fn fields() -> &'static [FieldSpec] {
        &[FieldSpec {
            name: "course_name",
            kind: FieldKind::String,
            description: "Course title (partial matches work)",
            required: true,
        }]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    SearchCourseContent(SearchArgs),
    GetCourseOutline(OutlineArgs),
}

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SearchCourseContent(_) => SearchArgs::TOOL_NAME,
            Self::GetCourseOutline(_) => OutlineArgs::TOOL_NAME,
        }
    }

    pub fn specs() -> Vec<ToolSpec> {
        vec![SearchArgs::spec(), OutlineArgs::spec()]
    }

    /// Decodes a model-issued invocation from its tool name and JSON input.
    pub fn from_named(name: &str, input: Value) -> Result<Self, ToolError> {
        match name {
            SearchArgs::TOOL_NAME => decode(name, input).map(Self::SearchCourseContent),
            OutlineArgs::TOOL_NAME => decode(name, input).map(Self::GetCourseOutline),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

fn decode<T: ToolArgs>(name: &str, input: Value) -> Result<T, ToolError> {
    serde_json::from_value(input).map_err(|e| ToolError::InvalidArguments {
        tool: name.to_string(),
        message: e.to_string(),
    })
}
