//! Tool schemas sent in the chat-completions request.
//!
//! The API expects each tool as a function declaration with a JSON-schema
//! parameter object. Without these definitions the model cannot emit
//! structured `tool_calls` and falls back to describing actions in prose.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A function tool definition in the chat-completions wire shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    /// Always "function".
    #[serde(rename = "type")]
    pub tool_type: String,
    /// The function declaration.
    pub function: FunctionDefinition,
}

/// The function half of a tool definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionDefinition {
    /// The unique tool name.
    pub name: String,
    /// What the tool does; the model uses this to decide when to call it.
    pub description: String,
    /// JSON Schema for the arguments object.
    pub parameters: Value,
}

impl ToolDefinition {
    /// Creates a function tool definition.
    #[must_use]
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// Tool choice for the request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// The model decides whether to call tools.
    #[default]
    Auto,
    /// The model must not call tools.
    None,
}

/// Returns the full tool set: read_file, write_file, edit_file,
/// glob_search, grep_search, execute_command.
#[must_use]
pub fn default_tools() -> Vec<ToolDefinition> {
    vec![
        read_file_tool(),
        write_file_tool(),
        edit_file_tool(),
        glob_search_tool(),
        grep_search_tool(),
        execute_command_tool(),
    ]
}

/// Returns the tool set filtered by an allow-list of tool names. `None`
/// means all tools.
#[must_use]
pub fn filtered_tools(allowed: Option<&[String]>) -> Vec<ToolDefinition> {
    let tools = default_tools();
    match allowed {
        None => tools,
        Some(names) => tools
            .into_iter()
            .filter(|t| names.iter().any(|n| n == t.name()))
            .collect(),
    }
}

fn read_file_tool() -> ToolDefinition {
    ToolDefinition::function(
        "read_file",
        "Read a file and return its contents as UTF-8 text. The path is \
         resolved against the working directory; paths outside it are allowed \
         for reading context files.",
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path of the file to read, relative to the working directory"
                }
            },
            "required": ["file_path"]
        }),
    )
}

fn write_file_tool() -> ToolDefinition {
    ToolDefinition::function(
        "write_file",
        "Write content to a file, creating parent directories as needed and \
         overwriting any existing content. The path must stay inside the \
         working directory.",
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path of the file to write, relative to the working directory"
                },
                "content": {
                    "type": "string",
                    "description": "The full new file content"
                }
            },
            "required": ["file_path", "content"]
        }),
    )
}

fn edit_file_tool() -> ToolDefinition {
    ToolDefinition::function(
        "edit_file",
        "Replace one literal occurrence of old_string with new_string in a \
         file. Fails without modifying the file if old_string is not found. \
         The path must stay inside the working directory.",
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path of the file to edit, relative to the working directory"
                },
                "old_string": {
                    "type": "string",
                    "description": "Exact text to find (not a regex)"
                },
                "new_string": {
                    "type": "string",
                    "description": "Text to replace it with"
                }
            },
            "required": ["file_path", "old_string", "new_string"]
        }),
    )
}

fn glob_search_tool() -> ToolDefinition {
    ToolDefinition::function(
        "glob_search",
        "Find files matching a glob pattern (e.g. '**/*.rs', 'src/*.ts'). \
         Returns matching paths relative to the search root, one per line.",
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern with *, ** and ? wildcards"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search in, relative to the working directory (defaults to the working directory)"
                }
            },
            "required": ["pattern"]
        }),
    )
}

fn grep_search_tool() -> ToolDefinition {
    ToolDefinition::function(
        "grep_search",
        "Search text files for lines containing a string, case-insensitively. \
         Returns 'path:line: text' matches, one per line.",
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Text to search for (matched as a substring, not a regex)"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search in, relative to the working directory (defaults to the working directory)"
                }
            },
            "required": ["pattern"]
        }),
    )
}

fn execute_command_tool() -> ToolDefinition {
    ToolDefinition::function(
        "execute_command",
        "Execute a shell command in the working directory. Commands run with \
         a timeout and a minimal environment; destructive commands and paths \
         outside the working directory are blocked.",
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The command line to execute"
                }
            },
            "required": ["command"]
        }),
    )
}
