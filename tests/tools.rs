//! End-to-end tool dispatch, driven the way the conversation loop drives it:
//! tool names plus arguments parsed from raw JSON strings.

use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::TempDir;

use glint::tools::{ToolExecutor, ToolResult};

fn args(json: &str) -> Value {
    serde_json::from_str(json).unwrap()
}

/// A realistic agent sequence: write a file, edit it, read it back, then
/// find it with glob and grep.
#[tokio::test]
async fn write_edit_read_search_sequence() {
    let dir = TempDir::new().unwrap();
    let executor = ToolExecutor::new(dir.path().to_path_buf());

    let result = executor
        .execute(
            "write_file",
            &args(r#"{"file_path":"src/a.ts","content":"export const x = 1;\n"}"#),
        )
        .await;
    assert!(!result.is_error(), "{result:?}");

    let result = executor
        .execute(
            "edit_file",
            &args(r#"{"file_path":"src/a.ts","old_string":"x = 1","new_string":"x = 2"}"#),
        )
        .await;
    assert!(!result.is_error(), "{result:?}");

    let result = executor
        .execute("read_file", &args(r#"{"file_path":"src/a.ts"}"#))
        .await;
    assert_eq!(
        result,
        ToolResult::Success("export const x = 2;\n".to_string())
    );

    let result = executor
        .execute("glob_search", &args(r#"{"pattern":"**/*.ts"}"#))
        .await;
    assert_eq!(result, ToolResult::Success("src/a.ts".to_string()));

    let result = executor
        .execute("grep_search", &args(r#"{"pattern":"const X"}"#))
        .await;
    assert_eq!(
        result,
        ToolResult::Success("src/a.ts:1: export const x = 2;".to_string())
    );
}

/// Sandbox violations surface as error results with the violation text; the
/// executor itself never fails.
#[tokio::test]
async fn violations_become_error_results() {
    let dir = TempDir::new().unwrap();
    let executor = ToolExecutor::new(dir.path().to_path_buf());

    let result = executor
        .execute("execute_command", &args(r#"{"command":"rm -rf /"}"#))
        .await;
    assert!(result.is_error());
    assert!(result.text().contains("dangerous pattern"));

    let result = executor
        .execute(
            "execute_command",
            &args(r#"{"command":"cat ../../etc/passwd"}"#),
        )
        .await;
    assert!(result.is_error());
    assert!(result.text().contains("path traversal"));

    let result = executor
        .execute(
            "write_file",
            &args(r#"{"file_path":"/etc/glint.conf","content":"x"}"#),
        )
        .await;
    assert!(result.is_error());
}

/// A piped command passes only when every stage does.
#[cfg(unix)]
#[tokio::test]
async fn piped_commands_run_fully_sanitized() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("words.txt"), "alpha\nbeta\ngamma\n").unwrap();
    let executor = ToolExecutor::new(dir.path().to_path_buf());

    let result = executor
        .execute(
            "execute_command",
            &args(r#"{"command":"cat words.txt | wc -l"}"#),
        )
        .await;
    assert!(!result.is_error(), "{result:?}");
    assert_eq!(result.text().trim(), "3");

    let result = executor
        .execute(
            "execute_command",
            &args(r#"{"command":"cat words.txt | sudo tee /etc/words"}"#),
        )
        .await;
    assert!(result.is_error());
    assert!(result.text().contains("blocked"));
}

/// Missing and malformed arguments degrade to error results.
#[tokio::test]
async fn malformed_arguments_are_reported() {
    let dir = TempDir::new().unwrap();
    let executor = ToolExecutor::new(dir.path().to_path_buf());

    let result = executor.execute("edit_file", &args("{}")).await;
    assert!(result.is_error());

    let result = executor
        .execute("read_file", &args(r#"{"file_path":42}"#))
        .await;
    assert!(result.is_error());

    let result = executor.execute("list_directory", &args("{}")).await;
    assert_eq!(
        result,
        ToolResult::Error("Unknown tool: list_directory".to_string())
    );
}
