// Workspace tools for reading files and directories

use crate::tools::{ToolDefinition, ToolHandler, ToolResult};
use agentkit_core::{Arguments, ParamType, ParameterSchema};
use anyhow::{anyhow, bail, Context, Result};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

const MAX_OUTPUT_BYTES: usize = 100_000;

/// Reads files below a base directory
pub struct ReadFileTool {
    base_path: PathBuf,
}

impl ReadFileTool {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn definition(self) -> ToolDefinition {
        ToolDefinition::from_handler(
            "read_file",
            "Read a file or list a directory in the workspace. Cannot read secret files (.env, credentials, private keys, etc.)",
            ParameterSchema::new()
                .required("path", ParamType::String, "Path relative to the workspace root")
                .optional("max_lines", ParamType::Integer, "Only return the first N lines"),
            Arc::new(self),
        )
    }

    /// Check if a workspace-relative path is safe to read (not a secret file).
    /// Only the relative part is matched, so the workspace location never counts.
    fn is_safe_path(&self, relative: &Path) -> bool {
        let path_str = relative.to_string_lossy().to_lowercase();

        let deny_patterns = [
            ".env",
            "credentials",
            "secrets",
            "id_rsa",
            "id_ed25519",
            ".pem",
            ".key",
            "password",
            "token",
            "api_key",
            ".git/config",
        ];

        if deny_patterns.iter().any(|pattern| path_str.contains(pattern)) {
            return false;
        }

        // Must be within base_path, symlinks included
        let path = self.base_path.join(relative);
        if let (Ok(canonical), Ok(base)) = (path.canonicalize(), self.base_path.canonicalize()) {
            return canonical.starts_with(base);
        }

        true
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let relative = Path::new(relative);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            bail!("path must stay inside the workspace: {}", relative.display());
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait::async_trait]
impl ToolHandler for ReadFileTool {
    async fn call(&self, arguments: Arguments) -> Result<ToolResult> {
        let requested = arguments
            .str("path")
            .ok_or_else(|| anyhow!("missing 'path'"))?;
        let path = self.resolve(requested)?;

        if !self.is_safe_path(Path::new(requested)) {
            bail!(
                "access denied: {} appears to be a secret file or outside the workspace",
                requested
            );
        }

        let metadata = tokio::fs::metadata(&path)
            .await
            .with_context(|| format!("file not found: {}", requested))?;

        if metadata.is_dir() {
            let mut entries = Vec::new();
            let mut dir = tokio::fs::read_dir(&path)
                .await
                .with_context(|| format!("failed to read directory: {}", requested))?;
            while let Some(entry) = dir.next_entry().await? {
                let name = entry.file_name().to_string_lossy().to_string();
                let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
                entries.push(format!("{}{}", name, if is_dir { "/" } else { "" }));
            }
            entries.sort();
            return Ok(ToolResult::text(format!(
                "Directory: {}\n\nContents ({} items):\n{}",
                requested,
                entries.len(),
                entries.join("\n")
            )));
        }

        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read file: {}", requested))?;

        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(e) => {
                return Ok(ToolResult::text(format!(
                    "File: {} (binary, {} bytes)\n\nBinary files cannot be displayed as text.",
                    requested,
                    e.as_bytes().len()
                )))
            }
        };

        let line_count = content.lines().count();
        let mut body = match arguments.i64("max_lines") {
            Some(limit) if limit >= 0 => content
                .lines()
                .take(limit as usize)
                .collect::<Vec<_>>()
                .join("\n"),
            _ => content,
        };

        if body.len() > MAX_OUTPUT_BYTES {
            let mut cut = MAX_OUTPUT_BYTES;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
            body.push_str("\n\n... (truncated, content too large)");
        }

        Ok(ToolResult::text(format!(
            "File: {} ({} lines)\n\n{}",
            requested, line_count, body
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentkit_core::AgentError;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_safe_paths() {
        let temp_dir = TempDir::new().unwrap();
        let tool = ReadFileTool::new(temp_dir.path().to_path_buf());

        assert!(tool.is_safe_path(Path::new("README.md")));
        assert!(tool.is_safe_path(Path::new("src/main.rs")));

        assert!(!tool.is_safe_path(Path::new(".env")));
        assert!(!tool.is_safe_path(Path::new("credentials.json")));
        assert!(!tool.is_safe_path(Path::new("secret.key")));
        assert!(!tool.is_safe_path(Path::new(".git/config")));
    }

    #[tokio::test]
    async fn test_workspace_name_does_not_trigger_deny_list() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("api_key_rotator-tokens-repo");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(root.join("README.md"), "rotates keys").unwrap();
        std::fs::write(root.join("secrets.toml"), "key = 1").unwrap();

        let tool = ReadFileTool::new(root).definition();
        let result = tool.invoke(&json!({"path": "README.md"})).await.unwrap();
        assert!(result.first_text().unwrap().ends_with("rotates keys"));

        let err = tool.invoke(&json!({"path": "secrets.toml"})).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolExecution { .. }));
    }

    #[tokio::test]
    async fn test_read_file() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "one\ntwo\nthree").unwrap();

        let tool = ReadFileTool::new(temp_dir.path().to_path_buf()).definition();
        let result = tool.invoke(&json!({"path": "notes.txt"})).await.unwrap();
        let text = result.first_text().unwrap();
        assert!(text.starts_with("File: notes.txt (3 lines)"));
        assert!(text.ends_with("one\ntwo\nthree"));

        let result = tool
            .invoke(&json!({"path": "notes.txt", "max_lines": 1}))
            .await
            .unwrap();
        assert!(result.first_text().unwrap().ends_with("\n\none"));
    }

    #[tokio::test]
    async fn test_list_directory() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("subdir")).unwrap();
        std::fs::write(temp_dir.path().join("file.txt"), "test").unwrap();

        let tool = ReadFileTool::new(temp_dir.path().to_path_buf()).definition();
        let result = tool.invoke(&json!({"path": "."})).await.unwrap();
        let text = result.first_text().unwrap();
        assert!(text.contains("Contents (2 items)"));
        assert!(text.contains("file.txt\nsubdir/"));
    }

    #[tokio::test]
    async fn test_escape_and_secrets_are_execution_errors() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(".env"), "KEY=1").unwrap();
        let tool = ReadFileTool::new(temp_dir.path().to_path_buf()).definition();

        for path in ["../etc/passwd", ".env", "missing.txt"] {
            let err = tool.invoke(&json!({"path": path})).await.unwrap_err();
            assert!(matches!(err, AgentError::ToolExecution { .. }), "{}", path);
        }
    }
}
