//! Data-warehouse CLI provider.
//!
//! Writes the latest user message to a temporary SQL file, runs it through
//! the `snow` CLI with JSON output, and renders the returned rows as a
//! tab-separated table.

use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::types::Message;

use super::{Provider, ProviderReply, latest_user_text};

/// Answers turns by executing SQL through the warehouse CLI.
#[derive(Debug, Clone, Default)]
pub struct WarehouseCliProvider {
    connection: Option<String>,
}

impl WarehouseCliProvider {
    /// Creates a provider from configuration.
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            connection: config.warehouse_connection.clone(),
        }
    }

    /// Renders CLI stdout: JSON rows become a TSV table, anything else
    /// passes through as-is.
    fn render_output(stdout: &str) -> String {
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            return "(no output)".to_string();
        }
        let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
            return trimmed.to_string();
        };
        let rows = value
            .pointer("/result/data")
            .or_else(|| value.get("data"))
            .unwrap_or(&value);
        match rows.as_array() {
            Some(rows) if rows.iter().all(Value::is_object) && !rows.is_empty() => {
                Self::render_table(rows)
            }
            _ => trimmed.to_string(),
        }
    }

    fn render_table(rows: &[Value]) -> String {
        // Column order comes from the first row; preserve_order keeps the
        // CLI's column ordering intact.
        let columns: Vec<String> = rows[0]
            .as_object()
            .map(|obj| obj.keys().cloned().collect())
            .unwrap_or_default();
        let mut out = columns.join("\t");
        for row in rows {
            out.push('\n');
            let cells: Vec<String> = columns
                .iter()
                .map(|col| match row.get(col) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                })
                .collect();
            out.push_str(&cells.join("\t"));
        }
        out
    }
}

#[async_trait]
impl Provider for WarehouseCliProvider {
    async fn send(
        &self,
        messages: &[Message],
        _model_hint: Option<&str>,
    ) -> Result<ProviderReply> {
        let sql = latest_user_text(messages).unwrap_or("").trim();
        if sql.is_empty() {
            return Ok(ProviderReply::text("(no SQL provided)"));
        }
        let dir = tempfile::tempdir()?;
        let query_path = dir.path().join("query.sql");
        tokio::fs::write(&query_path, sql).await?;

        let mut command = Command::new("snow");
        command.arg("sql").arg("-f").arg(&query_path);
        if let Some(connection) = &self.connection {
            command.arg("-c").arg(connection);
        }
        command.arg("--output").arg("json");
        command.stdin(Stdio::null());
        tracing::debug!(connection = ?self.connection, "running warehouse query");

        let output = command.output().await.map_err(|e| {
            Error::transport(
                "failed to run the warehouse CLI",
                Some("snow sql".to_string()),
                Some(Box::new(e)),
            )
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(Error::transport(
                format!("warehouse query failed: {detail}"),
                Some("snow sql".to_string()),
                None,
            ));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(ProviderReply::text(Self::render_output(&stdout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_render_as_tsv() {
        let stdout = r#"{"data": [{"ID": 1, "NAME": "a"}, {"ID": 2, "NAME": null}]}"#;
        let rendered = WarehouseCliProvider::render_output(stdout);
        assert_eq!(rendered, "ID\tNAME\n1\ta\n2\t");
    }

    #[test]
    fn nested_result_data_is_found() {
        let stdout = r#"{"result": {"data": [{"N": "x"}]}}"#;
        let rendered = WarehouseCliProvider::render_output(stdout);
        assert_eq!(rendered, "N\nx");
    }

    #[test]
    fn non_json_output_passes_through() {
        assert_eq!(
            WarehouseCliProvider::render_output("3 rows affected\n"),
            "3 rows affected"
        );
        assert_eq!(WarehouseCliProvider::render_output("  "), "(no output)");
    }

    #[test]
    fn scalar_json_passes_through() {
        assert_eq!(WarehouseCliProvider::render_output("42"), "42");
        assert_eq!(WarehouseCliProvider::render_output("[]"), "[]");
    }
}
