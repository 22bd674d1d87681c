//! Typed reads of node inputs from the shared context
//!
//! `Context::get` yields `None` both for absent keys and for values of the
//! wrong shape. Nodes need to tell those apart so a mistyped widget value is
//! reported instead of silently replaced by a default.

use graph_flow::Context;
use node_engine::{ContextKeys, NodeEngineError};
use serde::de::DeserializeOwned;

/// Read an optional input; `null` counts as absent
pub async fn read_input<T: DeserializeOwned>(
    context: &Context,
    task_id: &str,
    port: &str,
) -> node_engine::Result<Option<T>> {
    let key = ContextKeys::input(task_id, port);
    match context.get::<serde_json::Value>(&key).await {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| NodeEngineError::invalid(port, e.to_string())),
    }
}

/// Read a required input
pub async fn require_input<T: DeserializeOwned>(
    context: &Context,
    task_id: &str,
    port: &str,
) -> node_engine::Result<T> {
    read_input(context, task_id, port)
        .await?
        .ok_or_else(|| NodeEngineError::MissingInput(port.to_string()))
}

/// Read an integer widget value, accepting floats and numeric strings
pub async fn read_int(
    context: &Context,
    task_id: &str,
    port: &str,
) -> node_engine::Result<Option<i64>> {
    let value: Option<serde_json::Value> = read_input(context, task_id, port).await?;
    value.map(|v| coerce_int(port, &v)).transpose()
}

/// Read a float widget value, accepting integers and numeric strings
pub async fn read_float(
    context: &Context,
    task_id: &str,
    port: &str,
) -> node_engine::Result<Option<f64>> {
    let value: Option<serde_json::Value> = read_input(context, task_id, port).await?;
    value.map(|v| coerce_float(port, &v)).transpose()
}

fn coerce_int(port: &str, value: &serde_json::Value) -> node_engine::Result<i64> {
    if let Some(i) = value.as_i64() {
        return Ok(i);
    }
    if let Some(f) = value.as_f64().filter(|f| f.is_finite()) {
        return Ok(f.trunc() as i64);
    }
    value
        .as_str()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .ok_or_else(|| NodeEngineError::invalid(port, format!("expected an integer, got {}", value)))
}

fn coerce_float(port: &str, value: &serde_json::Value) -> node_engine::Result<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
        .ok_or_else(|| NodeEngineError::invalid(port, format!("expected a number, got {}", value)))
}

/// Publish display content on the node's stream key
pub async fn publish_text(context: &Context, task_id: &str, port: &str, content: serde_json::Value) {
    let stream_key = ContextKeys::stream(task_id, port);
    context
        .set(
            &stream_key,
            serde_json::json!({
                "type": "text",
                "content": content
            }),
        )
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_input_absent_and_null() {
        let context = Context::new();
        context
            .set(&ContextKeys::input("n1", "nothing"), serde_json::Value::Null)
            .await;

        let absent: Option<String> = read_input(&context, "n1", "missing").await.unwrap();
        let null: Option<String> = read_input(&context, "n1", "nothing").await.unwrap();
        assert!(absent.is_none());
        assert!(null.is_none());
    }

    #[tokio::test]
    async fn test_read_input_wrong_type() {
        let context = Context::new();
        context.set(&ContextKeys::input("n1", "flag"), "yes".to_string()).await;

        let err = read_input::<bool>(&context, "n1", "flag").await.unwrap_err();
        assert!(err.to_string().starts_with("Invalid input 'flag'"));
    }

    #[tokio::test]
    async fn test_require_input() {
        let context = Context::new();
        let err = require_input::<String>(&context, "n1", "message").await.unwrap_err();
        assert_eq!(err.to_string(), "Missing required input: message");
    }

    #[tokio::test]
    async fn test_numeric_coercion() {
        let context = Context::new();
        context.set(&ContextKeys::input("n1", "a"), 42.9).await;
        context.set(&ContextKeys::input("n1", "b"), "17".to_string()).await;
        context.set(&ContextKeys::input("n1", "c"), "abc".to_string()).await;
        context.set(&ContextKeys::input("n1", "d"), 3i64).await;

        assert_eq!(read_int(&context, "n1", "a").await.unwrap(), Some(42));
        assert_eq!(read_int(&context, "n1", "b").await.unwrap(), Some(17));
        assert!(read_int(&context, "n1", "c").await.is_err());
        assert_eq!(read_float(&context, "n1", "d").await.unwrap(), Some(3.0));
        assert_eq!(read_float(&context, "n1", "missing").await.unwrap(), None);
    }
}
