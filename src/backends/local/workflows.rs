// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Built-in in-process workflows.
//!
//! These are small utilities for demos, smoke tests and DAG plumbing. Real
//! business logic is registered by the embedding application.

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::dag::Params;
use crate::traits::Workflow;

/// Returns its params unchanged.
pub struct EchoWorkflow;

#[async_trait]
impl Workflow for EchoWorkflow {
    async fn run(&self, params: Params) -> anyhow::Result<Params> {
        Ok(params)
    }

    fn name(&self) -> &str {
        "echo"
    }
}

/// Sleeps for `ms` milliseconds (default 0) and reports how long it slept.
pub struct SleepWorkflow;

#[async_trait]
impl Workflow for SleepWorkflow {
    async fn run(&self, params: Params) -> anyhow::Result<Params> {
        let ms = match params.get("ms") {
            None => 0,
            Some(value) => value
                .as_u64()
                .with_context(|| format!("'ms' must be a non-negative integer, got {value}"))?,
        };
        tokio::time::sleep(Duration::from_millis(ms)).await;

        let mut output = Params::new();
        output.insert("slept_ms".to_string(), ms.into());
        Ok(output)
    }

    fn name(&self) -> &str {
        "sleep"
    }
}

/// Always fails with `message` (default "requested failure").
pub struct FailWorkflow;

#[async_trait]
impl Workflow for FailWorkflow {
    async fn run(&self, params: Params) -> anyhow::Result<Params> {
        let message = params
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("requested failure");
        anyhow::bail!("{message}")
    }

    fn name(&self) -> &str {
        "fail"
    }
}

/// Counts words in every string param and reports the total and per-key counts.
pub struct WordCountWorkflow;

#[async_trait]
impl Workflow for WordCountWorkflow {
    async fn run(&self, params: Params) -> anyhow::Result<Params> {
        let mut output = Params::new();
        let mut total = 0usize;
        for (key, value) in &params {
            if let Some(text) = value.as_str() {
                let words = text.split_whitespace().count();
                total += words;
                output.insert(format!("{key}_words"), words.into());
            }
        }
        output.insert("total_words".to_string(), total.into());
        Ok(output)
    }

    fn name(&self) -> &str {
        "word_count"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn test_echo_returns_params() {
        let input = params(json!({"a": 1, "b": "two"}));
        assert_eq!(EchoWorkflow.run(input.clone()).await.unwrap(), input);
    }

    #[tokio::test]
    async fn test_sleep_rejects_bad_duration() {
        let err = SleepWorkflow.run(params(json!({"ms": "soon"}))).await.unwrap_err();
        assert!(err.to_string().contains("'ms' must be a non-negative integer"));

        let out = SleepWorkflow.run(params(json!({"ms": 1}))).await.unwrap();
        assert_eq!(out["slept_ms"], json!(1));
    }

    #[tokio::test]
    async fn test_fail_uses_message() {
        let err = FailWorkflow.run(params(json!({"message": "quota"}))).await.unwrap_err();
        assert_eq!(err.to_string(), "quota");
    }

    #[tokio::test]
    async fn test_word_count_per_string_param() {
        let out = WordCountWorkflow
            .run(params(json!({"title": "hello big world", "body": "one two", "n": 5})))
            .await
            .unwrap();
        assert_eq!(out["title_words"], json!(3));
        assert_eq!(out["body_words"], json!(2));
        assert_eq!(out["total_words"], json!(5));
        assert!(out.get("n_words").is_none());
    }
}
