#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use oxide_schema::{DriverError, Executor, QueryResult, Row};
use serde_json::Value;

/// Canned response for statements containing `pattern`.
struct Reply {
    pattern: String,
    result: Result<Vec<Row>, DriverError>,
}

/// Executor that answers from canned replies and records every statement.
///
/// The first reply whose pattern occurs in the SQL wins. Unmatched
/// statements return no rows.
#[derive(Default)]
pub struct MockExecutor {
    replies: Vec<Reply>,
    log: Mutex<Vec<(String, Vec<Value>)>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(mut self, pattern: &str, rows: Vec<Value>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| row.as_object().cloned().expect("row must be an object"))
            .collect();
        self.replies.push(Reply {
            pattern: pattern.to_string(),
            result: Ok(rows),
        });
        self
    }

    pub fn fail(mut self, pattern: &str, error: DriverError) -> Self {
        self.replies.push(Reply {
            pattern: pattern.to_string(),
            result: Err(error),
        });
        self
    }

    pub fn statements(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    pub fn params(&self) -> Vec<Vec<Value>> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .map(|(_, params)| params.clone())
            .collect()
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<QueryResult, DriverError> {
        self.log
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        match self.replies.iter().find(|r| sql.contains(&r.pattern)) {
            Some(reply) => reply.result.clone().map(QueryResult::from_rows),
            None => Ok(QueryResult::default()),
        }
    }
}
