//! Mock warehouse implementation for testing.
//!
//! Records every session event so tests can assert on the statements issued
//! and on session lifecycle, and can be configured to fail at each step.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::{ConnectionConfig, Warehouse, WarehouseError, WarehouseSession};

/// Something that happened on a mock session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected,
    Executed(String),
    Closed,
}

#[derive(Debug, Default)]
struct MockState {
    events: Vec<SessionEvent>,
    configs: Vec<ConnectionConfig>,
    fail_connect: bool,
    fail_statement: Option<String>,
    fail_close: bool,
}

/// Mock warehouse that can be configured to fail for testing error handling.
#[derive(Debug, Default, Clone)]
pub struct MockWarehouse {
    state: Arc<Mutex<MockState>>,
}

impl MockWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure whether opening a session should fail.
    pub fn set_fail_connect(&self, fail: bool) {
        self.state.lock().unwrap().fail_connect = fail;
    }

    /// Fail any statement whose text contains `fragment`.
    pub fn fail_statements_containing(&self, fragment: &str) {
        self.state.lock().unwrap().fail_statement = Some(fragment.to_string());
    }

    /// Configure whether closing a session should fail.
    pub fn set_fail_close(&self, fail: bool) {
        self.state.lock().unwrap().fail_close = fail;
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.state.lock().unwrap().events.clone()
    }

    /// Statements executed, in order, across all sessions.
    pub fn statements(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Executed(sql) => Some(sql),
                _ => None,
            })
            .collect()
    }

    pub fn connect_count(&self) -> usize {
        self.count(&SessionEvent::Connected)
    }

    pub fn close_count(&self) -> usize {
        self.count(&SessionEvent::Closed)
    }

    /// Descriptors handed to `connect`, in order.
    pub fn configs(&self) -> Vec<ConnectionConfig> {
        self.state.lock().unwrap().configs.clone()
    }

    fn count(&self, wanted: &SessionEvent) -> usize {
        self.state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| *e == wanted)
            .count()
    }
}

#[async_trait]
impl Warehouse for MockWarehouse {
    async fn connect(
        &self,
        config: ConnectionConfig,
    ) -> Result<Box<dyn WarehouseSession>, WarehouseError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_connect {
            return Err(WarehouseError::Session("mock connect failure".into()));
        }
        state.configs.push(config);
        state.events.push(SessionEvent::Connected);
        Ok(Box::new(MockSession {
            state: self.state.clone(),
        }))
    }
}

struct MockSession {
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl WarehouseSession for MockSession {
    async fn execute(&mut self, sql: &str) -> Result<(), WarehouseError> {
        let mut state = self.state.lock().unwrap();
        state.events.push(SessionEvent::Executed(sql.to_string()));
        match &state.fail_statement {
            Some(fragment) if sql.contains(fragment.as_str()) => Err(WarehouseError::Statement(
                format!("mock failure on statement containing '{}'", fragment),
            )),
            _ => Ok(()),
        }
    }

    async fn close(&mut self) -> Result<(), WarehouseError> {
        let mut state = self.state.lock().unwrap();
        state.events.push(SessionEvent::Closed);
        if state.fail_close {
            return Err(WarehouseError::Session("mock close failure".into()));
        }
        Ok(())
    }
}
