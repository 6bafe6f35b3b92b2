//! Host-supplied invocation context.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::ids::InvocationId;

/// Where the host writes this invocation's logs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogLocators {
    /// Log group name.
    pub group: Option<String>,
    /// Log stream name.
    pub stream: Option<String>,
}

/// Read-only facts about the current invocation.
#[derive(Clone, Debug)]
pub struct InvocationContext {
    invocation_id: InvocationId,
    function_name: String,
    deadline: Instant,
    log_locators: LogLocators,
}

impl InvocationContext {
    /// Create a context whose time budget starts now.
    pub fn new(
        invocation_id: InvocationId,
        function_name: impl Into<String>,
        time_budget: Duration,
        log_locators: LogLocators,
    ) -> Self {
        Self {
            invocation_id,
            function_name: function_name.into(),
            deadline: Instant::now() + time_budget,
            log_locators,
        }
    }

    /// This invocation's id.
    pub fn invocation_id(&self) -> &InvocationId {
        &self.invocation_id
    }

    /// Name of the deployed function.
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Time left before the host aborts the invocation.
    pub fn remaining_time(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Log group and stream.
    pub fn log_locators(&self) -> &LogLocators {
        &self.log_locators
    }
}
