// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

/// A cron-driven trigger for one DAG and tenant.
///
/// # Example
/// ```yaml
/// id: nightly-report
/// cron: "0 2 * * *"
/// dag_path: nightly.yaml
/// tenant_id: acme
/// enabled: true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: String,
    #[serde(rename = "cron")]
    pub cron_expr: String,
    pub dag_path: String,
    pub tenant_id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ScheduleEntry {
    pub fn new(
        id: impl Into<String>,
        cron_expr: impl Into<String>,
        dag_path: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            cron_expr: cron_expr.into(),
            dag_path: dag_path.into(),
            tenant_id: tenant_id.into(),
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}
