use crate::domain::identifier::Identifier;
use crate::domain::literal::{LiteralMap, ParameterMap};
use crate::domain::notification::NotificationSetting;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cron schedule attached to a launch plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Cron expression
    pub cron_expression: String,
    /// Name of the datetime input that receives the scheduled kickoff time
    #[serde(default)]
    pub kickoff_time_input_arg: String,
}

/// Operational metadata of a launch plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchPlanMetadata {
    /// Schedule, for scheduled launch plans
    #[serde(default)]
    pub schedule: Option<Schedule>,
    /// Notifications inherited by executions
    #[serde(default)]
    pub notifications: Vec<NotificationSetting>,
}

/// Registered launch plan body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaunchPlanSpec {
    /// Workflow the launch plan runs
    pub workflow_id: Identifier,
    /// Schedule and notifications
    #[serde(default)]
    pub entity_metadata: LaunchPlanMetadata,
    /// Inputs callers may set
    #[serde(default)]
    pub default_inputs: ParameterMap,
    /// Inputs callers may not override
    #[serde(default)]
    pub fixed_inputs: LiteralMap,
    /// Labels inherited by executions
    #[serde(default)]
    pub labels: Option<HashMap<String, String>>,
    /// Annotations inherited by executions
    #[serde(default)]
    pub annotations: Option<HashMap<String, String>>,
}

/// Values computed at registration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaunchPlanClosure {
    /// Inputs an execution of this launch plan accepts
    #[serde(default)]
    pub expected_inputs: ParameterMap,
}

/// A registered, versioned way to launch a workflow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaunchPlan {
    /// Storage-assigned id
    pub internal_id: u64,
    /// Registered identity
    pub id: Identifier,
    /// Registered body
    pub spec: LaunchPlanSpec,
    /// Registration-time values
    #[serde(default)]
    pub closure: LaunchPlanClosure,
}

impl LaunchPlan {
    /// Input that receives the scheduled kickoff time, if any
    pub fn kickoff_time_input_arg(&self) -> Option<&str> {
        self.spec
            .entity_metadata
            .schedule
            .as_ref()
            .map(|schedule| schedule.kickoff_time_input_arg.as_str())
            .filter(|arg| !arg.is_empty())
    }
}
