//! Closed registry of mutating and simulation actions the agent may execute.
//! Each variant carries its wire name, required parameters, and whether it
//! is destructive.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    CreateExperiment,
    UpdateExperiment,
    UpdateExperimentStatus,
    DeleteExperiment,
    InitExperimentUser,
    GetDecisionPointAssignments,
    MarkDecisionPoint,
}

pub const ALL_ACTIONS: &[ActionType] = &[
    ActionType::CreateExperiment,
    ActionType::UpdateExperiment,
    ActionType::UpdateExperimentStatus,
    ActionType::DeleteExperiment,
    ActionType::InitExperimentUser,
    ActionType::GetDecisionPointAssignments,
    ActionType::MarkDecisionPoint,
];

impl ActionType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateExperiment => "create_experiment",
            Self::UpdateExperiment => "update_experiment",
            Self::UpdateExperimentStatus => "update_experiment_status",
            Self::DeleteExperiment => "delete_experiment",
            Self::InitExperimentUser => "init_experiment_user",
            Self::GetDecisionPointAssignments => "get_decision_point_assignments",
            Self::MarkDecisionPoint => "mark_decision_point",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ALL_ACTIONS.iter().copied().find(|a| a.name() == name)
    }

    /// Parameters that must be present before the action may execute.
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            Self::CreateExperiment => &["name", "context", "decision_points", "conditions"],
            Self::UpdateExperiment => &["experiment_id"],
            Self::UpdateExperimentStatus => &["experiment_id", "status"],
            Self::DeleteExperiment => &["experiment_id"],
            Self::InitExperimentUser => &["user_id"],
            Self::GetDecisionPointAssignments => &["user_id", "context"],
            Self::MarkDecisionPoint => &["user_id", "decision_point", "assigned_condition"],
        }
    }

    /// Destructive actions carry an irreversibility warning in their
    /// confirmation message. Every pending action passes the gate regardless.
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::DeleteExperiment)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
