//! Wire-string enums for the experiment service. Variant renames match the
//! exact strings the remote API serializes, including the mixed-case ones.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExperimentState {
    #[serde(rename = "inactive")]
    #[default]
    Inactive,
    #[serde(rename = "preview")]
    Preview,
    #[serde(rename = "scheduled")]
    Scheduled,
    #[serde(rename = "enrolling")]
    Enrolling,
    #[serde(rename = "enrollmentComplete")]
    EnrollmentComplete,
    #[serde(rename = "cancelled")]
    Cancelled,
    #[serde(rename = "archived")]
    Archived,
    #[serde(rename = "draft")]
    Draft,
}

impl ExperimentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Preview => "preview",
            Self::Scheduled => "scheduled",
            Self::Enrolling => "enrolling",
            Self::EnrollmentComplete => "enrollmentComplete",
            Self::Cancelled => "cancelled",
            Self::Archived => "archived",
            Self::Draft => "draft",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "inactive" => Some(Self::Inactive),
            "preview" => Some(Self::Preview),
            "scheduled" => Some(Self::Scheduled),
            "enrolling" => Some(Self::Enrolling),
            "enrollmentComplete" => Some(Self::EnrollmentComplete),
            "cancelled" => Some(Self::Cancelled),
            "archived" => Some(Self::Archived),
            "draft" => Some(Self::Draft),
            _ => None,
        }
    }
}

impl fmt::Display for ExperimentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConsistencyRule {
    #[default]
    Individual,
    Experiment,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AssignmentUnit {
    #[serde(rename = "individual")]
    #[default]
    Individual,
    #[serde(rename = "group")]
    Group,
    #[serde(rename = "within-subjects")]
    WithinSubjects,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostExperimentRule {
    #[default]
    Continue,
    Revert,
    Assign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AssignmentAlgorithm {
    #[serde(rename = "random")]
    #[default]
    Random,
    #[serde(rename = "stratified random sampling")]
    StratifiedRandomSampling,
    #[serde(rename = "ts_configurable")]
    TsConfigurable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExperimentType {
    #[serde(rename = "Simple")]
    #[default]
    Simple,
    #[serde(rename = "Factorial")]
    Factorial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FilterMode {
    #[serde(rename = "includeAll")]
    IncludeAll,
    #[serde(rename = "excludeAll")]
    #[default]
    ExcludeAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SegmentType {
    Public,
    #[default]
    Private,
    GlobalExclude,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkedDecisionPointStatus {
    #[serde(rename = "condition applied")]
    ConditionApplied,
    #[serde(rename = "condition not applied")]
    ConditionFailedToApply,
    #[serde(rename = "no condition assigned")]
    NoConditionAssigned,
}
