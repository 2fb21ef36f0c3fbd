//! Request and result types for power operations

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PowerError;

/// Driver options as supplied by the caller (free-form JSON values)
pub type DriverOptions = HashMap<String, serde_json::Value>;

/// Power operation requested of a host
///
/// The operation doubles as the power CLI verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Power the host on
    On,
    /// Power the host off
    Off,
    /// Power cycle the host (off then on)
    Cycle,
    /// Query the current power state
    Status,
}

impl Operation {
    /// All operations, in CLI verb order
    pub const ALL: [Operation; 4] = [
        Operation::On,
        Operation::Off,
        Operation::Cycle,
        Operation::Status,
    ];

    /// CLI verb for this operation
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::On => "on",
            Operation::Off => "off",
            Operation::Cycle => "cycle",
            Operation::Status => "status",
        }
    }

    /// State the host must report once the operation completes
    ///
    /// A cycle has to leave the host powered on. Status queries have no
    /// expectation.
    pub fn expected_state(&self) -> Option<&'static str> {
        match self {
            Operation::On | Operation::Cycle => Some("on"),
            Operation::Off => Some("off"),
            Operation::Status => None,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = PowerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" => Ok(Operation::On),
            "off" => Ok(Operation::Off),
            "cycle" => Ok(Operation::Cycle),
            "status" => Ok(Operation::Status),
            other => Err(PowerError::InvalidRequest(format!(
                "unknown power action: {:?}",
                other
            ))),
        }
    }
}

/// Power management request for a single host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerParam {
    /// Opaque identifier of the target system
    pub system_id: String,

    /// Requested action
    pub action: Operation,

    /// Task queue the request was routed through
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,

    /// Driver-specific options, passed to the power CLI as flags
    #[serde(rename = "params", default)]
    pub driver_opts: DriverOptions,

    /// BMC driver type (ipmi, redfish, virsh, lxd, ...)
    #[serde(rename = "power_type")]
    pub driver: String,
}

impl PowerParam {
    /// Create a new request with no driver options
    pub fn new(system_id: impl Into<String>, action: Operation, driver: impl Into<String>) -> Self {
        Self {
            system_id: system_id.into(),
            action,
            queue: None,
            driver_opts: HashMap::new(),
            driver: driver.into(),
        }
    }

    /// Add a single driver option
    pub fn with_opt(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.driver_opts.insert(key.into(), value.into());
        self
    }

    /// Replace all driver options
    pub fn with_driver_opts(mut self, opts: DriverOptions) -> Self {
        self.driver_opts = opts;
        self
    }

    /// Set the originating task queue
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    /// Parse a request from its JSON form
    pub fn from_json(json: &str) -> Result<Self, PowerError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Parameters of a single power activity execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerActivityParam {
    /// CLI verb to run
    pub operation: Operation,

    #[serde(flatten)]
    pub param: PowerParam,
}

impl PowerActivityParam {
    pub fn new(operation: Operation, param: PowerParam) -> Self {
        Self { operation, param }
    }
}

/// Outcome of a power operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerResult {
    /// Power state as reported by the power CLI
    pub state: String,
}

impl PowerResult {
    /// Build a result from raw CLI output, trimming surrounding whitespace
    pub fn from_output(output: &str) -> Self {
        Self {
            state: output.trim().to_string(),
        }
    }
}
