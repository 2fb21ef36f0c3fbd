//! Powerflow power management
//!
//! Out-of-band power control (on, off, cycle, status) through an external
//! power CLI. The CLI speaks the BMC protocols; this crate prepares its
//! arguments, runs it, and checks the state it reports.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            PowerWorkflow                 │
//! │   on | off | cycle | status              │
//! │   retry policy, state verification       │
//! └─────────────────────────────────────────┘
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │            power_activity                │
//! │   filter options -> format flags         │
//! └─────────────────────────────────────────┘
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │     PowerExecutor (PowerCli)             │
//! │   maas.power <op> <driver> --flag=...    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use powerflow_power::{Operation, PowerParam, PowerWorkflow};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> powerflow_power::Result<()> {
//! let workflow: PowerWorkflow = PowerWorkflow::default();
//! let request = PowerParam::new("4y3h7n", Operation::On, "ipmi")
//!     .with_opt("power_address", "10.0.0.5")
//!     .with_opt("power_user", "admin")
//!     .with_opt("power_pass", "secret");
//!
//! let result = workflow.execute(&CancellationToken::new(), request).await?;
//! assert_eq!(result.state, "on");
//! # Ok(())
//! # }
//! ```

pub mod activity;
pub mod context;
pub mod error;
pub mod executor;
pub mod options;
pub mod retry;
pub mod types;
pub mod workflow;

pub use activity::power_activity;
pub use context::{ActivityContext, POWER_ACTIVITY_TIMEOUT};
pub use error::{
    CommandFailureInfo, ExecutionError, PowerError, PowerErrorKind, ResolutionError, Result,
};
pub use executor::{PowerCli, PowerExecutor, DEFAULT_POWER_CLI};
pub use options::{format_options, IGNORED_MAC_DRIVER_TYPES, IGNORED_POWER_OPTIONS};
pub use retry::RetryPolicy;
pub use types::{DriverOptions, Operation, PowerActivityParam, PowerParam, PowerResult};
pub use workflow::PowerWorkflow;
