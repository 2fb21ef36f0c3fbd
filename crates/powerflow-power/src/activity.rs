//! The power activity: one attempt at running the power CLI

use tracing::debug;

use crate::context::ActivityContext;
use crate::error::Result;
use crate::executor::PowerExecutor;
use crate::options::format_options;
use crate::types::{PowerActivityParam, PowerResult};

/// Execute a power operation through the given executor
///
/// Sanitizes the driver options, runs the CLI and wraps its output. The
/// reported state is not checked here.
pub async fn power_activity<E>(
    executor: &E,
    ctx: &ActivityContext,
    params: &PowerActivityParam,
) -> Result<PowerResult>
where
    E: PowerExecutor + ?Sized,
{
    let driver = params.param.driver.as_str();
    let flags = format_options(driver, &params.param.driver_opts);

    debug!(
        system_id = %params.param.system_id,
        operation = %params.operation,
        driver = %driver,
        options = params.param.driver_opts.len(),
        flags = flags.len(),
        "prepared power CLI arguments"
    );

    let state = executor
        .execute(ctx, params.operation, driver, &flags)
        .await?;

    Ok(PowerResult::from_output(&state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Operation, PowerParam};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records the arguments it was called with
    struct RecordingExecutor {
        reply: String,
        calls: Mutex<Vec<(Operation, String, Vec<String>)>>,
    }

    impl RecordingExecutor {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PowerExecutor for RecordingExecutor {
        async fn execute(
            &self,
            _ctx: &ActivityContext,
            operation: Operation,
            driver: &str,
            flags: &[String],
        ) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((operation, driver.to_string(), flags.to_vec()));
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn test_activity_passes_sanitized_flags() {
        let executor = RecordingExecutor::new("on\n");
        let param = PowerParam::new("abc123", Operation::On, "virsh")
            .with_opt("power_address", "qemu+ssh://10.0.0.1/system")
            .with_opt("power_id", "vm-7")
            .with_opt("mac_address", "00:11:22:33:44:55")
            .with_opt("system_id", "abc123");

        let result = power_activity(
            &executor,
            &ActivityContext::new(),
            &PowerActivityParam::new(Operation::Cycle, param),
        )
        .await
        .unwrap();

        assert_eq!(result.state, "on");

        let calls = executor.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (operation, driver, flags) = &calls[0];
        assert_eq!(*operation, Operation::Cycle);
        assert_eq!(driver, "virsh");
        assert_eq!(flags, &vec!["--power-address=qemu+ssh://10.0.0.1/system".to_string()]);
    }

    #[tokio::test]
    async fn test_activity_does_not_check_state() {
        let executor = RecordingExecutor::new("  error  ");
        let param = PowerParam::new("abc123", Operation::On, "ipmi");

        let result = power_activity(
            &executor,
            &ActivityContext::new(),
            &PowerActivityParam::new(Operation::On, param),
        )
        .await
        .unwrap();

        assert_eq!(result.state, "error");
    }
}
