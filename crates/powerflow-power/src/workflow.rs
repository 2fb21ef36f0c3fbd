//! Power workflows
//!
//! Each workflow runs the power activity for one operation and, except for
//! status queries, checks that the host ended up in the expected state.
//! Activity failures (CLI missing, CLI failing) are returned unchanged so
//! callers can tell them apart from a BMC reporting the wrong state.

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::activity::power_activity;
use crate::context::ActivityContext;
use crate::error::{PowerError, Result};
use crate::executor::{PowerCli, PowerExecutor};
use crate::retry::RetryPolicy;
use crate::types::{Operation, PowerActivityParam, PowerParam, PowerResult};

/// Runs power workflows against an executor
#[derive(Debug, Clone)]
pub struct PowerWorkflow<E = PowerCli> {
    executor: E,
    retry: RetryPolicy,
}

impl Default for PowerWorkflow<PowerCli> {
    fn default() -> Self {
        Self::new(PowerCli::new())
    }
}

impl<E: PowerExecutor> PowerWorkflow<E> {
    /// Create a workflow runner that makes a single attempt per activity
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            retry: RetryPolicy::default(),
        }
    }

    /// Set the retry policy applied to the power activity
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Power on a host
    pub async fn power_on(&self, cancel: &CancellationToken, params: PowerParam) -> Result<PowerResult> {
        info!(system_id = %params.system_id, "powering on");
        self.run(Operation::On, cancel, params).await
    }

    /// Power off a host
    pub async fn power_off(&self, cancel: &CancellationToken, params: PowerParam) -> Result<PowerResult> {
        info!(system_id = %params.system_id, "powering off");
        self.run(Operation::Off, cancel, params).await
    }

    /// Power cycle a host; it must come back on
    pub async fn power_cycle(
        &self,
        cancel: &CancellationToken,
        params: PowerParam,
    ) -> Result<PowerResult> {
        info!(system_id = %params.system_id, "cycling power");
        self.run(Operation::Cycle, cancel, params).await
    }

    /// Query the power state of a host
    pub async fn power_query(
        &self,
        cancel: &CancellationToken,
        params: PowerParam,
    ) -> Result<PowerResult> {
        info!(system_id = %params.system_id, "querying power status");
        self.run(Operation::Status, cancel, params).await
    }

    /// Run the workflow matching the request's action
    pub async fn execute(&self, cancel: &CancellationToken, params: PowerParam) -> Result<PowerResult> {
        match params.action {
            Operation::On => self.power_on(cancel, params).await,
            Operation::Off => self.power_off(cancel, params).await,
            Operation::Cycle => self.power_cycle(cancel, params).await,
            Operation::Status => self.power_query(cancel, params).await,
        }
    }

    async fn run(
        &self,
        operation: Operation,
        cancel: &CancellationToken,
        params: PowerParam,
    ) -> Result<PowerResult> {
        let system_id = params.system_id.clone();
        let activity = PowerActivityParam::new(operation, params);

        let res = self.exec_power_activity(cancel, &activity).await?;

        if let Some(expected) = operation.expected_state() {
            if res.state != expected {
                error!(
                    system_id = %system_id,
                    operation = %operation,
                    expected,
                    actual = %res.state,
                    "BMC is in wrong power state"
                );
                return Err(PowerError::WrongPowerState {
                    expected,
                    actual: res.state,
                });
            }
        }

        Ok(res)
    }

    /// Run the power activity under the retry policy
    async fn exec_power_activity(
        &self,
        cancel: &CancellationToken,
        params: &PowerActivityParam,
    ) -> Result<PowerResult> {
        debug!(operation = %params.operation, "executing power command");

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let ctx = ActivityContext::new()
                .with_timeout(self.retry.timeout)
                .with_cancellation(cancel.child_token());

            let err = match power_activity(&self.executor, &ctx, params).await {
                Ok(res) => return Ok(res),
                Err(err) => err,
            };

            if cancel.is_cancelled() || !self.retry.should_retry(attempt, &err) {
                return Err(err);
            }

            let backoff = self.retry.backoff_for(attempt);
            warn!(
                system_id = %params.param.system_id,
                operation = %params.operation,
                attempt,
                max_attempts = self.retry.max_attempts,
                backoff_ms = backoff.as_millis() as u64,
                error = %err,
                "power activity failed, will retry"
            );

            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = cancel.cancelled() => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExecutionError, PowerErrorKind, ResolutionError};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    // Mock executor replaying scripted outcomes
    struct MockExecutor {
        replies: Mutex<VecDeque<Result<String>>>,
        calls: AtomicUsize,
        operations: Mutex<Vec<Operation>>,
    }

    impl MockExecutor {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
                operations: Mutex::new(Vec::new()),
            }
        }

        fn reporting(state: &str) -> Self {
            Self::new(vec![Ok(state.to_string())])
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PowerExecutor for MockExecutor {
        async fn execute(
            &self,
            _ctx: &ActivityContext,
            operation: Operation,
            _driver: &str,
            _flags: &[String],
        ) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.operations.lock().unwrap().push(operation);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("on".to_string()))
        }
    }

    fn exit_failure() -> PowerError {
        PowerError::from(ExecutionError::Io {
            command: "maas.power on ipmi".to_string(),
            err: std::io::Error::other("broken pipe"),
        })
    }

    fn missing_cli() -> PowerError {
        PowerError::from(ResolutionError {
            name: "maas.power".to_string(),
            reason: "executable file not found in search path".to_string(),
        })
    }

    fn request(action: Operation) -> PowerParam {
        PowerParam::new("abc123", action, "ipmi").with_opt("power_address", "10.0.0.5")
    }

    #[tokio::test]
    async fn test_power_on_reports_on() {
        let workflow = PowerWorkflow::new(MockExecutor::reporting("on"));
        let cancel = CancellationToken::new();

        let res = workflow.power_on(&cancel, request(Operation::On)).await.unwrap();
        assert_eq!(res, PowerResult { state: "on".to_string() });
        assert_eq!(*workflow.executor().operations.lock().unwrap(), vec![Operation::On]);
    }

    #[tokio::test]
    async fn test_power_on_reports_off() {
        let workflow = PowerWorkflow::new(MockExecutor::reporting("off"));
        let cancel = CancellationToken::new();

        let err = workflow.power_on(&cancel, request(Operation::On)).await.unwrap_err();
        assert!(err.is_wrong_power_state());
        match err {
            PowerError::WrongPowerState { expected, actual } => {
                assert_eq!(expected, "on");
                assert_eq!(actual, "off");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_power_off() {
        let cancel = CancellationToken::new();

        let workflow = PowerWorkflow::new(MockExecutor::reporting("off"));
        let res = workflow.power_off(&cancel, request(Operation::Off)).await.unwrap();
        assert_eq!(res.state, "off");

        let workflow = PowerWorkflow::new(MockExecutor::reporting("on"));
        let err = workflow.power_off(&cancel, request(Operation::Off)).await.unwrap_err();
        assert_eq!(err.kind(), PowerErrorKind::WrongPowerState);
    }

    #[tokio::test]
    async fn test_power_cycle_must_end_on() {
        let cancel = CancellationToken::new();

        let workflow = PowerWorkflow::new(MockExecutor::reporting("on"));
        let res = workflow.power_cycle(&cancel, request(Operation::Cycle)).await.unwrap();
        assert_eq!(res.state, "on");
        assert_eq!(*workflow.executor().operations.lock().unwrap(), vec![Operation::Cycle]);

        let workflow = PowerWorkflow::new(MockExecutor::reporting("off"));
        let err = workflow.power_cycle(&cancel, request(Operation::Cycle)).await.unwrap_err();
        assert!(err.is_wrong_power_state());
    }

    #[tokio::test]
    async fn test_power_query_returns_any_state() {
        let cancel = CancellationToken::new();

        for state in ["off", "on", "error", "unknown"] {
            let workflow = PowerWorkflow::new(MockExecutor::reporting(state));
            let res = workflow.power_query(&cancel, request(Operation::Status)).await.unwrap();
            assert_eq!(res.state, state);
        }
    }

    #[tokio::test]
    async fn test_executor_errors_propagate_unchanged() {
        let cancel = CancellationToken::new();

        let workflow = PowerWorkflow::new(MockExecutor::new(vec![Err(missing_cli())]));
        let err = workflow.power_on(&cancel, request(Operation::On)).await.unwrap_err();
        assert_eq!(err.kind(), PowerErrorKind::Resolution);

        let workflow = PowerWorkflow::new(MockExecutor::new(vec![Err(exit_failure())]));
        let err = workflow.power_off(&cancel, request(Operation::Off)).await.unwrap_err();
        assert_eq!(err.kind(), PowerErrorKind::Execution);
    }

    #[tokio::test]
    async fn test_execute_dispatches_on_action() {
        let cancel = CancellationToken::new();

        for action in Operation::ALL {
            let reply = action.expected_state().unwrap_or("off");
            let workflow = PowerWorkflow::new(MockExecutor::reporting(reply));
            let res = workflow.execute(&cancel, request(action)).await.unwrap();

            assert_eq!(res.state, reply);
            assert_eq!(*workflow.executor().operations.lock().unwrap(), vec![action]);
        }
    }

    #[tokio::test]
    async fn test_default_policy_makes_one_attempt() {
        let workflow = PowerWorkflow::new(MockExecutor::new(vec![Err(exit_failure())]));
        let cancel = CancellationToken::new();

        assert!(workflow.power_on(&cancel, request(Operation::On)).await.is_err());
        assert_eq!(workflow.executor().calls(), 1);
    }

    #[tokio::test]
    async fn test_retries_activity_failures() {
        let workflow = PowerWorkflow::new(MockExecutor::new(vec![
            Err(missing_cli()),
            Err(exit_failure()),
            Ok("on".to_string()),
        ]))
        .with_retry_policy(
            RetryPolicy::default()
                .with_max_attempts(3)
                .with_backoff(Duration::from_millis(1), Duration::from_millis(5)),
        );
        let cancel = CancellationToken::new();

        let res = workflow.power_on(&cancel, request(Operation::On)).await.unwrap();
        assert_eq!(res.state, "on");
        assert_eq!(workflow.executor().calls(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let workflow = PowerWorkflow::new(MockExecutor::new(vec![
            Err(exit_failure()),
            Err(exit_failure()),
            Ok("on".to_string()),
        ]))
        .with_retry_policy(
            RetryPolicy::default()
                .with_max_attempts(2)
                .with_backoff(Duration::from_millis(1), Duration::from_millis(1)),
        );
        let cancel = CancellationToken::new();

        let err = workflow.power_on(&cancel, request(Operation::On)).await.unwrap_err();
        assert_eq!(err.kind(), PowerErrorKind::Execution);
        assert_eq!(workflow.executor().calls(), 2);
    }

    #[tokio::test]
    async fn test_wrong_state_is_not_retried() {
        let workflow = PowerWorkflow::new(MockExecutor::new(vec![
            Ok("off".to_string()),
            Ok("on".to_string()),
        ]))
        .with_retry_policy(RetryPolicy::default().with_max_attempts(5));
        let cancel = CancellationToken::new();

        let err = workflow.power_on(&cancel, request(Operation::On)).await.unwrap_err();
        assert!(err.is_wrong_power_state());
        assert_eq!(workflow.executor().calls(), 1);
    }

    #[tokio::test]
    async fn test_cancel_stops_retries() {
        let workflow = PowerWorkflow::new(MockExecutor::new(vec![Err(exit_failure())]))
            .with_retry_policy(
                RetryPolicy::default()
                    .with_max_attempts(5)
                    .with_backoff(Duration::from_secs(30), Duration::from_secs(30)),
            );
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = workflow.power_on(&cancel, request(Operation::On)).await.unwrap_err();
        assert_eq!(err.kind(), PowerErrorKind::Execution);
        assert_eq!(workflow.executor().calls(), 1);
    }
}
