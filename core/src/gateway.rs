use std::time::Duration;

use async_trait::async_trait;
use derive_more::Display;

use crate::model::{InstanceState, UsageSample};

pub const DEV_PLACEHOLDER_ADDRESS: &str = "192.168.0.1";

/// Any failure coming from the compute control plane: rejected requests
/// (permissions, quota, invalid transitions), network errors, missing
/// instances and expired waits.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
#[display(fmt = "{} failed: {}", operation, message)]
pub struct CloudOperationError {
    pub operation: &'static str,
    pub message: String,
}

impl CloudOperationError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

impl std::error::Error for CloudOperationError {}

#[async_trait]
pub trait InstanceGateway: Send + Sync {
    async fn status(&self, instance_id: &str) -> Result<InstanceState, CloudOperationError>;
    /// Requests the transition, does not wait for it.
    async fn start(&self, instance_id: &str) -> Result<(), CloudOperationError>;
    /// Requests the transition, does not wait for it.
    async fn stop(&self, instance_id: &str) -> Result<(), CloudOperationError>;
    async fn public_address(&self, instance_id: &str)
        -> Result<Option<String>, CloudOperationError>;
    async fn cpu_utilization(&self, instance_id: &str)
        -> Result<UsageSample, CloudOperationError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(300),
        }
    }
}

/// States from which the instance will not get to `target` without another
/// request (`unknown` covers `shutting-down` and `terminated`).
fn is_dead_end(state: InstanceState, target: InstanceState) -> bool {
    match target {
        InstanceState::Running => matches!(state, InstanceState::Stopping | InstanceState::Unknown),
        InstanceState::Stopped => matches!(state, InstanceState::Pending | InstanceState::Unknown),
        _ => false,
    }
}

/// Blocking counterpart of `start`/`stop`: polls the instance until it
/// reports `target`, gets stuck in a dead end or the policy's timeout runs out.
pub async fn wait_for_state(
    gateway: &dyn InstanceGateway,
    instance_id: &str,
    target: InstanceState,
    policy: &WaitPolicy,
) -> Result<(), CloudOperationError> {
    let deadline = tokio::time::Instant::now() + policy.timeout;
    loop {
        let state = gateway.status(instance_id).await?;
        if state == target {
            return Ok(());
        }
        if is_dead_end(state, target) {
            return Err(CloudOperationError::new(
                "wait",
                format!("instance {instance_id} is {state}, it will not become {target}"),
            ));
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(CloudOperationError::new(
                "wait",
                format!("instance {instance_id} is {state}, gave up waiting for {target}"),
            ));
        }
        tracing::debug!("Instance {instance_id} is {state}, waiting for {target}");
        tokio::time::sleep(policy.poll_interval).await;
    }
}

/// Development mode: reads go to the real control plane, mutations are
/// skipped and the instance always appears to have a placeholder address.
pub struct DevModeGateway<G> {
    inner: G,
}

impl<G: InstanceGateway> DevModeGateway<G> {
    pub fn new(inner: G) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<G: InstanceGateway> InstanceGateway for DevModeGateway<G> {
    async fn status(&self, instance_id: &str) -> Result<InstanceState, CloudOperationError> {
        self.inner.status(instance_id).await
    }

    async fn start(&self, instance_id: &str) -> Result<(), CloudOperationError> {
        tracing::info!("Development mode: not starting {instance_id}");
        Ok(())
    }

    async fn stop(&self, instance_id: &str) -> Result<(), CloudOperationError> {
        tracing::info!("Development mode: not stopping {instance_id}");
        Ok(())
    }

    async fn public_address(
        &self,
        _instance_id: &str,
    ) -> Result<Option<String>, CloudOperationError> {
        Ok(Some(DEV_PLACEHOLDER_ADDRESS.to_owned()))
    }

    async fn cpu_utilization(
        &self,
        instance_id: &str,
    ) -> Result<UsageSample, CloudOperationError> {
        self.inner.cpu_utilization(instance_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct ScriptedStates {
        states: Mutex<Vec<InstanceState>>,
        mutations: Mutex<u32>,
    }

    impl ScriptedStates {
        fn new(mut states: Vec<InstanceState>) -> Self {
            states.reverse();
            Self {
                states: Mutex::new(states),
                mutations: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl InstanceGateway for ScriptedStates {
        async fn status(&self, _: &str) -> Result<InstanceState, CloudOperationError> {
            let mut states = self.states.lock().unwrap();
            match states.len() {
                0 => Err(CloudOperationError::new("status", "script exhausted")),
                1 => Ok(states[0]),
                _ => Ok(states.pop().unwrap()),
            }
        }
        async fn start(&self, _: &str) -> Result<(), CloudOperationError> {
            *self.mutations.lock().unwrap() += 1;
            Ok(())
        }
        async fn stop(&self, _: &str) -> Result<(), CloudOperationError> {
            *self.mutations.lock().unwrap() += 1;
            Ok(())
        }
        async fn public_address(&self, _: &str) -> Result<Option<String>, CloudOperationError> {
            Ok(None)
        }
        async fn cpu_utilization(&self, _: &str) -> Result<UsageSample, CloudOperationError> {
            Ok(UsageSample::new(Some(1.0), Some(2.0)))
        }
    }

    fn fast_policy() -> WaitPolicy {
        WaitPolicy {
            poll_interval: Duration::from_millis(1),
            timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn wait_returns_once_target_is_reached() {
        let gateway = ScriptedStates::new(vec![
            InstanceState::Stopped,
            InstanceState::Pending,
            InstanceState::Running,
        ]);

        let result =
            wait_for_state(&gateway, "i-1", InstanceState::Running, &fast_policy()).await;

        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn wait_gives_up_after_timeout() {
        let gateway = ScriptedStates::new(vec![InstanceState::Pending]);

        let result =
            wait_for_state(&gateway, "i-1", InstanceState::Running, &fast_policy()).await;

        let err = result.unwrap_err();
        assert_eq!(err.operation, "wait");
        assert!(err.message.contains("pending"));
    }

    #[tokio::test]
    async fn wait_fails_fast_on_a_dead_end() {
        let cases = [
            (InstanceState::Stopping, InstanceState::Running),
            (InstanceState::Unknown, InstanceState::Running),
            (InstanceState::Pending, InstanceState::Stopped),
            (InstanceState::Unknown, InstanceState::Stopped),
        ];
        for (stuck, target) in cases {
            let gateway = ScriptedStates::new(vec![stuck, target]);
            let policy = WaitPolicy {
                poll_interval: Duration::from_secs(60),
                timeout: Duration::from_secs(300),
            };

            let waited = wait_for_state(&gateway, "i-1", target, &policy);
            let err = tokio::time::timeout(Duration::from_secs(1), waited)
                .await
                .expect("a dead end must not be polled again")
                .unwrap_err();

            assert_eq!(err.operation, "wait");
            assert!(err.message.contains(&stuck.to_string()));
        }
    }

    #[tokio::test]
    async fn wait_propagates_status_failures() {
        let gateway = ScriptedStates::new(vec![]);

        let result =
            wait_for_state(&gateway, "i-1", InstanceState::Stopped, &fast_policy()).await;

        assert_eq!(result.unwrap_err().operation, "status");
    }

    #[tokio::test]
    async fn dev_mode_skips_mutations_and_fakes_address() {
        let gateway = DevModeGateway::new(ScriptedStates::new(vec![InstanceState::Stopped]));

        gateway.start("i-1").await.unwrap();
        gateway.stop("i-1").await.unwrap();

        assert_eq!(*gateway.inner.mutations.lock().unwrap(), 0);
        assert_eq!(
            gateway.public_address("i-1").await.unwrap().as_deref(),
            Some(DEV_PLACEHOLDER_ADDRESS)
        );
        assert_eq!(gateway.status("i-1").await.unwrap(), InstanceState::Stopped);
    }
}
