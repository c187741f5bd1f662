use async_trait::async_trait;

/// Best-effort mutual exclusion for start/stop across concurrent webhook
/// invocations. Errors are reported but never block a workflow.
#[async_trait]
pub trait InstanceLock: Send + Sync {
    /// `Ok(false)` means someone else currently holds the lock.
    async fn try_acquire(&self, instance_id: &str) -> Result<bool, String>;
    async fn release(&self, instance_id: &str) -> Result<(), String>;
}

/// Always grants the lock: concurrent start/stop calls are left to the
/// provider's idempotent semantics.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopLock;

#[async_trait]
impl InstanceLock for NoopLock {
    async fn try_acquire(&self, _instance_id: &str) -> Result<bool, String> {
        Ok(true)
    }

    async fn release(&self, _instance_id: &str) -> Result<(), String> {
        Ok(())
    }
}
