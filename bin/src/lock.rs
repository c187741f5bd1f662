use std::time::Duration;

use async_trait::async_trait;
use hearth_core::InstanceLock;
use redis::AsyncCommands;

/// `SET NX EX` based lock. The expiry frees instances whose holder died
/// mid-workflow.
pub struct RedisInstanceLock {
    connection: redis::aio::MultiplexedConnection,
    ttl: Duration,
}

impl RedisInstanceLock {
    pub async fn connect(url: &str, ttl: Duration) -> Result<Self, String> {
        let client = redis::Client::open(url).map_err(|e| format!("{e}"))?;
        let connection = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| format!("{e}"))?;

        Ok(Self { connection, ttl })
    }
}

fn lock_key(instance_id: &str) -> String {
    format!("instance-lock:{instance_id}")
}

#[async_trait]
impl InstanceLock for RedisInstanceLock {
    async fn try_acquire(&self, instance_id: &str) -> Result<bool, String> {
        let mut conn = self.connection.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(lock_key(instance_id))
            .arg(std::process::id())
            .arg("NX")
            .arg("EX")
            .arg(self.ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| format!("{e}"))?;

        Ok(reply.is_some())
    }

    async fn release(&self, instance_id: &str) -> Result<(), String> {
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(lock_key(instance_id))
            .await
            .map_err(|e| format!("{e}"))
    }
}
