mod config;
mod lock;
mod telegram;
mod webhook;

use std::sync::Arc;

use config::{HearthConfig, LogFormat};
use ec2_gateway::Ec2Gateway;
use hearth_core::{
    ChatId, DevModeGateway, InstanceGateway, LifecycleSettingsBuilder, Orchestrator,
};
use lock::RedisInstanceLock;
use telegram::TeloxideProxy;
use tracing::{error, info, warn};
use webhook::WebhookState;

#[tokio::main]
async fn main() {
    let config = match HearthConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt().init();
            error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Text => tracing_subscriber::fmt().init(),
    }
    info!("Booting up hearth");

    if let Err(e) = run(config).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(config: HearthConfig) -> Result<(), String> {
    let telegram = TeloxideProxy::new(&config.telegram)?;

    let ec2 = Ec2Gateway::for_region(&config.instance.region).await;
    let gateway: Arc<dyn InstanceGateway> = if config.dev_mode {
        warn!("Development mode: start/stop requests will not reach the cloud provider");
        Arc::new(DevModeGateway::new(ec2))
    } else {
        Arc::new(ec2)
    };

    let settings = LifecycleSettingsBuilder::default()
        .instance_id(config.instance.instance_id.clone())
        .owner_id(ChatId(config.owner_id))
        .game_name(config.game_name.clone())
        // A skipped start never reaches the target state.
        .wait(config.instance.wait.filter(|_| !config.dev_mode))
        .build()
        .map_err(|e| format!("Invalid lifecycle settings: {e}"))?;

    let mut orchestrator = Orchestrator::new(gateway, Arc::new(telegram.clone()), settings);
    if let Some(lock) = &config.lock {
        let redis_lock = RedisInstanceLock::connect(&lock.redis_url, lock.ttl)
            .await
            .map_err(|e| format!("Redis client cannot be created: {e}"))?;
        info!("Start/stop requests are serialised through Redis");
        orchestrator = orchestrator.with_lock(Arc::new(redis_lock));
    }

    if let Some(url) = &config.webhook.public_url {
        telegram
            .register_webhook(url, &config.webhook.secret)
            .await
            .map_err(|e| format!("Unable to register webhook: {e}"))?;
        info!("Webhook registered at {url}");
    }

    let state = WebhookState {
        secret: config.webhook.secret.clone(),
        orchestrator: Arc::new(orchestrator),
    };
    webhook::run_webhook_listener(&config.webhook, state).await
}
