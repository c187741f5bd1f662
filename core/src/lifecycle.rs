use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use derive_builder::Builder;
use derive_more::Display;

use crate::chat::{ChatTransport, DeliveryError};
use crate::dispatcher::{CommandHandler, Dispatcher};
use crate::formatter::{self, StatusReport};
use crate::gateway::{wait_for_state, CloudOperationError, InstanceGateway, WaitPolicy};
use crate::lock::{InstanceLock, NoopLock};
use crate::model::{ChatId, IncomingMessage, InstanceState};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    StartServer,
    StopServer,
    ServerStatus,
}

impl Command {
    pub const ALL: [Command; 3] = [Self::StartServer, Self::StopServer, Self::ServerStatus];

    pub fn literal(self) -> &'static str {
        match self {
            Self::StartServer => "/start_server",
            Self::StopServer => "/stop_server",
            Self::ServerStatus => "/server_status",
        }
    }

    fn activity(self) -> &'static str {
        match self {
            Self::StartServer => "starting the server",
            Self::StopServer => "stopping the server",
            Self::ServerStatus => "retrieving the server status",
        }
    }
}

#[derive(Debug, Display)]
pub enum WorkflowError {
    #[display(fmt = "{}", _0)]
    Cloud(CloudOperationError),
    #[display(fmt = "{}", _0)]
    Unexpected(String),
}

impl std::error::Error for WorkflowError {}

impl From<CloudOperationError> for WorkflowError {
    fn from(value: CloudOperationError) -> Self {
        Self::Cloud(value)
    }
}

impl From<DeliveryError> for WorkflowError {
    fn from(value: DeliveryError) -> Self {
        Self::Unexpected(value.to_string())
    }
}

#[derive(Builder, Clone, Debug)]
#[builder(setter(into))]
pub struct LifecycleSettings {
    pub instance_id: String,
    /// Receives a notification whenever somebody else starts or stops the server.
    pub owner_id: ChatId,
    #[builder(default = "\"Valheim\".to_owned()")]
    pub game_name: String,
    /// `None` returns as soon as the provider accepted a start/stop request.
    #[builder(default)]
    pub wait: Option<WaitPolicy>,
}

pub struct Orchestrator {
    gateway: Arc<dyn InstanceGateway>,
    chat: Arc<dyn ChatTransport>,
    lock: Arc<dyn InstanceLock>,
    settings: LifecycleSettings,
}

impl Orchestrator {
    pub fn new(
        gateway: Arc<dyn InstanceGateway>,
        chat: Arc<dyn ChatTransport>,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            gateway,
            chat,
            lock: Arc::new(NoopLock),
            settings,
        }
    }

    pub fn with_lock(self, lock: Arc<dyn InstanceLock>) -> Self {
        Self { lock, ..self }
    }

    /// Handler boundary: whatever happens in the workflow stays here.
    pub async fn run(&self, command: Command, chat_id: ChatId, message: &IncomingMessage) {
        let outcome = match command {
            Command::StartServer => {
                self.exclusively(chat_id, self.start_server(chat_id, message))
                    .await
            }
            Command::StopServer => {
                self.exclusively(chat_id, self.stop_server(chat_id, message))
                    .await
            }
            Command::ServerStatus => self.server_status(chat_id).await,
        };

        match outcome {
            Ok(()) => {}
            Err(WorkflowError::Cloud(e)) => {
                tracing::error!("Cloud operation failed while {}: {e}", command.activity());
                let apology = formatter::failure(command.activity());
                if let Err(e) = self.chat.send_message(chat_id, apology).await {
                    tracing::error!("Unable to report failure: {e}");
                }
            }
            Err(WorkflowError::Unexpected(e)) => {
                tracing::error!("Unexpected error while {}: {e}", command.activity());
            }
        }
    }

    pub async fn start_server(
        &self,
        chat_id: ChatId,
        message: &IncomingMessage,
    ) -> Result<(), WorkflowError> {
        let instance_id = self.settings.instance_id.as_str();
        let state = self.gateway.status(instance_id).await?;
        tracing::info!(
            "Start requested by {} while {instance_id} is {state}",
            message.from_username
        );

        match state {
            InstanceState::Running => {
                let address = self.gateway.public_address(instance_id).await?;
                return self
                    .reply(chat_id, formatter::already_running(address.as_deref()))
                    .await;
            }
            InstanceState::Pending => {
                return self.reply(chat_id, formatter::already_starting()).await;
            }
            InstanceState::Stopping | InstanceState::Stopped | InstanceState::Unknown => {}
        }

        self.reply(chat_id, formatter::start_requested()).await?;
        self.gateway.start(instance_id).await?;
        if let Some(policy) = &self.settings.wait {
            wait_for_state(
                self.gateway.as_ref(),
                instance_id,
                InstanceState::Running,
                policy,
            )
            .await?;
        }

        let address = self.gateway.public_address(instance_id).await?;
        let game = self.settings.game_name.as_str();
        self.reply(chat_id, formatter::started(game, address.as_deref()))
            .await?;
        tracing::info!("Server started successfully");

        self.notify_owner(chat_id, formatter::started_by(&message.from_username))
            .await
    }

    pub async fn stop_server(
        &self,
        chat_id: ChatId,
        message: &IncomingMessage,
    ) -> Result<(), WorkflowError> {
        let instance_id = self.settings.instance_id.as_str();
        let state = self.gateway.status(instance_id).await?;
        tracing::info!(
            "Stop requested by {} while {instance_id} is {state}",
            message.from_username
        );

        if state == InstanceState::Stopped {
            return self.reply(chat_id, formatter::not_running()).await;
        }

        self.reply(chat_id, formatter::stopping()).await?;
        self.gateway.stop(instance_id).await?;
        if let Some(policy) = &self.settings.wait {
            wait_for_state(
                self.gateway.as_ref(),
                instance_id,
                InstanceState::Stopped,
                policy,
            )
            .await?;
        }
        self.reply(chat_id, formatter::stopped()).await?;
        tracing::info!("Server stopped");

        self.notify_owner(chat_id, formatter::stopped_by(&message.from_username))
            .await
    }

    pub async fn server_status(&self, chat_id: ChatId) -> Result<(), WorkflowError> {
        let instance_id = self.settings.instance_id.as_str();
        let state = self.gateway.status(instance_id).await?;

        let report = if state == InstanceState::Running {
            tracing::info!("The server is running, retrieving CPU data");
            StatusReport {
                state,
                address: self.gateway.public_address(instance_id).await?,
                usage: self.gateway.cpu_utilization(instance_id).await?,
            }
        } else {
            StatusReport::headline_only(state)
        };

        self.reply(chat_id, report.to_string()).await
    }

    /// Runs `workflow` while holding the instance lock. A lock backend that
    /// misbehaves does not prevent the workflow from running.
    async fn exclusively<'a, F>(&'a self, chat_id: ChatId, workflow: F) -> Result<(), WorkflowError>
    where
        F: Future<Output = Result<(), WorkflowError>> + Send + 'a,
    {
        let instance_id = self.settings.instance_id.as_str();
        match self.lock.try_acquire(instance_id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!("{instance_id} is locked by another request");
                return self.reply(chat_id, formatter::busy()).await;
            }
            Err(e) => {
                tracing::warn!("Unable to lock {instance_id}, going on without lock: {e}");
                return workflow.await;
            }
        }

        let outcome = workflow.await;
        if let Err(e) = self.lock.release(instance_id).await {
            tracing::warn!("Unable to release lock on {instance_id}: {e}");
        }
        outcome
    }

    async fn notify_owner(&self, chat_id: ChatId, text: String) -> Result<(), WorkflowError> {
        if chat_id == self.settings.owner_id {
            return Ok(());
        }
        self.reply(self.settings.owner_id, text).await
    }

    async fn reply(&self, chat_id: ChatId, text: String) -> Result<(), WorkflowError> {
        Ok(self.chat.send_message(chat_id, text).await?)
    }
}

pub struct LifecycleHandler {
    command: Command,
    orchestrator: Arc<Orchestrator>,
}

impl LifecycleHandler {
    pub fn new(command: Command, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            command,
            orchestrator,
        }
    }
}

#[async_trait]
impl CommandHandler for LifecycleHandler {
    async fn execute(&self, chat_id: ChatId, message: &IncomingMessage) {
        self.orchestrator.run(self.command, chat_id, message).await
    }
}

/// A fresh registry with the three lifecycle commands bound to `orchestrator`.
pub fn command_dispatcher(orchestrator: &Arc<Orchestrator>) -> Dispatcher {
    let mut dispatcher = Dispatcher::new();
    for command in Command::ALL {
        dispatcher.register(
            command.literal(),
            LifecycleHandler::new(command, orchestrator.clone()),
        );
    }
    dispatcher
}
