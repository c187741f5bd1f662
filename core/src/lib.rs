//! Chat-driven lifecycle control for a single cloud instance hosting a game
//! server: command dispatch, start/stop/status workflows and their replies.

pub mod chat;
pub mod dispatcher;
pub mod formatter;
pub mod gateway;
pub mod lifecycle;
pub mod lock;
pub mod model;

pub use chat::{ChatTransport, DeliveryError, DeliveryResult};
pub use dispatcher::{CommandHandler, Dispatcher};
pub use gateway::{CloudOperationError, DevModeGateway, InstanceGateway, WaitPolicy};
pub use lifecycle::{
    command_dispatcher, Command, LifecycleSettings, LifecycleSettingsBuilder, Orchestrator,
};
pub use lock::{InstanceLock, NoopLock};
pub use model::{ChatId, IncomingMessage, InstanceState, UsageSample};
