use std::collections::HashMap;

use async_trait::async_trait;

use crate::model::{ChatId, IncomingMessage};

/// A command implementation. Every effect (replies, cloud calls) happens
/// inside `execute`, failures included: nothing is reported back.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn execute(&self, chat_id: ChatId, message: &IncomingMessage);
}

#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Box<dyn CommandHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, command: impl Into<String>, handler: H)
    where
        H: CommandHandler + 'static,
    {
        self.handlers.insert(command.into(), Box::new(handler));
    }

    /// Runs the handler registered for the exact message text, if any.
    /// Returns whether a handler ran; unknown text is not an error.
    pub async fn dispatch(&self, message: &IncomingMessage) -> bool {
        let Some(handler) = self.handlers.get(&message.text) else {
            tracing::debug!("Ignoring message from {}: no such command", message.from_username);
            return false;
        };

        tracing::info!(
            "Handling '{}' from {} in chat {}",
            message.text,
            message.from_username,
            message.chat_id
        );
        handler.execute(message.chat_id, message).await;
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<(&'static str, ChatId, String)>>>,
    }

    struct Named {
        name: &'static str,
        recorder: Recorder,
    }

    #[async_trait]
    impl CommandHandler for Named {
        async fn execute(&self, chat_id: ChatId, message: &IncomingMessage) {
            self.recorder
                .calls
                .lock()
                .unwrap()
                .push((self.name, chat_id, message.text.clone()));
        }
    }

    fn message(text: &str) -> IncomingMessage {
        IncomingMessage {
            chat_id: ChatId(7),
            from_username: "viking".to_owned(),
            text: text.to_owned(),
        }
    }

    fn dispatcher(recorder: &Recorder) -> Dispatcher {
        let mut dispatcher = Dispatcher::new();
        for name in ["/start_server", "/stop_server"] {
            dispatcher.register(
                name,
                Named {
                    name,
                    recorder: recorder.clone(),
                },
            );
        }
        dispatcher
    }

    #[tokio::test]
    async fn exact_command_runs_its_handler_once() {
        let recorder = Recorder::default();

        let handled = dispatcher(&recorder).dispatch(&message("/stop_server")).await;

        assert!(handled);
        assert_eq!(
            *recorder.calls.lock().unwrap(),
            vec![("/stop_server", ChatId(7), "/stop_server".to_owned())]
        );
    }

    #[tokio::test]
    async fn unknown_command_is_ignored() {
        let recorder = Recorder::default();

        let handled = dispatcher(&recorder).dispatch(&message("/unknown_command")).await;

        assert!(!handled);
        assert!(recorder.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn lookup_is_verbatim() {
        let recorder = Recorder::default();
        let dispatcher = dispatcher(&recorder);

        for text in ["/START_SERVER", "/start_server now", " /start_server", "start_server"] {
            assert!(!dispatcher.dispatch(&message(text)).await);
        }
        assert!(recorder.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn registering_twice_overwrites() {
        let recorder = Recorder::default();
        let mut dispatcher = dispatcher(&recorder);
        dispatcher.register(
            "/start_server",
            Named {
                name: "replacement",
                recorder: recorder.clone(),
            },
        );

        dispatcher.dispatch(&message("/start_server")).await;

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "replacement");
    }
}
