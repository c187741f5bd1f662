use derive_more::Display;

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    pub from_username: String,
    pub text: String,
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum InstanceState {
    #[display(fmt = "pending")]
    Pending,
    #[display(fmt = "running")]
    Running,
    #[display(fmt = "stopping")]
    Stopping,
    #[display(fmt = "stopped")]
    Stopped,
    #[display(fmt = "unknown")]
    Unknown,
}

impl InstanceState {
    /// Never fails: anything the provider reports outside the known
    /// vocabulary (`shutting-down`, `terminated`, ...) is `Unknown`.
    pub fn from_provider(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            _ => Self::Unknown,
        }
    }
}

/// CPU utilisation of the most recent monitoring datapoint, in percent.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UsageSample {
    avg: Option<f64>,
    max: Option<f64>,
}

impl UsageSample {
    /// A half-filled pair is treated as no data at all.
    pub fn new(avg: Option<f64>, max: Option<f64>) -> Self {
        match (avg, max) {
            (Some(avg), Some(max)) => Self {
                avg: Some(avg),
                max: Some(max),
            },
            _ => Self::absent(),
        }
    }

    pub fn absent() -> Self {
        Self {
            avg: None,
            max: None,
        }
    }

    pub fn both(&self) -> Option<(f64, f64)> {
        self.avg.zip(self.max)
    }
}
