use serde::{Deserialize, Serialize};

/// Signal observed while a file goes through downstream content processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum ProcessingEvent {
    Processing,
    Completed,
    Failed {
        #[serde(default)]
        error: Option<String>,
    },
}

impl ProcessingEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProcessingEvent::Processing)
    }
}
