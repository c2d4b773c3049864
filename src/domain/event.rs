//! Streaming run events

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use super::result::{AgentRunResult, StepResult, ToolCallRecord};

/// An event emitted while a run is in flight
///
/// Ordering is total within a run: `step_started`, zero or more `delta`s,
/// tool-call start/finish pairs, `step_finished`, and finally `run_finished`
/// carrying the same result the blocking path would return.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// A new Think-Act-Observe cycle began
    StepStarted { step: u32 },
    /// Incremental text from the current Think phase
    Delta { text: String },
    /// A tool invocation is about to execute
    ToolCallStarted {
        tool_name: String,
        call_id: String,
        arguments: Value,
    },
    /// A tool invocation finished
    ToolCallFinished { record: ToolCallRecord },
    /// The step's result was sealed
    StepFinished { result: StepResult },
    /// The run terminated
    RunFinished { result: AgentRunResult },
}

/// Streaming handle over a run's events
pub struct RunEventStream {
    receiver: mpsc::Receiver<RunEvent>,
}

impl RunEventStream {
    /// Create a channel pair for driving a run event stream
    pub fn channel(buffer: usize) -> (RunEventSender, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (RunEventSender { sender: tx }, Self { receiver: rx })
    }

    /// Drain the stream and return the final run result.
    ///
    /// Returns `None` if the producing task died before `run_finished`.
    pub async fn collect(mut self) -> Option<AgentRunResult> {
        let mut result = None;
        while let Some(event) = self.receiver.recv().await {
            if let RunEvent::RunFinished { result: finished } = event {
                result = Some(finished);
            }
        }
        result
    }
}

impl Stream for RunEventStream {
    type Item = RunEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_recv(cx)
    }
}

/// Sender half for run events
#[derive(Clone)]
pub struct RunEventSender {
    sender: mpsc::Sender<RunEvent>,
}

impl RunEventSender {
    /// Send an event; an error means the receiver is gone
    pub async fn send(&self, event: RunEvent) -> Result<(), mpsc::error::SendError<RunEvent>> {
        self.sender.send(event).await
    }

    /// Check if the receiver is closed
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
