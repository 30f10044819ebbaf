//! Progress reporting
//!
//! A request started with [`Pipeline::analyze_with_progress`] runs on its own
//! task and reports through an `mpsc` channel. The stream always ends with
//! [`ProgressEvent::Completed`] or [`ProgressEvent::Failed`]. Dropping the
//! [`ProgressSubscription`] aborts the task.
//!
//! [`Pipeline::analyze_with_progress`]: super::Pipeline::analyze_with_progress

use serde::Serialize;
use std::fmt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::result::AnalysisResult;
use crate::error::VarvizError;
use crate::literature::LiteratureStatus;

/// Buffered events per subscription
pub const PROGRESS_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Resolving,
    Mapping,
    Annotating,
    MiningLiterature,
    Assembling,
    Complete,
    Error,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Resolving => "resolving",
            Stage::Mapping => "mapping",
            Stage::Annotating => "annotating",
            Stage::MiningLiterature => "mining_literature",
            Stage::Assembling => "assembling",
            Stage::Complete => "complete",
            Stage::Error => "error",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    StageFinished(Stage),
    Mapped { done: usize, total: usize },
    Annotated { done: usize, total: usize },
    LiteratureReady { entries: usize, status: LiteratureStatus },
    Completed(Box<AnalysisResult>),
    Failed(VarvizError),
}

impl ProgressEvent {
    /// Stage the event belongs to
    pub fn stage(&self) -> Stage {
        match self {
            ProgressEvent::StageFinished(stage) => *stage,
            ProgressEvent::Mapped { .. } => Stage::Mapping,
            ProgressEvent::Annotated { .. } => Stage::Annotating,
            ProgressEvent::LiteratureReady { .. } => Stage::MiningLiterature,
            ProgressEvent::Completed(_) => Stage::Complete,
            ProgressEvent::Failed(_) => Stage::Error,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Completed(_) | ProgressEvent::Failed(_))
    }
}

/// Sending half used inside the pipeline; a no-op for plain `analyze`
#[derive(Debug, Clone, Default)]
pub(crate) struct ProgressSink {
    sender: Option<mpsc::Sender<ProgressEvent>>,
}

impl ProgressSink {
    pub(crate) fn new(sender: mpsc::Sender<ProgressEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Deliver an event; a closed receiver is ignored
    pub(crate) async fn emit(&self, event: ProgressEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event).await;
        }
    }
}

/// Receiving half of a running analysis
pub struct ProgressSubscription {
    receiver: mpsc::Receiver<ProgressEvent>,
    task: JoinHandle<()>,
}

impl ProgressSubscription {
    pub(crate) fn new(receiver: mpsc::Receiver<ProgressEvent>, task: JoinHandle<()>) -> Self {
        Self { receiver, task }
    }

    /// Next event; `None` once the stream is exhausted
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        self.receiver.recv().await
    }

    /// Drain the stream, returning the terminal outcome
    pub async fn finish(mut self) -> Result<AnalysisResult, VarvizError> {
        while let Some(event) = self.next().await {
            match event {
                ProgressEvent::Completed(result) => return Ok(*result),
                ProgressEvent::Failed(err) => return Err(err),
                _ => {}
            }
        }
        Err(VarvizError::Task {
            msg: "analysis ended without a result".to_string(),
        })
    }
}

impl Drop for ProgressSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
