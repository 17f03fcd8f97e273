//! Interactive conversation loop
//!
//! Reads one line at a time, hands it to a `Responder` and prints the
//! answer. Cancellation closes the loop whether it is waiting for input or
//! in the middle of a turn.

use std::io::Write;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;

use crate::agent::Agent;
use crate::error::Result;

const PROMPT: &str = "\nYou: ";

/// Produces the printed answer for one utterance
#[async_trait]
pub trait Responder: Send {
    async fn respond(&mut self, utterance: &str) -> Result<String>;
}

#[async_trait]
impl Responder for Agent<'_> {
    async fn respond(&mut self, utterance: &str) -> Result<String> {
        Agent::respond(self, utterance)
            .await
            .map(|reply| reply.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Processing,
    Closed,
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Interrupted,
    EndOfInput,
}

pub struct ConversationLoop<R, W> {
    input: R,
    output: W,
    cancel: CancellationToken,
    state: LoopState,
}

impl<R, W> ConversationLoop<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(input: R, output: W, cancel: CancellationToken) -> Self {
        Self {
            input,
            output,
            cancel,
            state: LoopState::Idle,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Run turns until cancelled or the input ends.
    ///
    /// Turn failures are printed and the loop carries on. Only I/O errors on
    /// the loop's own input or output end it early.
    pub async fn run<T>(&mut self, responder: &mut T) -> std::io::Result<LoopExit>
    where
        T: Responder + ?Sized,
    {
        let cancel = self.cancel.clone();

        loop {
            self.state = LoopState::Idle;
            write!(self.output, "{}", PROMPT)?;
            self.output.flush()?;

            let mut line = String::new();
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                read = self.input.read_line(&mut line) => Some(read?),
            };

            let Some(read) = read else {
                return self.finish(LoopExit::Interrupted);
            };
            if read == 0 {
                return self.finish(LoopExit::EndOfInput);
            }

            let utterance = line.trim();
            if utterance.is_empty() {
                continue;
            }

            self.state = LoopState::Processing;
            tracing::info!(chars = utterance.len(), "Turn started");
            writeln!(self.output, "\nAgent: Processing your request...")?;
            self.output.flush()?;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                outcome = responder.respond(utterance) => Some(outcome),
            };

            match outcome {
                None => {
                    tracing::info!("Turn interrupted");
                    return self.finish(LoopExit::Interrupted);
                }
                Some(Ok(reply)) => {
                    tracing::info!("Turn completed");
                    writeln!(self.output, "\nAgent: {}", reply)?;
                }
                Some(Err(e)) => {
                    tracing::error!(kind = e.kind(), error = %e, "Turn failed");
                    writeln!(self.output, "\nError: {}", e)?;
                }
            }
        }
    }

    fn finish(&mut self, exit: LoopExit) -> std::io::Result<LoopExit> {
        self.state = LoopState::Closed;
        match exit {
            LoopExit::Interrupted => writeln!(self.output, "\nExiting...")?,
            LoopExit::EndOfInput => writeln!(self.output)?,
        }
        self.output.flush()?;
        tracing::info!(?exit, "Conversation loop closed");
        Ok(exit)
    }
}
