//! Operator input sources for confirm mode.

use std::collections::VecDeque;
use std::io::Write;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::watch;
use tracing::info;

use crate::error::GateError;

/// One line of operator input per call.
///
/// `Ok(None)` means the operator is gone (end of input or Ctrl+C) and the
/// run must stop without acting on the current message.
#[async_trait]
pub trait OperatorInput: Send {
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>, GateError>;
}

/// Install one Ctrl+C handler for the rest of the process.
///
/// The receiver flips to `true` on the first Ctrl+C and stays there. A
/// press while no prompt is open is held until the next prompt, so the
/// message already past the gate is finished first.
pub fn listen_for_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received");
            let _ = tx.send(true);
        }
    });
    rx
}

/// Line-oriented terminal input. An interrupt counts as end of input.
pub struct LineInput<R> {
    lines: Lines<R>,
    interrupted: watch::Receiver<bool>,
}

/// Operator input on the process's stdin.
pub type StdinInput = LineInput<BufReader<Stdin>>;

impl StdinInput {
    pub fn stdin(interrupted: watch::Receiver<bool>) -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), interrupted)
    }
}

impl<R: AsyncBufRead + Unpin> LineInput<R> {
    pub fn new(reader: R, interrupted: watch::Receiver<bool>) -> Self {
        Self {
            lines: reader.lines(),
            interrupted,
        }
    }
}

#[async_trait]
impl<R> OperatorInput for LineInput<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>, GateError> {
        print!("{prompt}");
        std::io::stdout().flush()?;

        if *self.interrupted.borrow() {
            return Ok(None);
        }
        tokio::select! {
            biased;
            // A closed sender means no handler; keep reading.
            Ok(()) = self.interrupted.changed() => Ok(None),
            line = self.lines.next_line() => Ok(line?),
        }
    }
}

/// Canned answers, consumed in order. Runs dry like a closed stdin.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    answers: VecDeque<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl OperatorInput for ScriptedInput {
    async fn read_line(&mut self, _prompt: &str) -> Result<Option<String>, GateError> {
        Ok(self.answers.pop_front())
    }
}
