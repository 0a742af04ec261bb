// Copyright (c) The scu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-process reader task.
//!
//! Each running module process has one task that forwards chunks of its standard output to the
//! coordinator, then waits for the process to exit and forwards its exit status. The coordinator
//! does all decoding and publishing.

use crate::{errors::ChildStartError, test_module::ModuleIndex};
use bytes::{Bytes, BytesMut};
use std::{io, process::ExitStatus};
use tokio::{
    io::AsyncReadExt,
    process::{Child, ChildStdout},
    sync::mpsc::UnboundedSender,
};

const CHUNK_SIZE: usize = 4 * 1024;

/// A message from a reader task to the coordinator.
#[derive(Debug)]
pub(super) enum JobMessage {
    /// The module wrote this chunk to its standard output.
    Output { index: ModuleIndex, data: Bytes },

    /// The module's standard output is closed and the process has exited. Always the last
    /// message for a module.
    Exited { index: ModuleIndex, exit: ChildExit },
}

/// How a module process ended.
#[derive(Debug)]
pub(super) enum ChildExit {
    Exited(ExitStatus),
    ReadFailed(io::Error),
    WaitFailed(io::Error),
    SpawnFailed(ChildStartError),
}

impl ChildExit {
    /// Returns the message for the crash event of an abnormal exit, or `None` if the process
    /// exited successfully.
    pub(super) fn crash_message(&self) -> Option<String> {
        match self {
            Self::Exited(status) if status.success() => None,
            Self::Exited(status) => Some(describe_status(*status)),
            Self::ReadFailed(error) => Some(format!(
                "Failed to read test module output: {error}"
            )),
            Self::WaitFailed(error) => Some(format!("Failed to wait for test module: {error}")),
            Self::SpawnFailed(error) => Some(format!(
                "Test module could not be started: {}: {}",
                error.command(),
                error.io_error(),
            )),
        }
    }
}

fn describe_status(status: ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("Test module crashed (exit code {code})");
    }

    cfg_if::cfg_if! {
        if #[cfg(unix)] {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return format!("Test module crashed (killed by signal {signal})");
            }
        }
    }

    format!("Test module crashed ({status})")
}

/// Forwards the output and exit status of `child` to the coordinator.
pub(super) async fn drive_child(
    index: ModuleIndex,
    mut child: Child,
    sender: UnboundedSender<JobMessage>,
) {
    let read_result = match child.stdout.take() {
        Some(stdout) => forward_output(index, stdout, &sender).await,
        None => Ok(()),
    };

    // If reading failed, stdout has been dropped by now, so the child can't block on a full pipe.
    let exit = match (child.wait().await, read_result) {
        (Ok(status), Err(error)) if status.success() => ChildExit::ReadFailed(error),
        (Ok(status), _) => ChildExit::Exited(status),
        (Err(error), _) => ChildExit::WaitFailed(error),
    };

    // The receiver outlives every job.
    let _ = sender.send(JobMessage::Exited { index, exit });
}

async fn forward_output(
    index: ModuleIndex,
    mut stdout: ChildStdout,
    sender: &UnboundedSender<JobMessage>,
) -> io::Result<()> {
    let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
    loop {
        buf.reserve(CHUNK_SIZE);
        if stdout.read_buf(&mut buf).await? == 0 {
            return Ok(());
        }
        let data = buf.split().freeze();
        if sender.send(JobMessage::Output { index, data }).is_err() {
            return Ok(());
        }
    }
}
