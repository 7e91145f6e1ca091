//! Line framing shared by both ends of a connection, plus the stdin feeder
//! used by the interactive binaries.

use crate::MAX_LINE_LEN;
use log::warn;
use std::io::{self, BufRead};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio::sync::mpsc;

/// Result of reading one framed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRead {
    Line(String),
    /// A complete line that is not valid UTF-8
    NotUtf8(Vec<u8>),
    /// More than [`MAX_LINE_LEN`] bytes arrived without a newline
    TooLong,
    Closed,
}

/// Reads one newline-terminated line of at most [`MAX_LINE_LEN`] bytes
///
/// Only I/O failures are errors. Bad bytes come back as `NotUtf8` so the
/// caller can drop the line and keep reading. Partial input is kept in `buf`
/// between calls, which makes this safe to race in `select!`.
pub async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    let room = (MAX_LINE_LEN + 1).saturating_sub(buf.len()) as u64;
    let read = (&mut *reader).take(room).read_until(b'\n', buf).await?;

    let mut line = std::mem::take(buf);
    if read == 0 && line.is_empty() {
        return Ok(LineRead::Closed);
    }
    if line.last() == Some(&b'\n') {
        line.pop();
    } else if line.len() > MAX_LINE_LEN {
        return Ok(LineRead::TooLong);
    }

    Ok(match String::from_utf8(line) {
        Ok(line) => LineRead::Line(line),
        Err(e) => LineRead::NotUtf8(e.into_bytes()),
    })
}

/// Forwards stdin lines from a plain thread
///
/// Blocking reads stay off the runtime, so shutting it down never waits for
/// the next newline.
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to read input: {}", e);
                    break;
                }
            }
        }
    });
    rx
}
