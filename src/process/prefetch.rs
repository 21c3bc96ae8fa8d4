// src/process/prefetch.rs

use std::{
    collections::VecDeque,
    io,
    sync::mpsc::{self, Receiver},
    thread::{self, JoinHandle},
};
use tracing::{debug, trace, warn};

use super::chunk::{RawBatch, RawBatchSource};
use crate::{Error, Result};

/// A raw batch plus whether it is the producer's last one.
type Message = Result<(RawBatch, bool)>;

/// Reads ahead on a background thread.
///
/// The producer owns the wrapped source (and its file handle) exclusively and
/// blocks once `capacity` batches are queued. Batches are re-sliced on the
/// consumer side so `refill(max_lines)` behaves like the inline buffer.
pub struct Prefetcher {
    rx: Option<Receiver<Message>>,
    handle: Option<JoinHandle<()>>,
    carry: VecDeque<String>,
    done: bool,
}

impl Prefetcher {
    pub fn spawn<S>(mut inner: S, batch_lines: usize, capacity: usize) -> Result<Self>
    where
        S: RawBatchSource + 'static,
    {
        let (tx, rx) = mpsc::sync_channel::<Message>(capacity);

        let handle = thread::Builder::new()
            .name("csvchunk-prefetch".into())
            .spawn(move || {
                let mut sent = 0usize;
                loop {
                    let msg = inner.refill(batch_lines).map(|batch| {
                        let last = inner.is_exhausted() || batch.is_empty();
                        (batch, last)
                    });
                    let stop = match &msg {
                        Ok((_, last)) => *last,
                        Err(_) => true,
                    };
                    if tx.send(msg).is_err() {
                        trace!("prefetch consumer went away");
                        break;
                    }
                    sent += 1;
                    if stop {
                        break;
                    }
                }
                debug!(batches = sent, "prefetch producer finished");
            })
            .map_err(|e| Error::io("prefetch thread", e))?;

        Ok(Self {
            rx: Some(rx),
            handle: Some(handle),
            carry: VecDeque::new(),
            done: false,
        })
    }

    fn receive(&mut self) -> Result<()> {
        let Some(rx) = self.rx.as_ref() else {
            self.done = true;
            return Ok(());
        };
        match rx.recv() {
            Ok(Ok((batch, last))) => {
                self.carry.extend(batch.into_lines());
                if last {
                    self.done = true;
                }
                Ok(())
            }
            Ok(Err(e)) => {
                self.done = true;
                Err(e)
            }
            // the producer only hangs up early when it panicked
            Err(_) => {
                self.done = true;
                Err(Error::io(
                    "prefetch thread",
                    io::Error::new(io::ErrorKind::Other, "read-ahead stopped before end of input"),
                ))
            }
        }
    }
}

impl RawBatchSource for Prefetcher {
    fn refill(&mut self, max_lines: usize) -> Result<RawBatch> {
        let mut batch = RawBatch::with_capacity(max_lines.min(4096));
        while batch.len() < max_lines {
            if let Some(line) = self.carry.pop_front() {
                batch.push(line);
                continue;
            }
            if self.done {
                break;
            }
            self.receive()?;
        }
        Ok(batch)
    }

    fn is_exhausted(&self) -> bool {
        self.done && self.carry.is_empty()
    }
}

impl Drop for Prefetcher {
    fn drop(&mut self) {
        // closing the channel unblocks a producer waiting on a full queue
        self.rx.take();
        if let Some(handle) = self.handle.take() {
            if let Err(payload) = handle.join() {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_default();
                warn!(%reason, "prefetch producer panicked");
            }
        }
    }
}
