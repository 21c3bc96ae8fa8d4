// src/cursor/iter.rs

use super::Cursor;
use crate::{process::ChunkBatch, schema::Record, Result};

/// Records from [`Cursor::records`]. Stops after the first error.
pub struct Records<'a> {
    cursor: &'a mut Cursor,
    failed: bool,
}

impl<'a> Records<'a> {
    pub(super) fn new(cursor: &'a mut Cursor) -> Self {
        Self {
            cursor,
            failed: false,
        }
    }
}

impl Iterator for Records<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.cursor.advance() {
            Ok(true) => self.cursor.current().cloned().map(Ok),
            Ok(false) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Whole batches from [`Cursor::batches`]. Stops after the first error.
pub struct Batches<'a> {
    cursor: &'a mut Cursor,
    failed: bool,
}

impl<'a> Batches<'a> {
    pub(super) fn new(cursor: &'a mut Cursor) -> Self {
        Self {
            cursor,
            failed: false,
        }
    }
}

impl Iterator for Batches<'_> {
    type Item = Result<ChunkBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.cursor.next_batch() {
            Ok(batch) => batch.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
