//! Single-pass stream multiplexer: one source, many hash sinks, one head
//! window.
//!
//! # Invariants
//! - Every source byte reaches every sink exactly once, in order, regardless
//!   of how much of the stream the consumer actually reads.
//! - The head window is filled at most once; `read_head` is idempotent.
//! - Rewinding is only possible while the consumer position is inside the
//!   head window.
//!
//! # Algorithm
//! - Bytes pulled into the head window are fed to the sinks at fill time.
//! - A consumer read inside the window is served from the buffer without
//!   touching the sinks again.
//! - The first consumer read past the window switches to pass-through mode:
//!   bytes go source -> consumer and are fed to the sinks on the way.
//! - `finalize` drains whatever the consumer left unread.

use std::io::{self, Read};

use crate::error::StreamError;
use crate::hash::{HashAlgorithmId, HashSink};

const DRAIN_CHUNK: usize = 64 * 1024;

/// Final digests plus the total stream length.
#[derive(Debug, Clone)]
pub struct Digests {
    entries: Vec<(HashAlgorithmId, Box<[u8]>)>,
    total: u64,
}

impl Digests {
    /// Digest bytes for one algorithm, if it was attached.
    pub fn get(&self, id: HashAlgorithmId) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(algo, _)| *algo == id)
            .map(|(_, d)| d.as_ref())
    }

    /// All `(algorithm, digest)` pairs in attachment order.
    pub fn iter(&self) -> impl Iterator<Item = (HashAlgorithmId, &[u8])> {
        self.entries.iter().map(|(a, d)| (*a, d.as_ref()))
    }

    /// Total number of bytes in the stream.
    #[inline]
    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Read-only, partially rewindable view of a byte source that feeds every
/// attached hash sink with the same bytes exactly once.
pub struct HashStream<R: Read> {
    source: R,
    sinks: Vec<HashSink>,
    head: Vec<u8>,
    head_cap: usize,
    /// EOF was observed while the fill position was still inside the window.
    source_done: bool,
    /// Consumer position. Within `head.len()` reads are buffer-served.
    pos: u64,
    /// Bytes fed to sinks beyond the head window.
    streamed: u64,
}

impl<R: Read> HashStream<R> {
    /// Attach one sink per requested algorithm.
    pub fn open(source: R, algorithms: &[HashAlgorithmId], head_cap: usize) -> Self {
        let sinks = algorithms.iter().map(|&id| HashSink::new(id)).collect();
        Self {
            source,
            sinks,
            head: Vec::new(),
            head_cap,
            source_done: false,
            pos: 0,
            streamed: 0,
        }
    }

    /// Non-destructive read of the first `n` bytes (capped at the window
    /// size). The returned slice is shorter than `n` only when the source
    /// itself is shorter.
    pub fn read_head(&mut self, n: usize) -> io::Result<&[u8]> {
        let want = n.min(self.head_cap);
        self.fill_head_to(want)?;
        Ok(&self.head[..want.min(self.head.len())])
    }

    /// True when the whole source fit inside the head window.
    #[inline]
    pub fn source_exhausted(&self) -> bool {
        self.source_done
    }

    /// Reset the consumer position to the start of the head window.
    pub fn rewind(&mut self) -> Result<(), StreamError> {
        if self.pos > self.head.len() as u64 {
            return Err(StreamError::RewindBeyondHead {
                pos: self.pos,
                head_len: self.head.len(),
            });
        }
        self.pos = 0;
        Ok(())
    }

    /// Drain the unread remainder through the sinks and return the digests.
    pub fn finalize(mut self) -> io::Result<Digests> {
        let mut buf = [0u8; DRAIN_CHUNK];
        if !self.source_done {
            // Make sure the window is complete so accounting below is exact.
            self.fill_head_to(self.head_cap)?;
        }
        let mut drained = 0u64;
        if !self.source_done {
            loop {
                let n = match self.source.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                };
                for sink in &mut self.sinks {
                    sink.update(&buf[..n]);
                }
                drained += n as u64;
            }
        }
        let total = self.head.len() as u64 + self.streamed + drained;
        let entries = self
            .sinks
            .into_iter()
            .map(|s| {
                let id = s.id();
                (id, s.finish())
            })
            .collect();
        Ok(Digests { entries, total })
    }

    fn fill_head_to(&mut self, want: usize) -> io::Result<()> {
        let target = want.min(self.head_cap);
        while self.head.len() < target && !self.source_done {
            let old = self.head.len();
            self.head.resize(target, 0);
            match self.source.read(&mut self.head[old..target]) {
                Ok(0) => {
                    self.head.truncate(old);
                    self.source_done = true;
                }
                Ok(n) => {
                    self.head.truncate(old + n);
                    for sink in &mut self.sinks {
                        sink.update(&self.head[old..old + n]);
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {
                    self.head.truncate(old);
                }
                Err(e) => {
                    self.head.truncate(old);
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

impl<R: Read> Read for HashStream<R> {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        if dst.is_empty() {
            return Ok(0);
        }

        // Serve from the head window while the position is inside it.
        let pos = self.pos as usize;
        if pos < self.head.len() {
            let n = (self.head.len() - pos).min(dst.len());
            dst[..n].copy_from_slice(&self.head[pos..pos + n]);
            self.pos += n as u64;
            return Ok(n);
        }

        // Complete the window before streaming past it, so later rewinds and
        // header re-reads stay valid for everything within the cap.
        if !self.source_done && self.head.len() < self.head_cap {
            self.fill_head_to(self.head_cap)?;
            let pos = self.pos as usize;
            if pos < self.head.len() {
                let n = (self.head.len() - pos).min(dst.len());
                dst[..n].copy_from_slice(&self.head[pos..pos + n]);
                self.pos += n as u64;
                return Ok(n);
            }
        }

        if self.source_done {
            // The whole source fit inside the window; past it is clean EOF.
            return Ok(0);
        }

        let n = self.source.read(dst)?;
        if n > 0 {
            for sink in &mut self.sinks {
                sink.update(&dst[..n]);
            }
            self.pos += n as u64;
            self.streamed += n as u64;
        }
        Ok(n)
    }
}
