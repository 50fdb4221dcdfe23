//! Upstream decoder boundary
//!
//! Binary FIT decoding is an external collaborator. The pipeline consumes
//! already-decoded frames through [`FrameSource`]; any decoder that can
//! serialize frames can feed it. The shipped implementation reads one
//! JSON-serialized frame per line, asynchronously, so a stalled read never
//! pins a worker thread.

use crate::message::Message;
use async_trait::async_trait;
use fitload_common::{FitError, Result};
use serde_jsonlines::AsyncJsonLinesReader;
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, BufReader};

/// Sequential stream of decoded frames for one file
///
/// Implementations yield frames strictly in stream order; `Ok(None)`
/// signals exhaustion.
#[async_trait]
pub trait FrameSource: Send {
    /// Pull the next decoded frame, if any
    async fn next_frame(&mut self) -> Result<Option<Message>>;
}

/// Frame source reading one JSON-serialized frame per line
pub struct JsonFrameSource<R> {
    reader: AsyncJsonLinesReader<R>,
}

impl JsonFrameSource<BufReader<File>> {
    /// Open a frames file on disk
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path).await?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: AsyncBufRead + Unpin + Send> JsonFrameSource<R> {
    /// Wrap any buffered reader producing JSON lines
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader: AsyncJsonLinesReader::new(reader),
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> FrameSource for JsonFrameSource<R> {
    async fn next_frame(&mut self) -> Result<Option<Message>> {
        match self.reader.read::<Message>().await {
            Ok(frame) => Ok(frame),
            // A line that is not a valid frame is a decode failure, not an
            // IO failure of the underlying file.
            Err(e) if e.kind() == ErrorKind::InvalidData => Err(FitError::decode(e.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory frame source, for tests and programmatic feeding
#[derive(Debug, Default)]
pub struct VecFrameSource {
    frames: VecDeque<Message>,
}

impl VecFrameSource {
    pub fn new(frames: Vec<Message>) -> Self {
        Self {
            frames: frames.into(),
        }
    }
}

#[async_trait]
impl FrameSource for VecFrameSource {
    async fn next_frame(&mut self) -> Result<Option<Message>> {
        Ok(self.frames.pop_front())
    }
}
