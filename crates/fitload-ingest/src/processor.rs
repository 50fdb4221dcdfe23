//! Per-file processing
//!
//! Drives one file's frame stream end to end: decode -> transform ->
//! identity-tag -> route to the sink. A file moves Opened -> Reading ->
//! Done; the source is dropped (Closed) when processing returns, whether
//! or not a per-message step failed. Messages are handled strictly
//! sequentially, which keeps record ids monotonic without locking.

use crate::config::{OutputMode, Settings};
use crate::decode::FrameSource;
use crate::identity::{activity_id, RecordCounter};
use crate::message::{Message, Record};
use crate::sink::{DumpWriter, RecordSink};
use crate::transform;
use fitload_common::Result;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

/// Outcome of one fully processed file
#[derive(Debug, Clone)]
pub struct FileSummary {
    pub file_name: String,
    pub activity_id: String,
    pub records: u32,
}

/// Processes one file's message stream
pub struct FileProcessor {
    file_name: String,
    activity_id: String,
    mode: OutputMode,
    dump: Option<DumpWriter>,
}

impl FileProcessor {
    /// Prepare a processor for one file
    ///
    /// The debug dump writer is only constructed when the run has dumps
    /// enabled, so a missing dump directory cannot fail a normal run.
    pub fn for_file(settings: &Settings, file_name: &str) -> Result<Self> {
        let dump = if settings.debug {
            Some(DumpWriter::create(&settings.dump_directory)?)
        } else {
            None
        };

        Ok(Self {
            file_name: file_name.to_string(),
            activity_id: activity_id(file_name),
            mode: settings.db_insert,
            dump,
        })
    }

    /// Consume the frame stream, producing exactly one sink call per frame
    pub async fn run(
        &self,
        source: &mut dyn FrameSource,
        sink: &dyn RecordSink,
    ) -> Result<FileSummary> {
        let mut counter = RecordCounter::new();

        while let Some(message) = source.next_frame().await? {
            let record_id = counter.next_record_id();

            if let Message::Unknown(frame) = &message {
                // Unrecognized variant: placeholder record, stream continues
                warn!(
                    file_name = %self.file_name,
                    record_id,
                    frame_type = ?frame.frame_type,
                    "Unhandled frame type"
                );
            }

            let mut projection = transform::project(&message);
            tag_identity(&mut projection.flat, &self.activity_id, record_id);
            tag_identity(&mut projection.full, &self.activity_id, record_id);

            if let Some(dump) = &self.dump {
                let path = dump.write(&self.activity_id, record_id, &projection.full)?;
                debug!(record_id, path = %path.display(), "Wrote diagnostic dump");
            }

            let document = match self.mode {
                OutputMode::Db => projection.flat,
                OutputMode::Full => projection.full,
            };

            let record = Record {
                activity_id: self.activity_id.clone(),
                record_id,
                kind: message.kind(),
                document,
            };
            sink.persist(&record).await?;
        }

        let summary = FileSummary {
            file_name: self.file_name.clone(),
            activity_id: self.activity_id.clone(),
            records: counter.count(),
        };
        info!(
            file_name = %summary.file_name,
            activity_id = %summary.activity_id,
            records = summary.records,
            "Processed file"
        );
        Ok(summary)
    }
}

/// Tag a projected document with its identity keys
fn tag_identity(document: &mut Map<String, Value>, activity_id: &str, record_id: u32) {
    document.insert("record_id".to_string(), json!(record_id));
    document.insert("activity_id".to_string(), json!(activity_id));
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::decode::VecFrameSource;
    use crate::message::{Chunk, CrcMessage, MessageKind, UnknownFrame};
    use crate::sink::MemorySink;

    fn settings(mode: OutputMode, debug: bool, dump_dir: &str) -> Settings {
        Settings {
            directory: "/data".to_string(),
            dump_directory: dump_dir.to_string(),
            file_type: ".fit".to_string(),
            reload_db: false,
            debug,
            db_insert: mode,
            document_skip: None,
            document_limit: None,
            collection_name: "activity".to_string(),
            mongo_connection_string: "mongodb://localhost:27017".to_string(),
            activity_ids: None,
            workers: 1,
            file_timeout_secs: 300,
        }
    }

    fn crc_frame(offset: u64) -> Message {
        Message::Crc(CrcMessage {
            chunk: Chunk { offset, size: 2 },
            crc: 0x1234,
            frame_type: "crc".to_string(),
            matched: true,
        })
    }

    const FILE_NAME: &str = "ron@maxseiner.net_12379160600.fit";

    #[tokio::test]
    async fn test_record_ids_are_gapless_in_stream_order() {
        let frames = vec![crc_frame(1), crc_frame(2), crc_frame(3)];
        let mut source = VecFrameSource::new(frames);
        let sink = MemorySink::new();

        let processor =
            FileProcessor::for_file(&settings(OutputMode::Db, false, "/tmp"), FILE_NAME).unwrap();
        let summary = processor.run(&mut source, &sink).await.unwrap();

        assert_eq!(summary.records, 3);
        assert_eq!(summary.activity_id, "12379160600");
        let ids: Vec<u32> = sink.records().iter().map(|r| r.record_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_db_mode_routes_flat_projection() {
        let mut source = VecFrameSource::new(vec![crc_frame(7)]);
        let sink = MemorySink::new();

        let processor =
            FileProcessor::for_file(&settings(OutputMode::Db, false, "/tmp"), FILE_NAME).unwrap();
        processor.run(&mut source, &sink).await.unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 1);
        let doc = &records[0].document;
        assert_eq!(doc["message_type"], json!("FitCRC"));
        assert_eq!(doc["message_frame_type"], json!("crc"));
        assert_eq!(doc["matched"], json!(true));
        assert_eq!(doc["record_id"], json!(1));
        assert_eq!(doc["activity_id"], json!("12379160600"));
        assert!(!doc.contains_key("chunk"));
        assert!(!doc.contains_key("crc"));
    }

    #[tokio::test]
    async fn test_full_mode_routes_full_projection() {
        let mut source = VecFrameSource::new(vec![crc_frame(7)]);
        let sink = MemorySink::new();

        let processor =
            FileProcessor::for_file(&settings(OutputMode::Full, false, "/tmp"), FILE_NAME).unwrap();
        processor.run(&mut source, &sink).await.unwrap();

        let doc = &sink.records()[0].document;
        assert_eq!(doc["chunk"], json!({ "offset": 7, "size": 2 }));
        assert_eq!(doc["crc"], json!(0x1234));
        assert_eq!(doc["record_id"], json!(1));
    }

    #[tokio::test]
    async fn test_unknown_frame_keeps_record_id_continuity() {
        let frames = vec![
            crc_frame(1),
            Message::Unknown(UnknownFrame {
                frame_type: Some("0xF0".to_string()),
            }),
            crc_frame(3),
        ];
        let mut source = VecFrameSource::new(frames);
        let sink = MemorySink::new();

        let processor =
            FileProcessor::for_file(&settings(OutputMode::Db, false, "/tmp"), FILE_NAME).unwrap();
        let summary = processor.run(&mut source, &sink).await.unwrap();

        assert_eq!(summary.records, 3);
        let records = sink.records();
        assert_eq!(records[1].kind, MessageKind::Unknown);
        assert_eq!(records[1].document["message_type"], json!("Unknown"));
        assert_eq!(records[1].record_id, 2);
        assert_eq!(records[2].record_id, 3);
    }

    #[tokio::test]
    async fn test_debug_mode_writes_one_dump_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let dump_dir = dir.path().join("dumps");
        let mut source = VecFrameSource::new(vec![crc_frame(1), crc_frame(2)]);
        let sink = MemorySink::new();

        let processor = FileProcessor::for_file(
            &settings(OutputMode::Db, true, dump_dir.to_str().unwrap()),
            FILE_NAME,
        )
        .unwrap();
        processor.run(&mut source, &sink).await.unwrap();

        assert!(dump_dir.join("dump_file_123791606001.txt").exists());
        assert!(dump_dir.join("dump_file_123791606002.txt").exists());
    }
}
