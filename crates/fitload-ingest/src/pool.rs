//! Parallel file execution
//!
//! Fans file processing out across a bounded pool: one spawned task per
//! file, admission bounded by a semaphore, each task owning its own sink
//! connection and frame source, so workers share no mutable state. Every
//! file yields a captured outcome; one bad file never aborts its siblings.

use crate::config::Settings;
use crate::decode::JsonFrameSource;
use crate::processor::{FileProcessor, FileSummary};
use crate::sink::SinkFactory;
use fitload_common::{FitError, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

/// Captured result of one file task
#[derive(Debug)]
pub struct FileOutcome {
    pub file_name: String,
    pub result: Result<FileSummary>,
}

/// Select the files a run will process
///
/// The explicit allow-list, when present, overrides the directory scan;
/// either way the configured extension filter applies, case-insensitively.
pub fn eligible_files(settings: &Settings, directory_entries: Vec<String>) -> Vec<String> {
    let extension = settings.file_type.to_lowercase();
    let candidates = match &settings.activity_ids {
        Some(allow_list) => allow_list.clone(),
        None => directory_entries,
    };

    candidates
        .into_iter()
        .filter(|name| name.to_lowercase().ends_with(&extension))
        .collect()
}

/// List file names in the source directory
fn list_directory(directory: &str) -> Result<Vec<String>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(directory)? {
        let entry = entry?;
        entries.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(entries)
}

/// Process every eligible file on a bounded worker pool
///
/// Spawns one task per file so files run concurrently across runtime
/// threads and the per-file time budget is enforced even while a file's
/// own work is pending. Returns one [`FileOutcome`] per dispatched file,
/// in completion order; within a file, the processor preserves stream
/// order.
pub async fn run_batch(
    settings: &Settings,
    factory: Arc<dyn SinkFactory>,
) -> Result<Vec<FileOutcome>> {
    let entries = list_directory(&settings.directory)?;
    let files = eligible_files(settings, entries);
    info!(
        files = files.len(),
        workers = settings.workers,
        "Dispatching eligible files"
    );

    let admission = Arc::new(Semaphore::new(settings.workers.max(1)));
    let mut tasks: JoinSet<FileOutcome> = JoinSet::new();
    for file_name in files {
        let settings = settings.clone();
        let factory = Arc::clone(&factory);
        let admission = Arc::clone(&admission);
        tasks.spawn(async move {
            // The permit is held for the arm's duration, bounding pool width
            let result = match admission.acquire_owned().await {
                Ok(_permit) => process_file(&settings, factory.as_ref(), &file_name).await,
                Err(_) => Err(FitError::Other(anyhow::anyhow!("worker pool closed"))),
            };
            if let Err(ref e) = result {
                error!(file_name = %file_name, error = %e, "File processing failed");
            }
            FileOutcome { file_name, result }
        });
    }

    let mut outcomes = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        outcomes.push(joined.map_err(anyhow::Error::from)?);
    }

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    info!(
        processed = outcomes.len() - failed,
        failed,
        "Batch complete"
    );
    Ok(outcomes)
}

/// One file, end to end, bounded by the per-file time budget
async fn process_file(
    settings: &Settings,
    factory: &dyn SinkFactory,
    file_name: &str,
) -> Result<FileSummary> {
    // Each worker opens its own sink connection
    let sink = factory.connect().await?;

    let path = Path::new(&settings.directory).join(file_name);
    let mut source = JsonFrameSource::open(&path).await?;
    let processor = FileProcessor::for_file(settings, file_name)?;

    let budget = Duration::from_secs(settings.file_timeout_secs);
    match tokio::time::timeout(budget, processor.run(&mut source, sink.as_ref())).await {
        Ok(result) => result,
        Err(_) => Err(FitError::Timeout(settings.file_timeout_secs)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::OutputMode;

    fn settings() -> Settings {
        Settings {
            directory: "/data".to_string(),
            dump_directory: "/dump".to_string(),
            file_type: ".fit".to_string(),
            reload_db: false,
            debug: false,
            db_insert: OutputMode::Db,
            document_skip: None,
            document_limit: None,
            collection_name: "activity".to_string(),
            mongo_connection_string: "mongodb://localhost:27017".to_string(),
            activity_ids: None,
            workers: 4,
            file_timeout_secs: 300,
        }
    }

    #[test]
    fn test_extension_filter_is_case_insensitive() {
        let entries = vec![
            "a_12345678901.fit".to_string(),
            "b_12345678901.FIT".to_string(),
            "notes.txt".to_string(),
            "c_12345678901.fit.bak".to_string(),
        ];
        let files = eligible_files(&settings(), entries);
        assert_eq!(files, vec!["a_12345678901.fit", "b_12345678901.FIT"]);
    }

    #[test]
    fn test_allow_list_overrides_directory_scan() {
        let mut settings = settings();
        settings.activity_ids = Some(vec![
            "picked_12345678901.fit".to_string(),
            "skipped.json".to_string(),
        ]);

        let entries = vec!["scanned_12345678901.fit".to_string()];
        let files = eligible_files(&settings, entries);
        assert_eq!(files, vec!["picked_12345678901.fit"]);
    }
}
