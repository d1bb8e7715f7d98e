//! The event handler: one S3 notification in, one PDF out.
//!
//! ## Stages
//!
//! ```text
//! Received → EngineReady → SourceFetched → InputStaged → Converted
//!          → OutputRetrieved → Uploaded → Succeeded
//! ```
//!
//! Any stage may move to `Failed`; the first failure ends the invocation. Nothing is
//! rolled back: staged files stay in the scratch directory and are simply
//! overwritten if the same event is delivered again.

use crate::config::HandlerConfig;
use crate::error::HandlerError;
use crate::event::{S3Event, SourceObject};
use crate::output::{ConvertedObject, HandlerResponse};
use crate::pipeline::engine::Engine;
use crate::pipeline::naming::pdf_key;
use crate::pipeline::staging::StagingArea;
use crate::store::BlobStore;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Position of an invocation in the conversion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    EngineReady,
    SourceFetched,
    InputStaged,
    Converted,
    OutputRetrieved,
    Uploaded,
    Succeeded,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::EngineReady => "engine_ready",
            Stage::SourceFetched => "source_fetched",
            Stage::InputStaged => "input_staged",
            Stage::Converted => "converted",
            Stage::OutputRetrieved => "output_retrieved",
            Stage::Uploaded => "uploaded",
            Stage::Succeeded => "succeeded",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Converts the object named by an S3 event and uploads the PDF beside it.
///
/// Construct once per execution environment and reuse across invocations;
/// the store client and the engine installation are both meant to be warm.
pub struct EventHandler {
    store: Arc<dyn BlobStore>,
    staging: StagingArea,
    engine: Engine,
}

impl EventHandler {
    pub fn new(config: &HandlerConfig, store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            staging: StagingArea::new(&config.scratch_dir),
            engine: Engine::from_config(config),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Run the pipeline and report the outcome as a response body.
    ///
    /// Never fails: errors become `{ "success": false, "error": … }`.
    pub async fn handle(&self, event: &S3Event) -> HandlerResponse {
        match self.process(event).await {
            Ok(_) => HandlerResponse::uploaded(),
            Err(e) => HandlerResponse::failed(&e),
        }
    }

    /// Run the pipeline, returning the typed outcome.
    pub async fn process(&self, event: &S3Event) -> Result<ConvertedObject, HandlerError> {
        let start = Instant::now();
        let mut stage = Stage::Received;

        match self.run(event, &mut stage).await {
            Ok(converted) => {
                info!(
                    stage = %Stage::Succeeded,
                    "Converted s3://{}/{} → {} in {}ms",
                    converted.bucket,
                    converted.source_key,
                    converted.output_key,
                    start.elapsed().as_millis()
                );
                Ok(converted)
            }
            Err(e) => {
                error!(
                    stage = %Stage::Failed,
                    last_stage = %stage,
                    kind = e.kind(),
                    "Conversion failed after {}ms: {e}",
                    start.elapsed().as_millis()
                );
                Err(e)
            }
        }
    }

    async fn run(&self, event: &S3Event, stage: &mut Stage) -> Result<ConvertedObject, HandlerError> {
        let SourceObject { bucket, key } = event.source_object()?;
        info!(stage = %stage, "Received s3://{bucket}/{key}");

        // Uploading over the source would also re-fire the bucket trigger.
        let output_key = pdf_key(&key);
        if output_key == key {
            return Err(HandlerError::InvalidEvent(format!(
                "s3://{bucket}/{key} is already a PDF; its output would overwrite the source"
            )));
        }

        self.engine.ensure_ready().await?;
        advance(stage, Stage::EngineReady);

        let source = self.store.fetch(&bucket, &key).await?;
        let source_bytes = source.len();
        advance(stage, Stage::SourceFetched);

        let input_path = self.staging.write(&key, &source).await?;
        drop(source);
        advance(stage, Stage::InputStaged);

        // The staged file's directory always exists: `write` created it.
        let out_dir = input_path
            .parent()
            .unwrap_or_else(|| self.staging.root())
            .to_path_buf();
        self.engine.convert(&input_path, &out_dir).await?;
        advance(stage, Stage::Converted);

        let pdf = self.staging.read(&output_key).await?;
        let output_bytes = pdf.len();
        advance(stage, Stage::OutputRetrieved);

        self.store.store(&bucket, &output_key, pdf).await?;
        advance(stage, Stage::Uploaded);

        Ok(ConvertedObject {
            bucket,
            source_key: key,
            output_key,
            source_bytes,
            output_bytes,
        })
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    *stage = next;
    info!(stage = %next, "Stage complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBlobStore;

    fn handler_in(dir: &std::path::Path, store: Arc<MemoryBlobStore>) -> EventHandler {
        let config = HandlerConfig::builder()
            .scratch_dir(dir)
            .archive_path(dir.join("missing.tar.br"))
            .build()
            .unwrap();
        EventHandler::new(&config, store)
    }

    #[test]
    fn stage_names() {
        assert_eq!(Stage::EngineReady.to_string(), "engine_ready");
        assert_eq!(Stage::OutputRetrieved.to_string(), "output_retrieved");
        assert_eq!(Stage::Failed.to_string(), "failed");
    }

    #[tokio::test]
    async fn invalid_event_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryBlobStore::new());
        let handler = handler_in(dir.path(), Arc::clone(&store));

        let response = handler.handle(&S3Event { records: vec![] }).await;
        assert!(!response.success);
        assert_eq!(response.error.unwrap().kind, "InvalidEvent");
        assert_eq!(store.fetch_count(), 0);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn failure_is_logged_as_failed_stage() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let dir = tempfile::tempdir().unwrap();
        let handler = handler_in(dir.path(), Arc::new(MemoryBlobStore::new()));
        let err = handler
            .process(&S3Event::single("docs", "a.docx"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "UnpackError");

        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("stage=failed"), "logs: {text}");
        assert!(text.contains("last_stage=received"), "logs: {text}");
    }

    #[tokio::test]
    async fn missing_runtime_archive_fails_before_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryBlobStore::new());
        store.insert("docs", "a.docx", b"doc".to_vec());
        let handler = handler_in(dir.path(), Arc::clone(&store));

        let response = handler.handle(&S3Event::single("docs", "a.docx")).await;
        assert_eq!(response.error.unwrap().kind, "UnpackError");
        assert_eq!(store.fetch_count(), 0);
        assert_eq!(store.store_count(), 0);
    }
}
