//! # office2pdf-lambda
//!
//! Convert office documents (DOCX, XLSX, PPTX, ODT, RTF, …) uploaded to S3
//! into PDF with a headless LibreOffice, as an AWS Lambda event handler.
//!
//! ## Pipeline Overview
//!
//! ```text
//! S3 ObjectCreated event
//!  │
//!  ├─ 1. Decode   bucket + form-encoded key (`+` → space, %XX escapes)
//!  ├─ 2. Unpack   /opt/lo.tar.br → /tmp/lo (cold start only)
//!  ├─ 3. Fetch    GetObject into memory
//!  ├─ 4. Stage    write to /tmp/<key>
//!  ├─ 5. Convert  soffice --headless --convert-to pdf …
//!  ├─ 6. Collect  read /tmp/<key stem>.pdf
//!  └─ 7. Upload   PutObject <key stem>.pdf into the same bucket
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use office2pdf_lambda::{EventHandler, HandlerConfig, S3BlobStore, S3Event};
//!
//! # async fn run(client: aws_sdk_s3::Client) {
//! let handler = EventHandler::new(&HandlerConfig::default(), Arc::new(S3BlobStore::new(client)));
//! let response = handler.handle(&S3Event::single("docs", "folder/My+File.docx")).await;
//! assert!(response.success);
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `lambda` | on      | Enables the `office2pdf` binary (lambda_runtime + aws-config + clap + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod output;
pub mod pipeline;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{HandlerConfig, HandlerConfigBuilder, DEFAULT_EXPORT_FILTER};
pub use error::{ConversionError, HandlerError, UnpackError};
pub use event::{decode_key, S3Event, SourceObject};
pub use handler::{EventHandler, Stage};
pub use output::{ConvertedObject, ErrorBody, HandlerResponse, SUCCESS_MESSAGE};
pub use pipeline::engine::Engine;
pub use pipeline::naming::{pdf_file_name, pdf_key};
pub use store::{BlobStore, MemoryBlobStore, S3BlobStore};
