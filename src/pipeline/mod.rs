//! Pipeline stages for one conversion.
//!
//! ## Data Flow
//!
//! ```text
//! S3 ──▶ staging ──▶ engine ──▶ staging ──▶ S3
//! (get)   (write)    (soffice)   (read)     (put)
//! ```
//!
//! 1. [`staging`]: the scratch directory shared with the engine process
//! 2. [`engine`]: unpack LibreOffice on cold start, then run it
//! 3. [`invoke`]: the soffice command line, timeout and retry policy
//! 4. [`naming`]: predict the engine's output name and the upload key

pub mod engine;
pub mod invoke;
pub mod naming;
pub mod staging;
