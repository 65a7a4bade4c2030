//! Pipeline stages for PDF-to-Office conversion.
//!
//! Each submodule implements exactly one step; the orchestrator sequences them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ decode ──▶ encode ──▶ deliver
//! (path/URL)  (LLM)      (JSON)    (xlsx/doc)  (disk)
//! ```
//!
//! 1. [`input`]   — read a local file or download a URL into a `SourceDocument`
//! 2. [`extract`] — the extraction-service boundary; the only stage with
//!    network I/O
//! 3. [`decode`]  — strip one fence layer and validate the response
//! 4. [`encode`]  — build the workbook or document container; CPU-bound,
//!    runs in `spawn_blocking`
//! 5. [`deliver`] — derive the output filename and write atomically

pub mod decode;
pub mod deliver;
pub mod encode;
pub mod extract;
pub mod input;
