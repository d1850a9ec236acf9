//! libcsearch - find the libc behind a leak
//!
//! A library for identifying which C library build a process was linked
//! against from a handful of leaked symbol addresses. Candidates come from the
//! libc.blukat.me or libc.rip databases, are verified against their full
//! symbol tables and can be downloaded for local use.

pub mod cli;
pub mod config;
pub mod error;
pub mod libc;
pub mod runner;
pub mod transport;

// Re-export main types for convenience
pub use cli::{Args, CliApp, OutputFormat};
pub use config::{BackendEndpoint, BackendKind, DedupKey, SearchConfig};
pub use error::{SearchError, TransportError};
pub use libc::{ConstraintSet, LibcSearch, LibraryCatalog, ResolvedLibrary};
pub use runner::{ProgressSnapshot, TaskRunner};
pub use transport::{ArtifactStore, DirectoryStore, HttpResponse, ReqwestTransport, Transport};
