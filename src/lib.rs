//! mjit - Source-to-source JIT preprocessor for annotated C++ kernels
//!
//! Scans a C++ source for three directives and rewrites each into ordinary
//! compilable code plus runtime dispatch machinery:
//!
//! - **`MFEM_KERNEL`**: an unbounded-dispatch kernel. The body is captured
//!   as raw source; the host wrapper hashes the constant (dispatch)
//!   arguments into a 64-bit key and lazily compiles one variant per
//!   distinct key through a process-wide cache.
//! - **`MFEM_EMBED`**: auxiliary source captured verbatim and spliced into
//!   every later kernel's raw-source capture.
//! - **`MFEM_TEMPLATE`** with **`MFEM_RANGE(...)`** arguments: a bounded
//!   dispatch space, enumerated ahead of time. One explicit specialization
//!   per point of the Cartesian product of the declared ranges, dispatched
//!   through a static hash-keyed table.
//!
//! All other text is copied through unchanged: the translator is a
//! single-pass write-through transducer over a raw character stream, with
//! bounded lookahead and no backtracking.
//!
//! # Example
//!
//! ```rust
//! use mjit::{translate_str, MjitConfig};
//!
//! let out = translate_str(
//!     "MFEM_KERNEL void axpy(const int n, double *x) { x[0] = n; }",
//!     &MjitConfig::default(),
//!     "axpy.cpp",
//! )
//! .unwrap();
//! assert!(out.contains("extern \"C\" void k%016lx"));
//! assert!(out.contains("jit_hash_args(JIT_HASH_SEED, n)"));
//! ```

pub mod args;
pub mod config;
pub mod context;
pub mod cursor;
pub mod error;
pub mod hash;
pub mod kernel;
pub mod template;
pub mod translate;

// Re-export commonly used types
pub use args::{ArgumentDescriptor, TemplateArg};
pub use config::{ConfigError, ConfigResult, MjitConfig};
pub use context::ParseContext;
pub use error::{Error, Result, SyntaxError};
pub use translate::{run, translate_str, Stats};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// File extensions the command line recognizes as translatable input.
pub const INPUT_EXTENSIONS: &[&str] = &["cc", "cpp", "cxx", "h", "hpp", "cu"];
