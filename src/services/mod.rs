//! Services module - the synchronization pipeline stages.
//!
//! Every stage is framework-agnostic: no editor integration, only process
//! execution, text transformation, and file I/O.
//!
//! # Components
//!
//! - [`process`]: runs one shell command and streams its stdout lines to a
//!   [`LineHandler`](process::LineHandler), ending with a single end-of-stream
//!   signal. [`CommandRunner`] is the seam tests replace.
//! - [`status`]: runs the modified-files and untracked-files queries in strict
//!   sequence and accumulates normalized fragments.
//! - [`normalizer`]: reduces a reported path to its fragment.
//! - [`synthesis`]: joins fragments into the marker-wrapped rule block.
//! - [`merge`]: writes the block into an existing rules file, touching only the
//!   managed region and only when it changed.
//! - [`workspace`]: derives the working-tree root and rules file path from a
//!   workspace file.
//!
//! # Pipeline
//!
//! ```ignore
//! let fragments = StatusCollector::new(&runner, &normalizer).collect(&queries).await;
//! let block = synthesizer.synthesize(&fragments);
//! let outcome = merger.merge(&rules_path, &block)?;
//! ```

pub mod merge;
pub mod normalizer;
pub mod process;
pub mod status;
pub mod synthesis;
pub mod workspace;

pub use merge::{MergeError, MergeOutcome, RulesMerger, SkipReason};
pub use normalizer::{ExtensionNormalizer, FragmentNormalizer};
pub use process::{CommandRunner, LineHandler, ProcessError, ShellRunner};
pub use status::{StatusCollector, StatusQueries};
pub use synthesis::{BlockSynthesizer, FragmentSet, RegexBlock};
pub use workspace::{Workspace, WorkspaceError};
