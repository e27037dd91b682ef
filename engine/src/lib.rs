//! # VocabSync Engine
//!
//! The pure core of VocabSync: the progress document, its transport
//! encodings, and every decision the multi-tier sync layer makes.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine knows nothing about files, network or timers
//! - **Deterministic**: time comes in through [`Clock`] or as an argument
//! - **Testable**: pure logic, no mocks needed
//!
//! ## Core Concepts
//!
//! ### Aggregate
//!
//! One [`Aggregate`] per installation holds all learning progress. It is
//! always replaced as a whole. Two timestamps drive synchronization:
//! `last_local_update` (stamped on every mutation) and `last_cloud_sync`
//! (stamped only after the remote tier confirmed a write).
//!
//! ### Codecs and chunks
//!
//! A [`Codec`] turns the aggregate into a transport string and back. The
//! remote tier limits value size per key, so the transport string is
//! [`chunk::split`] into fragments and described by a [`RemoteMeta`] commit
//! marker (see [`fragment`]).
//!
//! ### Conflicts
//!
//! [`detect_conflict`] compares the local stamp against the remote commit
//! marker. A remote copy newer by more than a grace skew is returned to the
//! caller as a [`Conflict`] and settled with a [`Resolution`].
//!
//! ### Backups
//!
//! [`export_code`] and [`parse_code`] produce and read `VM<version>:` codes
//! for manual transfer between devices.
//!
//! ## Quick Start
//!
//! ```rust
//! use vocabsync_engine::{export_code, parse_code, Aggregate, WordProgress, WordStatus};
//!
//! let mut agg = Aggregate { xp: 120, ..Default::default() };
//! agg.word_progress.insert(
//!     "a1_cat".to_string(),
//!     WordProgress { status: WordStatus::Mastered, ..Default::default() },
//! );
//!
//! let code = export_code(&agg).unwrap();
//! assert!(code.starts_with("VM5:"));
//!
//! let restored = parse_code(&code).unwrap();
//! assert_eq!(restored, agg);
//! ```

pub mod aggregate;
pub mod backup;
pub mod chunk;
pub mod clock;
pub mod codec;
pub mod conflict;
pub mod error;
pub mod fragment;
pub mod policy;
pub mod schema;

// Re-export main types at crate root
pub use aggregate::{Aggregate, CustomWord, Wallet, WordProgress, WordStatus};
pub use backup::{export_code, parse_code, BACKUP_FORMAT_VERSION};
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{Codec, CodecKind, DeflateCodec, JsonCodec};
pub use conflict::{detect_conflict, merge_import, Conflict, Resolution};
pub use error::{DecodeError, Error, Result};
pub use fragment::{FragmentLayout, FragmentSet, RemoteMeta};
pub use policy::SyncPolicy;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;
/// Vocabulary item identifier.
pub type ItemId = String;
