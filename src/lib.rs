//! Space Debris Tracker
//!
//! This crate implements the frame-processing and tracking pipeline for a
//! telescope video feed: adaptive background modeling, foreground
//! segmentation, connected-component extraction with area gating, centroid
//! computation, and the concurrent capture loop that accumulates detections
//! in a thread-safe log.
//!
//! # Architecture
//!
//! Data flows source-to-store:
//!
//! 1. `ingest`: a `VideoSource` yields grayscale frames.
//! 2. `detect`: `BackgroundModel` -> `Segmenter` -> `BlobExtractor` turn a
//!    frame into zero or more `DetectionRecord`s.
//! 3. `log`: the lock-guarded, append-only `DetectionLog` accumulates them.
//! 4. `storage`: CSV persistence, each field passed through a `FieldCodec`
//!    (plaintext or sealed with a locally stored key).
//!
//! Control flow is two threads: the capture loop (spawned by
//! `DebrisTracker::start`, sole reader of the device) and the controlling
//! thread (save/load/threshold/stop commands), synchronized through the log's
//! lock and an atomic active flag.
//!
//! # Module Structure
//!
//! - `frame`: raster frame type
//! - `ingest`: video sources (synthetic, scripted)
//! - `detect`: the three pipeline stages and their composition
//! - `log`: detection data model and shared log
//! - `tracker`: capture loop lifecycle
//! - `storage`: tabular persistence
//! - `crypto`: key provider and field codecs
//! - `config`: construction-time configuration

pub mod config;
pub mod crypto;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod log;
pub mod storage;
pub mod tracker;

pub use config::{DetectionSettings, SourceSettings, StorageSettings, TrackerConfig};
pub use crypto::{FieldCodec, KeyProvider, PlainCodec, SealedFieldCodec};
pub use detect::{
    AreaThresholds, BackgroundModel, Blob, BlobExtractor, DetectionPipeline, Mask, Segmenter,
};
pub use frame::Frame;
pub use ingest::{open_source, ScriptedSource, SourceStats, SyntheticTelescopeSource, VideoSource};
pub use log::{now_second, DetectionLog, DetectionRecord, DEBRIS_LABEL};
pub use storage::{load_records, save_records, DecodeError};
pub use tracker::{DebrisTracker, NullVisualizer, TraceVisualizer, Visualizer};
