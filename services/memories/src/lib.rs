//! Memories Service
//!
//! Captures "memories" (a title, a description and a photo), uploads the photo
//! to a public object storage bucket on a hosted backend, indexes the memory
//! in the backend's database and lists stored memories back, newest first.
//!
//! ## Features
//!
//! - **Image Acquisition**: host picker behind a trait, photos normalized to a
//!   bounded-width JPEG on local disk
//! - **Object Storage Upload**: collision-free `{uuid}.{ext}` keys, public URLs
//!   derived without an extra round-trip
//! - **Metadata Repository**: insert-and-return of memory rows, recency-ordered
//!   listing
//! - **Upload Orchestration**: explicit state machine with a guard against
//!   duplicate submissions
//!
//! ## Architecture
//!
//! ```text
//! Media Library             Storage Bucket             Database
//! ┌──────────────┐          ┌──────────────┐          ┌──────────────┐
//! │ Image        │          │ memories/    │          │ memories     │
//! │ Acquisition  │          │   {uuid}.jpg │          │ (table)      │
//! └──────────────┘          └──────────────┘          └──────────────┘
//!        │ file:// URI             ▲                         ▲   │
//!        ▼                         │                         │   │
//! ┌──────────────┐          ┌──────────────┐          ┌──────────────┐
//! │ Upload       │─────────▶│ Storage      │          │ Memory       │
//! │ Orchestrator │          │ Client       │          │ Repository   │
//! └──────────────┘          └──────────────┘          └──────────────┘
//!        │                                                   ▲   │
//!        └───────────────────────────────────────────────────┘   ▼
//!                                                         ┌──────────────┐
//!                                                         │ Memory Feed  │
//!                                                         └──────────────┘
//! ```
//!
//! Both clients share one [`BackendClient`], built once at startup and passed
//! in explicitly.

pub mod backend;
pub mod config;
pub mod error;
pub mod feed;
pub mod image_picker;
pub mod repository;
pub mod storage;
pub mod upload;

pub use backend::BackendClient;
pub use config::Config;
pub use error::{Error, Result};
pub use feed::MemoryFeed;
pub use image_picker::{
    ImageAcquisition, ImageTransform, MediaLibrary, PathLibrary, PermissionStatus, PickedAsset,
    PickerOutcome,
};
pub use repository::{MemoryRepository, MemoryStore, NewMemoryRow, StoredMemory};
pub use storage::{ImageStore, StorageClient, UploadedImage};
pub use upload::{MemoryDraft, UploadOrchestrator, UploadState};
