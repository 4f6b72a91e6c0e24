//! # Eventday Providers
//!
//! Concrete collaborators for the lifecycle engine:
//!
//! | Trait | Production | Development / fallback |
//! |---|---|---|
//! | `ImageStore` | [`CloudinaryImageStore`] | [`UnconfiguredImageStore`] |
//! | `Notifier` | [`SmtpNotifier`] | [`ConsoleNotifier`] |
//! | `RecordStore` | `eventday-postgres` | [`InMemoryRecordStore`] |
//!
//! Each adapter enforces its own timeouts; the engine only sees the traits
//! from `eventday_core::environment`.

pub mod cloudinary;
pub mod console;
pub mod memory;
pub mod smtp;

pub use cloudinary::{CloudinaryConfig, CloudinaryImageStore, UnconfiguredImageStore};
pub use console::ConsoleNotifier;
pub use memory::InMemoryRecordStore;
pub use smtp::{SmtpConfig, SmtpNotifier};
