//! Release-trust pipeline for the itrust updater.
//!
//! This crate provides the pieces shared by the publisher and the client of a
//! signed-release repository. A publisher signs release manifests with an
//! Ed25519 key and uploads artefacts to a plain HTTP object store; a client
//! pins the publisher's public key by SHA-256 fingerprint, fetches and
//! verifies the manifest, downloads the artefact while hashing it inline, and
//! atomically swaps the installed binary.
//!
//! ```ignore
//! use updater::{backend::Backend, fetch, install, nexus::NexusBackend};
//!
//! # async fn demo() -> updater::Result<()> {
//! let backend = NexusBackend::new("https://nexus.example.com/repository/apps", "", "");
//! let (manifest, _pub_key) = fetch::fetch_and_verify_manifest(
//!     &backend,
//!     "tpm-tool",
//!     "stable",
//!     "",
//!     "repo/public-keys/ed25519.pub",
//!     "4f0c...pinned-hex...",
//! )
//! .await?;
//!
//! let artifact = manifest.find_artifact("linux", "amd64")?;
//! let body = backend.get(&artifact.url).await?;
//! install::install_artifact(
//!     body,
//!     std::path::Path::new("/usr/local/bin/tpm-tool"),
//!     &artifact.sha256,
//!     std::path::Path::new("/var/lib/itrust-updater"),
//!     "tpm-tool",
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
mod error;
pub mod fetch;
pub mod install;
pub mod jcs;
pub mod manifest;
pub mod nexus;
pub mod paths;
pub mod publish;
pub mod repo;
pub mod secrets;
pub mod sign;

pub use error::{Result, UpdaterError};
