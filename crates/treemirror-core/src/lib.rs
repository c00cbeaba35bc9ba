//! TreeMirror Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Node`, `NodePath`, `MirrorState`
//! - **Newtypes** - `NodeId`, `ChangeToken`, `PageCursor`, `RunId`
//! - **Node normalization** - mapping raw remote records into domain `Node`s
//! - **Port definitions** - Traits for adapters: `ITreeClient`, `IRecordStore`
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure mirroring logic with no external
//! dependencies. Ports define trait interfaces that adapter crates implement
//! (`treemirror-drive` for the remote tree, `treemirror-store` for the record
//! store). The sync engine in `treemirror-sync` orchestrates domain entities
//! through the port interfaces.

pub mod config;
pub mod domain;
pub mod normalize;
pub mod ports;
