//! # unrust
//!
//! Builds datasets pairing the documented source of each public function in a
//! published crate with Ghidra's decompilation of that function's compiled form.
//!
//! ## Architecture
//!
//! - **fetch**: Rate-limited HTTP client shared by every outbound request
//! - **registry**: Documentation host and registry addresses, crate listing
//! - **parse**: Typed extraction from documentation pages and source views
//! - **archive**: Registry archive download and extraction
//! - **cargo**: Dynamic library builds of unpacked crates
//! - **decompile**: Entry point to function matching with per-entry isolation
//! - **ghidra**: Ghidra headless decompiler sessions
//! - **builder**: Per-crate orchestration with per-function failure isolation
//! - **models**: Crate and function records
//! - **writer**: Dataset CSV and dependency file output

pub mod archive;
pub mod builder;
pub mod cargo;
pub mod cli;
pub mod config;
pub mod decompile;
pub mod error;
pub mod fetch;
pub mod ghidra;
pub mod models;
pub mod parse;
pub mod registry;
pub mod writer;
