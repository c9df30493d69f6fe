// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service configuration
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables and command-line flags (see `crate::cli`).

pub mod service;

pub use service::{Backend, ConfigError, EngineConfig, ServiceConfig};
