// Copyright 2025 Foglink Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Foglink CLI
//!
//! Command-line front end for the foglink connectivity core.
//!
//! ## Architecture
//!
//! The binary parses arguments with `argh`, resolves [`settings::Settings`]
//! (flag, then environment variable, then default) and builds one
//! [`foglink_discovery::Session`] backed by a file store in the state
//! directory. Each subcommand is a function in [`commands`].
//!
//! ## Key Commands
//!
//! - `foglink add` / `remove` / `list` / `use` / `rename`: manage the registry
//! - `foglink probe`: probe one instance and reconcile its status
//! - `foglink discover` / `status`: bulk discovery with a remedy suggestion
//! - `foglink proxy-config`: show or push the relay mapping
//! - `foglink get`: failover GET against the best endpoint (raw JSON output)

pub mod commands;
pub mod settings;
