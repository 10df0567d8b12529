//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![warn(rust_2018_idioms)]

pub mod api;
pub mod config;
pub mod debug;
pub mod error;
pub mod handler;
pub mod interconnect;
pub mod link;
pub mod manager;
pub mod netns;
pub mod notification;
pub mod punt;
pub mod southbound;
pub mod testing;

pub use manager::{Deps, PuntManager};
