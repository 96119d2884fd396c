// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! EC2 worker pool compiler
//!
//! [`PoolCompiler`] expands each pool of a worker spec into one machine class
//! and one machine deployment per zone.  Image lookup, user data, zone
//! distribution and pool hashing are supplied through the traits in
//! [`images`], [`user_data`], [`distribute`] and [`pool_hash`].

pub mod block_devices;
pub mod compiler;
pub mod distribute;
pub mod example;
pub mod hash_seed;
pub mod iam_profile;
pub mod images;
pub mod instance_metadata;
pub mod pool_hash;
pub mod user_data;

pub use compiler::Error;
pub use compiler::PoolCompiler;
