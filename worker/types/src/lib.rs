// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Types shared by the EC2 worker pool compiler and its tooling
//!
//! The input side ([`worker`], [`pool`], [`provider_config`],
//! [`infrastructure`]) deserializes from the camelCase documents a cluster
//! control plane hands over.  The output side ([`machine`]) only serializes.

pub mod byte_count;
pub mod infrastructure;
pub mod int_or_percent;
pub mod machine;
pub mod pool;
pub mod provider_config;
pub mod worker;
