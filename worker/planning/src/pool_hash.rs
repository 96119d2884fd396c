// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pool identity hashes
//!
//! A pool's hash is part of its machine class names.  When the hash changes,
//! new classes are produced and the orchestrator replaces the pool's
//! machines.

use sha2::Digest;
use sha2::Sha256;
use worker_types::pool::WorkerPool;
use worker_types::worker::ClusterInfo;

/// Number of hex characters of the digest kept in class names.
pub const POOL_HASH_LEN: usize = 5;

pub trait PoolHasher: Send + Sync {
    /// Compute a short, stable fingerprint of `pool` within `cluster`.
    /// `additional_data` is appended to the hashed fields; equal inputs must
    /// always produce equal output.
    fn pool_hash(
        &self,
        pool: &WorkerPool,
        cluster: &ClusterInfo,
        additional_data: &[String],
    ) -> Result<String, anyhow::Error>;
}

/// SHA-256 over the fields that require new machines when they change.
///
/// Labels, annotations, taints and scaling bounds are not hashed; they apply
/// to running machines in place.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256PoolHasher;

impl PoolHasher for Sha256PoolHasher {
    fn pool_hash(
        &self,
        pool: &WorkerPool,
        cluster: &ClusterInfo,
        additional_data: &[String],
    ) -> Result<String, anyhow::Error> {
        let mut fields: Vec<String> = vec![
            pool.name.clone(),
            pool.machine_type.clone(),
            pool.machine_image.name.clone(),
            pool.machine_image.version.clone(),
            pool.architecture().to_string(),
            cluster.kubernetes_version.clone(),
        ];
        if let Some(volume) = &pool.volume {
            fields.push(volume.size.clone());
            if let Some(volume_type) = &volume.volume_type {
                fields.push(volume_type.clone());
            }
        }
        if let Some(raw) = &pool.provider_config {
            fields.push(serde_json::to_string(raw)?);
        }
        fields.extend(additional_data.iter().cloned());

        let mut hasher = Sha256::new();
        for field in &fields {
            // Length-prefix each field so that ("ab", "c") and ("a", "bc")
            // hash differently.
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        let digest = hex::encode(hasher.finalize());
        Ok(digest[..POOL_HASH_LEN].to_string())
    }
}
