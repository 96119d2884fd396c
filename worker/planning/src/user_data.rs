// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Node bootstrap payloads

use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::BTreeMap;
use worker_types::pool::WorkerPool;

/// Fetches the cloud-config a pool's machines boot with.
///
/// Compilation awaits this once per pool.  Dropping the compilation future
/// drops the in-flight fetch with it.
#[async_trait]
pub trait UserDataFetcher: Send + Sync {
    async fn fetch(
        &self,
        namespace: &str,
        pool: &WorkerPool,
    ) -> Result<Vec<u8>, anyhow::Error>;
}

/// Payloads held in memory, per pool name with an optional fallback.
#[derive(Clone, Debug, Default)]
pub struct StaticUserData {
    default: Option<Vec<u8>>,
    per_pool: BTreeMap<String, Vec<u8>>,
}

impl StaticUserData {
    pub fn new(default: Option<Vec<u8>>) -> Self {
        StaticUserData { default, per_pool: BTreeMap::new() }
    }

    pub fn with_pool(
        mut self,
        pool: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        self.per_pool.insert(pool.into(), data.into());
        self
    }
}

#[async_trait]
impl UserDataFetcher for StaticUserData {
    async fn fetch(
        &self,
        namespace: &str,
        pool: &WorkerPool,
    ) -> Result<Vec<u8>, anyhow::Error> {
        self.per_pool
            .get(&pool.name)
            .or(self.default.as_ref())
            .cloned()
            .ok_or_else(|| {
                anyhow!("no user data for pool {} in {namespace}", pool.name)
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_static_user_data() {
        let user_data = StaticUserData::new(Some(b"#cloud-config\n".to_vec()))
            .with_pool("gpu", "#cloud-config\nruncmd: [nvidia-smi]\n");
        let pool = |name: &str| WorkerPool {
            name: name.to_string(),
            ..Default::default()
        };

        assert_eq!(
            user_data.fetch("ns", &pool("gpu")).await.unwrap(),
            b"#cloud-config\nruncmd: [nvidia-smi]\n"
        );
        assert_eq!(
            user_data.fetch("ns", &pool("cpu")).await.unwrap(),
            b"#cloud-config\n"
        );

        let err = StaticUserData::default()
            .fetch("ns", &pool("cpu"))
            .await
            .expect_err("no payload configured");
        assert_eq!(err.to_string(), "no user data for pool cpu in ns");
    }
}
