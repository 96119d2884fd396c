// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration file for `worker-cli compile`

use camino::Utf8Path;
use camino::Utf8PathBuf;
use dropshot::ConfigLogging;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use worker_planning::images::ImageCatalog;
use worker_planning::images::ImageCatalogEntry;
use worker_planning::user_data::StaticUserData;
use worker_types::worker::ClusterInfo;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Logging configuration.  Without it, logs go to the terminal at the
    /// level given on the command line.
    pub log: Option<ConfigLogging>,
    pub cluster: ClusterConfig,
    /// AMIs available to the compiled pools.
    #[serde(default)]
    pub images: Vec<ImageCatalogEntry>,
    #[serde(default)]
    pub user_data: UserDataConfig,
}

impl Config {
    /// Load a `Config` from the given TOML file
    pub fn from_file(path: &Utf8Path) -> Result<Config, LoadError> {
        let file_contents = std::fs::read_to_string(path)
            .map_err(|err| LoadError::Io { path: path.into(), err })?;
        let config_parsed: Config = toml::from_str(&file_contents)
            .map_err(|err| LoadError::Parse { path: path.into(), err })?;
        Ok(config_parsed)
    }

    pub fn image_catalog(&self) -> ImageCatalog {
        ImageCatalog::new(self.images.clone())
    }

    pub fn static_user_data(&self) -> StaticUserData {
        self.user_data.pools.iter().fold(
            StaticUserData::new(
                self.user_data.default.as_ref().map(|d| d.clone().into_bytes()),
            ),
            |user_data, (pool, data)| user_data.with_pool(pool, data.as_str()),
        )
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterConfig {
    pub name: String,
    pub kubernetes_version: String,
}

impl From<ClusterConfig> for ClusterInfo {
    fn from(config: ClusterConfig) -> ClusterInfo {
        ClusterInfo {
            name: config.name,
            kubernetes_version: config.kubernetes_version,
        }
    }
}

/// Cloud-config payloads, per pool name with an optional fallback.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UserDataConfig {
    pub default: Option<String>,
    #[serde(default)]
    pub pools: BTreeMap<String, String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("error reading \"{path}\": {err}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("error parsing \"{path}\": {err}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        err: toml::de::Error,
    },
}
