// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::infrastructure::InfrastructureStatus;
use crate::pool::WorkerPool;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// Everything the compiler needs to know about one cluster's workers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSpec {
    /// Control-plane namespace of the cluster; prefixes every generated name.
    pub namespace: String,
    pub region: String,
    /// Cloud credentials the machine orchestrator should use.
    pub secret_ref: SecretReference,
    pub infrastructure_status: InfrastructureStatus,
    pub pools: Vec<WorkerPool>,
}

#[derive(
    Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    pub name: String,
    pub namespace: String,
}

/// The parts of the cluster's identity that feed into compilation.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    pub name: String,
    /// Control-plane version, e.g. `1.30.2`.
    pub kubernetes_version: String,
}
