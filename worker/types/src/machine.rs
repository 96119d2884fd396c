// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Provisioning resources produced for the machine orchestrator
//!
//! Field names serialize to the camelCase shape the machine class templates
//! consume, so the JSON form of these types can be handed to a renderer
//! as-is.

use crate::byte_count::ByteCount;
use crate::int_or_percent::IntOrPercent;
use crate::pool::Taint;
use crate::provider_config::HttpTokens;
use crate::worker::SecretReference;
use base64::Engine;
use serde::Serialize;
use serde::Serializer;
use std::collections::BTreeMap;

/// The result of one compilation: every class and deployment for every pool,
/// in pool order and then zone order, plus the images they use.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledWorker {
    pub machine_classes: Vec<MachineClass>,
    pub machine_deployments: Vec<MachineDeployment>,
    pub machine_images: Vec<MachineImage>,
}

/// Immutable template for creating one instance in one zone.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineClass {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub ami: String,
    pub region: String,
    pub machine_type: String,
    pub iam_instance_profile: IamInstanceProfile,
    pub network_interfaces: Vec<NetworkInterface>,
    pub tags: BTreeMap<String, String>,
    pub credentials_secret_ref: SecretReference,
    pub secret: MachineClassSecret,
    pub block_devices: Vec<BlockDevice>,
    pub instance_metadata_options: InstanceMetadataOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_template: Option<MachineNodeTemplate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operating_system: Option<OperatingSystem>,
}

/// Instance profile attached to created machines, by name or by ARN.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IamInstanceProfile {
    Name(String),
    Arn(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NetworkInterface {
    #[serde(rename = "subnetID")]
    pub subnet_id: String,
    #[serde(rename = "securityGroupIDs")]
    pub security_group_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineClassSecret {
    /// Raw bootstrap payload, serialized as standard base64 so that
    /// compressed or otherwise binary user data survives unchanged.
    #[serde(serialize_with = "serialize_base64")]
    pub cloud_config: Vec<u8>,
    pub labels: BTreeMap<String, String>,
}

fn serialize_base64<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(
        &base64::engine::general_purpose::STANDARD.encode(bytes),
    )
}

/// One entry in an instance's block device mapping.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BlockDevice {
    /// The root disk is only named explicitly once data disks are attached.
    Root {
        #[serde(rename = "deviceName", skip_serializing_if = "Option::is_none")]
        device_name: Option<String>,
        ebs: Ebs,
    },
    Data {
        #[serde(rename = "deviceName")]
        device_name: String,
        ebs: Ebs,
    },
}

impl BlockDevice {
    pub fn device_name(&self) -> Option<&str> {
        match self {
            BlockDevice::Root { device_name, .. } => device_name.as_deref(),
            BlockDevice::Data { device_name, .. } => Some(device_name),
        }
    }

    pub fn ebs(&self) -> &Ebs {
        match self {
            BlockDevice::Root { ebs, .. } | BlockDevice::Data { ebs, .. } => {
                ebs
            }
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, BlockDevice::Root { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ebs {
    pub volume_size: ByteCount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,
    pub encrypted: bool,
    pub delete_on_termination: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iops: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput: Option<i64>,
    #[serde(rename = "snapshotID", skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
}

/// Instance metadata service settings.  An absent field means "platform
/// default", not "disabled".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceMetadataOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_put_response_hop_limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_tokens: Option<HttpTokens>,
}

impl InstanceMetadataOptions {
    pub fn is_empty(&self) -> bool {
        self.http_put_response_hop_limit.is_none() && self.http_tokens.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineNodeTemplate {
    pub capacity: BTreeMap<String, String>,
    pub instance_type: String,
    pub region: String,
    pub zone: String,
    pub architecture: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatingSystem {
    pub operating_system_name: String,
    pub operating_system_version: String,
}

/// Mutable scaling directive for one zone of a pool.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineDeployment {
    pub name: String,
    pub class_name: String,
    pub secret_name: String,
    pub minimum: u32,
    pub maximum: u32,
    pub max_surge: IntOrPercent,
    pub max_unavailable: IntOrPercent,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub taints: Vec<Taint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_configuration: Option<MachineConfiguration>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub cluster_autoscaler_annotations: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_drain_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_health_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_creation_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_evict_retries: Option<u32>,
    /// Comma-separated node condition types.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_conditions: Option<String>,
}

/// An image in use by at least one pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineImage {
    pub name: String,
    pub version: String,
    pub ami: String,
    pub architecture: String,
}
