// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The infrastructure status document produced by network provisioning

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;

/// What a piece of infrastructure was created for.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    Nodes,
    Public,
    Internal,
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Purpose::Nodes => "nodes",
            Purpose::Public => "public",
            Purpose::Internal => "internal",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureStatus {
    #[serde(default)]
    pub vpc: VpcStatus,
    #[serde(default)]
    pub iam: IamStatus,
    #[serde(default)]
    pub ec2: Ec2Status,
}

impl InfrastructureStatus {
    pub fn find_subnet(&self, purpose: Purpose, zone: &str) -> Option<&Subnet> {
        self.vpc
            .subnets
            .iter()
            .find(|s| s.purpose == purpose && s.zone == zone)
    }

    pub fn find_security_group(
        &self,
        purpose: Purpose,
    ) -> Option<&SecurityGroup> {
        self.vpc.security_groups.iter().find(|sg| sg.purpose == purpose)
    }

    pub fn find_instance_profile(
        &self,
        purpose: Purpose,
    ) -> Option<&InstanceProfile> {
        self.iam.instance_profiles.iter().find(|p| p.purpose == purpose)
    }

    /// The pre-existing SSH key pair, if the infrastructure created one.
    pub fn key_name(&self) -> Option<&str> {
        Some(self.ec2.key_name.as_str()).filter(|k| !k.is_empty())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VpcStatus {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub subnets: Vec<Subnet>,
    #[serde(default)]
    pub security_groups: Vec<SecurityGroup>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Subnet {
    pub id: String,
    pub purpose: Purpose,
    pub zone: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroup {
    pub id: String,
    pub purpose: Purpose,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IamStatus {
    #[serde(default)]
    pub instance_profiles: Vec<InstanceProfile>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstanceProfile {
    pub name: String,
    pub purpose: Purpose,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Ec2Status {
    #[serde(default)]
    pub key_name: String,
}
