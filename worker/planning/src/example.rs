// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Example worker specs

use crate::compiler::PoolCompiler;
use crate::images::ImageCatalog;
use crate::images::ImageCatalogEntry;
use crate::user_data::StaticUserData;
use slog::Logger;
use std::collections::BTreeMap;
use worker_types::infrastructure::Ec2Status;
use worker_types::infrastructure::IamStatus;
use worker_types::infrastructure::InfrastructureStatus;
use worker_types::infrastructure::InstanceProfile;
use worker_types::infrastructure::Purpose;
use worker_types::infrastructure::SecurityGroup;
use worker_types::infrastructure::Subnet;
use worker_types::infrastructure::VpcStatus;
use worker_types::int_or_percent::IntOrPercent;
use worker_types::pool::MachineImageRef;
use worker_types::pool::Volume;
use worker_types::pool::WorkerPool;
use worker_types::pool::DEFAULT_ARCHITECTURE;
use worker_types::worker::ClusterInfo;
use worker_types::worker::SecretReference;
use worker_types::worker::WorkerSpec;

const NAMESPACE: &str = "shoot--dev--demo";
const REGION: &str = "eu-west-1";
const IMAGE_NAME: &str = "gardenlinux";
const IMAGE_VERSION: &str = "1592.1.0";

/// A small but complete worker: one pool spread over `nzones` zones, with
/// the infrastructure, image catalog and user data needed to compile it.
pub struct ExampleSystem {
    pub spec: WorkerSpec,
    pub cluster: ClusterInfo,
    pub images: ImageCatalog,
    pub user_data: StaticUserData,
}

impl ExampleSystem {
    pub const AMI: &'static str = "ami-0a1b2c3d4e5f60718";

    /// Maximum number of zones: one per letter `a` through `z`.
    pub const MAX_ZONES: usize = 26;

    /// Build an example whose single pool spans `nzones` zones.
    ///
    /// # Panics
    ///
    /// Panics if `nzones` exceeds [`ExampleSystem::MAX_ZONES`].
    pub fn new(nzones: usize) -> ExampleSystem {
        assert!(
            nzones <= Self::MAX_ZONES,
            "example supports at most {} zones, got {nzones}",
            Self::MAX_ZONES,
        );
        let zones: Vec<String> = (b'a'..=b'z')
            .take(nzones)
            .map(|letter| format!("{REGION}{}", char::from(letter)))
            .collect();

        let infrastructure_status = InfrastructureStatus {
            vpc: VpcStatus {
                id: "vpc-0123456789".to_string(),
                subnets: zones
                    .iter()
                    .flat_map(|zone| {
                        [Purpose::Nodes, Purpose::Public].map(|purpose| Subnet {
                            id: format!("subnet-{purpose}-{zone}"),
                            purpose,
                            zone: zone.clone(),
                        })
                    })
                    .collect(),
                security_groups: vec![SecurityGroup {
                    id: "sg-nodes".to_string(),
                    purpose: Purpose::Nodes,
                }],
            },
            iam: IamStatus {
                instance_profiles: vec![InstanceProfile {
                    name: format!("{NAMESPACE}-nodes"),
                    purpose: Purpose::Nodes,
                }],
            },
            ec2: Ec2Status { key_name: format!("{NAMESPACE}-ssh") },
        };

        let pool = WorkerPool {
            name: "cpu-worker".to_string(),
            zones,
            machine_type: "m5.large".to_string(),
            machine_image: MachineImageRef {
                name: IMAGE_NAME.to_string(),
                version: IMAGE_VERSION.to_string(),
            },
            volume: Some(Volume {
                size: "50Gi".to_string(),
                volume_type: Some("gp3".to_string()),
                encrypted: Some(true),
            }),
            minimum: 2,
            maximum: 5,
            max_surge: IntOrPercent::Int(1),
            labels: BTreeMap::from([(
                "worker.gardener.cloud/pool".to_string(),
                "cpu-worker".to_string(),
            )]),
            ..Default::default()
        };

        let spec = WorkerSpec {
            namespace: NAMESPACE.to_string(),
            region: REGION.to_string(),
            secret_ref: SecretReference {
                name: "cloudprovider".to_string(),
                namespace: NAMESPACE.to_string(),
            },
            infrastructure_status,
            pools: vec![pool],
        };

        let images = ImageCatalog::new(vec![ImageCatalogEntry {
            name: IMAGE_NAME.to_string(),
            version: IMAGE_VERSION.to_string(),
            region: REGION.to_string(),
            architecture: DEFAULT_ARCHITECTURE.to_string(),
            ami: Self::AMI.to_string(),
        }]);

        ExampleSystem {
            spec,
            cluster: ClusterInfo {
                name: NAMESPACE.to_string(),
                kubernetes_version: "1.30.2".to_string(),
            },
            images,
            user_data: StaticUserData::new(Some(b"#cloud-config\n".to_vec())),
        }
    }

    /// Zones of the first pool, or none if every pool was removed.
    pub fn zones(&self) -> &[String] {
        self.spec
            .pools
            .first()
            .map(|pool| pool.zones.as_slice())
            .unwrap_or_default()
    }

    /// A compiler backed by this example's image catalog and user data.
    pub fn compiler(&self, log: &Logger) -> PoolCompiler<'_> {
        PoolCompiler::new(log, &self.images, &self.user_data)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_zone_names() {
        let example = ExampleSystem::new(ExampleSystem::MAX_ZONES);
        assert_eq!(example.zones().len(), ExampleSystem::MAX_ZONES);
        assert_eq!(example.zones()[0], "eu-west-1a");
        assert_eq!(example.zones()[25], "eu-west-1z");
    }

    #[test]
    #[should_panic(expected = "at most 26 zones")]
    fn test_too_many_zones() {
        let _ = ExampleSystem::new(ExampleSystem::MAX_ZONES + 1);
    }

    #[test]
    fn test_zones_without_pools() {
        let mut example = ExampleSystem::new(2);
        example.spec.pools.clear();
        assert!(example.zones().is_empty());
    }
}
