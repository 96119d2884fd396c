// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Compiling worker pools into machine classes and machine deployments

use crate::block_devices::compute_block_devices;
use crate::block_devices::BlockDeviceError;
use crate::distribute::EvenZoneDistributor;
use crate::distribute::ZoneDistributor;
use crate::hash_seed::additional_hash_data;
use crate::iam_profile::resolve_iam_instance_profile;
use crate::iam_profile::IamProfileError;
use crate::images::append_machine_image;
use crate::images::ImageResolver;
use crate::instance_metadata::compute_instance_metadata;
use crate::instance_metadata::InstanceMetadataError;
use crate::pool_hash::PoolHasher;
use crate::pool_hash::Sha256PoolHasher;
use crate::user_data::UserDataFetcher;
use slog::debug;
use slog::info;
use slog::o;
use slog::Logger;
use std::collections::BTreeMap;
use worker_types::infrastructure::Purpose;
use worker_types::machine::CompiledWorker;
use worker_types::machine::MachineClass;
use worker_types::machine::MachineClassSecret;
use worker_types::machine::MachineConfiguration;
use worker_types::machine::MachineDeployment;
use worker_types::machine::MachineImage;
use worker_types::machine::MachineNodeTemplate;
use worker_types::machine::NetworkInterface;
use worker_types::machine::OperatingSystem;
use worker_types::pool::WorkerPool;
use worker_types::provider_config::ProviderConfig;
use worker_types::worker::ClusterInfo;
use worker_types::worker::WorkerSpec;

/// Deployment label expected by the EBS CSI driver's zone-aware scheduling.
pub const CSI_TOPOLOGY_LABEL: &str = "topology.ebs.csi.aws.com/zone";
/// Machine class label carrying the class's zone.
pub const ZONE_LABEL: &str = "failure-domain.beta.kubernetes.io/zone";
const PURPOSE_LABEL: &str = "gardener.cloud/purpose";
const PURPOSE_MACHINE_CLASS: &str = "machineclass";
const NODE_ROLE_TAG: &str = "kubernetes.io/role/node";

const AUTOSCALER_SCALE_DOWN_UTILIZATION_THRESHOLD: &str =
    "autoscaler.gardener.cloud/scale-down-utilization-threshold";
const AUTOSCALER_SCALE_DOWN_GPU_UTILIZATION_THRESHOLD: &str =
    "autoscaler.gardener.cloud/scale-down-gpu-utilization-threshold";
const AUTOSCALER_SCALE_DOWN_UNNEEDED_TIME: &str =
    "autoscaler.gardener.cloud/scale-down-unneeded-time";
const AUTOSCALER_SCALE_DOWN_UNREADY_TIME: &str =
    "autoscaler.gardener.cloud/scale-down-unready-time";
const AUTOSCALER_MAX_NODE_PROVISION_TIME: &str =
    "autoscaler.gardener.cloud/max-node-provision-time";

static EVEN_ZONE_DISTRIBUTOR: EvenZoneDistributor = EvenZoneDistributor;
static SHA256_POOL_HASHER: Sha256PoolHasher = Sha256PoolHasher;

/// Errors from [`PoolCompiler::compile`].  Any error aborts the whole
/// compilation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not decode provider config of pool {pool}")]
    ConfigDecode {
        pool: String,
        #[source]
        err: serde_json::Error,
    },
    #[error("failed to compute identity hash of pool {pool}")]
    PoolHash {
        pool: String,
        #[source]
        err: anyhow::Error,
    },
    #[error(
        "no image {name} {version} for region {region} and architecture \
         {architecture} (pool {pool})"
    )]
    ImageNotFound {
        pool: String,
        name: String,
        version: String,
        region: String,
        architecture: String,
    },
    #[error("failed to compute block devices of pool {pool}")]
    BlockDevices {
        pool: String,
        #[source]
        err: BlockDeviceError,
    },
    #[error("failed to resolve IAM instance profile of pool {pool}")]
    IamProfile {
        pool: String,
        #[source]
        err: IamProfileError,
    },
    #[error("failed to compute instance metadata options of pool {pool}")]
    InstanceMetadata {
        pool: String,
        #[source]
        err: InstanceMetadataError,
    },
    #[error("failed to fetch user data of pool {pool}")]
    UserData {
        pool: String,
        #[source]
        err: anyhow::Error,
    },
    #[error("no subnet for purpose {purpose} in zone {zone} (pool {pool})")]
    SubnetNotFound { pool: String, zone: String, purpose: Purpose },
    #[error("no security group for purpose {purpose}")]
    SecurityGroupNotFound { purpose: Purpose },
}

/// Turns a [`WorkerSpec`] into machine classes and machine deployments.
///
/// The compiler holds no state between calls.  Given the same spec, cluster
/// and collaborator answers, [`PoolCompiler::compile`] produces the same
/// output.
pub struct PoolCompiler<'a> {
    log: Logger,
    images: &'a dyn ImageResolver,
    user_data: &'a dyn UserDataFetcher,
    distributor: &'a dyn ZoneDistributor,
    hasher: &'a dyn PoolHasher,
}

/// Everything produced for one pool; appended to the [`CompiledWorker`] once
/// the whole pool compiled.
struct CompiledPool {
    machine_classes: Vec<MachineClass>,
    machine_deployments: Vec<MachineDeployment>,
    machine_image: MachineImage,
}

impl<'a> PoolCompiler<'a> {
    /// Create a compiler using [`EvenZoneDistributor`] and
    /// [`Sha256PoolHasher`].
    pub fn new(
        log: &Logger,
        images: &'a dyn ImageResolver,
        user_data: &'a dyn UserDataFetcher,
    ) -> Self {
        PoolCompiler {
            log: log.new(o!("component" => "PoolCompiler")),
            images,
            user_data,
            distributor: &EVEN_ZONE_DISTRIBUTOR,
            hasher: &SHA256_POOL_HASHER,
        }
    }

    pub fn with_distributor(
        mut self,
        distributor: &'a dyn ZoneDistributor,
    ) -> Self {
        self.distributor = distributor;
        self
    }

    pub fn with_hasher(mut self, hasher: &'a dyn PoolHasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Compile every pool of `spec`, in declaration order.
    ///
    /// Nothing is returned unless every pool and zone compiled.
    pub async fn compile(
        &self,
        spec: &WorkerSpec,
        cluster: &ClusterInfo,
    ) -> Result<CompiledWorker, Error> {
        let nodes_security_group = spec
            .infrastructure_status
            .find_security_group(Purpose::Nodes)
            .ok_or(Error::SecurityGroupNotFound { purpose: Purpose::Nodes })?;

        let mut compiled = CompiledWorker::default();
        for pool in &spec.pools {
            let CompiledPool {
                machine_classes,
                machine_deployments,
                machine_image,
            } = self
                .compile_pool(spec, cluster, pool, &nodes_security_group.id)
                .await?;
            compiled.machine_classes.extend(machine_classes);
            compiled.machine_deployments.extend(machine_deployments);
            append_machine_image(&mut compiled.machine_images, machine_image);
        }

        info!(
            self.log,
            "compiled worker pools";
            "namespace" => &spec.namespace,
            "pools" => spec.pools.len(),
            "machine_deployments" => compiled.machine_deployments.len(),
            "machine_images" => compiled.machine_images.len(),
        );
        Ok(compiled)
    }

    async fn compile_pool(
        &self,
        spec: &WorkerSpec,
        cluster: &ClusterInfo,
        pool: &WorkerPool,
        security_group_id: &str,
    ) -> Result<CompiledPool, Error> {
        let log = self.log.new(o!("pool" => pool.name.clone()));
        let infra = &spec.infrastructure_status;
        let pool_name = || pool.name.clone();

        let config = ProviderConfig::decode(pool.provider_config.as_ref())
            .map_err(|err| Error::ConfigDecode { pool: pool_name(), err })?;

        let pool_hash = self
            .hasher
            .pool_hash(pool, cluster, &additional_hash_data(pool))
            .map_err(|err| Error::PoolHash { pool: pool_name(), err })?;

        let architecture = pool.architecture();
        let image = &pool.machine_image;
        let ami = self
            .images
            .resolve(&image.name, &image.version, &spec.region, architecture)
            .ok_or_else(|| Error::ImageNotFound {
                pool: pool_name(),
                name: image.name.clone(),
                version: image.version.clone(),
                region: spec.region.clone(),
                architecture: architecture.to_string(),
            })?;
        debug!(
            log,
            "resolved machine image";
            "ami" => &ami,
            "hash" => &pool_hash,
        );

        let block_devices = compute_block_devices(
            pool.volume.as_ref(),
            &pool.data_volumes,
            &config,
        )
        .map_err(|err| Error::BlockDevices { pool: pool_name(), err })?;

        let iam_instance_profile = resolve_iam_instance_profile(
            config.iam_instance_profile.as_ref(),
            infra,
        )
        .map_err(|err| Error::IamProfile { pool: pool_name(), err })?;

        let instance_metadata_options = compute_instance_metadata(
            config.instance_metadata_options.as_ref(),
            &cluster.kubernetes_version,
        )
        .map_err(|err| Error::InstanceMetadata { pool: pool_name(), err })?;

        let user_data = self
            .user_data
            .fetch(&spec.namespace, pool)
            .await
            .map_err(|err| Error::UserData { pool: pool_name(), err })?;

        let mut base_tags = BTreeMap::from([
            (
                format!("kubernetes.io/cluster/{}", spec.namespace),
                "1".to_string(),
            ),
            (NODE_ROLE_TAG.to_string(), "1".to_string()),
        ]);
        base_tags.extend(pool.labels.clone());
        let tags = base_tags;

        let node_template =
            config.node_template.as_ref().or(pool.node_template.as_ref());
        let operating_system = (!image.name.is_empty()
            && !image.version.is_empty())
        .then(|| OperatingSystem {
            operating_system_name: image.name.clone(),
            operating_system_version: image.version.clone(),
        });
        let machine_configuration = machine_configuration(pool);
        let autoscaler_annotations = cluster_autoscaler_annotations(pool);

        let zone_count = pool.zones.len();
        let mut machine_classes = Vec::with_capacity(zone_count);
        let mut machine_deployments = Vec::with_capacity(zone_count);

        for (zone_index, zone) in pool.zones.iter().enumerate() {
            let subnet = infra.find_subnet(Purpose::Nodes, zone).ok_or_else(
                || Error::SubnetNotFound {
                    pool: pool_name(),
                    zone: zone.clone(),
                    purpose: Purpose::Nodes,
                },
            )?;

            let deployment_name = format!(
                "{}-{}-z{}",
                spec.namespace,
                pool.name,
                zone_index + 1
            );
            let class_name = format!("{deployment_name}-{pool_hash}");

            machine_classes.push(MachineClass {
                name: class_name.clone(),
                labels: BTreeMap::from([(
                    ZONE_LABEL.to_string(),
                    zone.clone(),
                )]),
                ami: ami.clone(),
                region: spec.region.clone(),
                machine_type: pool.machine_type.clone(),
                iam_instance_profile: iam_instance_profile.clone(),
                network_interfaces: vec![NetworkInterface {
                    subnet_id: subnet.id.clone(),
                    security_group_ids: vec![security_group_id.to_string()],
                }],
                tags: tags.clone(),
                credentials_secret_ref: spec.secret_ref.clone(),
                secret: MachineClassSecret {
                    cloud_config: user_data.clone(),
                    labels: BTreeMap::from([(
                        PURPOSE_LABEL.to_string(),
                        PURPOSE_MACHINE_CLASS.to_string(),
                    )]),
                },
                block_devices: block_devices.clone(),
                instance_metadata_options: instance_metadata_options.clone(),
                key_name: infra.key_name().map(str::to_string),
                node_template: node_template.map(|t| MachineNodeTemplate {
                    capacity: t.capacity.clone(),
                    instance_type: pool.machine_type.clone(),
                    region: spec.region.clone(),
                    zone: zone.clone(),
                    architecture: architecture.to_string(),
                }),
                operating_system: operating_system.clone(),
            });

            // The topology label goes underneath the pool's labels so that a
            // pool can pin its own value.
            let mut labels = BTreeMap::from([(
                CSI_TOPOLOGY_LABEL.to_string(),
                zone.clone(),
            )]);
            labels.extend(pool.labels.clone());

            let d = self.distributor;
            machine_deployments.push(MachineDeployment {
                name: deployment_name,
                class_name: class_name.clone(),
                secret_name: class_name.clone(),
                minimum: d.distribute_over_zones(
                    zone_index,
                    pool.minimum,
                    zone_count,
                ),
                maximum: d.distribute_over_zones(
                    zone_index,
                    pool.maximum,
                    zone_count,
                ),
                max_surge: d.distribute_int_or_percent(
                    zone_index,
                    pool.max_surge,
                    zone_count,
                    pool.maximum,
                ),
                max_unavailable: d.distribute_int_or_percent(
                    zone_index,
                    pool.max_unavailable,
                    zone_count,
                    pool.minimum,
                ),
                labels,
                annotations: pool.annotations.clone(),
                taints: pool.taints.clone(),
                machine_configuration: machine_configuration.clone(),
                cluster_autoscaler_annotations: autoscaler_annotations.clone(),
            });

            let zone_log = log.new(o!("zone" => zone.clone()));
            debug!(
                zone_log,
                "compiled zone";
                "machine_class" => &class_name,
                "subnet" => &subnet.id,
            );
        }

        info!(
            log,
            "compiled pool";
            "zones" => zone_count,
            "hash" => &pool_hash,
            "block_devices" => block_devices.len(),
        );

        Ok(CompiledPool {
            machine_classes,
            machine_deployments,
            machine_image: MachineImage {
                name: image.name.clone(),
                version: image.version.clone(),
                ami,
                architecture: architecture.to_string(),
            },
        })
    }
}

fn machine_configuration(pool: &WorkerPool) -> Option<MachineConfiguration> {
    let settings = pool.machine_controller_settings.as_ref()?;
    Some(MachineConfiguration {
        machine_drain_timeout: settings.machine_drain_timeout.clone(),
        machine_health_timeout: settings.machine_health_timeout.clone(),
        machine_creation_timeout: settings.machine_creation_timeout.clone(),
        max_evict_retries: settings.max_evict_retries,
        node_conditions: (!settings.node_conditions.is_empty())
            .then(|| settings.node_conditions.join(",")),
    })
}

fn cluster_autoscaler_annotations(
    pool: &WorkerPool,
) -> BTreeMap<String, String> {
    let mut annotations = BTreeMap::new();
    let Some(options) = &pool.cluster_autoscaler else {
        return annotations;
    };

    let thresholds = [
        (
            AUTOSCALER_SCALE_DOWN_UTILIZATION_THRESHOLD,
            options.scale_down_utilization_threshold,
        ),
        (
            AUTOSCALER_SCALE_DOWN_GPU_UTILIZATION_THRESHOLD,
            options.scale_down_gpu_utilization_threshold,
        ),
    ];
    for (key, value) in thresholds {
        if let Some(value) = value {
            annotations.insert(key.to_string(), value.to_string());
        }
    }

    let durations = [
        (
            AUTOSCALER_SCALE_DOWN_UNNEEDED_TIME,
            &options.scale_down_unneeded_time,
        ),
        (AUTOSCALER_SCALE_DOWN_UNREADY_TIME, &options.scale_down_unready_time),
        (AUTOSCALER_MAX_NODE_PROVISION_TIME, &options.max_node_provision_time),
    ];
    for (key, value) in durations {
        if let Some(value) = value {
            annotations.insert(key.to_string(), value.clone());
        }
    }

    annotations
}
