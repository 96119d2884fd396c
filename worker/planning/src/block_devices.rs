// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Block device mapping for a pool's root and data volumes

use worker_types::byte_count::ByteCount;
use worker_types::byte_count::ByteCountParseError;
use worker_types::machine::BlockDevice;
use worker_types::machine::Ebs;
use worker_types::pool::DataVolume;
use worker_types::pool::Volume;
use worker_types::provider_config::ProviderConfig;

/// Device name given to the root disk once any data disk is attached.
pub const ROOT_DEVICE_NAME: &str = "/root";

// EC2 recommends /dev/sd[f-p] for EBS data volumes.
const DATA_DEVICE_PREFIX: &str = "/dev/sd";
const DATA_DEVICE_SUFFIXES: &str = "fghijklmnop";

/// Maximum number of data volumes a single pool can declare.
pub const MAX_DATA_VOLUMES: usize = DATA_DEVICE_SUFFIXES.len();

#[derive(Debug, thiserror::Error)]
pub enum BlockDeviceError {
    #[error("pool does not declare a root volume")]
    MissingRootVolume,
    #[error("invalid size {size:?} for volume {volume}")]
    SizeParse {
        volume: String,
        size: String,
        #[source]
        err: ByteCountParseError,
    },
    #[error(
        "cannot assign a device name to data volume {volume}: \
         at most {MAX_DATA_VOLUMES} data volumes are supported"
    )]
    DeviceNamingExhausted { volume: String },
}

/// Build the block device mapping for one pool: the root device first, then
/// one device per data volume in ascending name order.
///
/// Data volumes are sorted before device names are handed out so that the
/// name a volume receives does not depend on declaration order.
pub fn compute_block_devices(
    root: Option<&Volume>,
    data_volumes: &[DataVolume],
    config: &ProviderConfig,
) -> Result<Vec<BlockDevice>, BlockDeviceError> {
    let root = root.ok_or(BlockDeviceError::MissingRootVolume)?;
    let mut root_ebs = compute_ebs(
        "root",
        &root.size,
        root.volume_type.as_ref(),
        root.encrypted,
    )?;
    if let Some(overrides) = &config.volume {
        if let Some(iops) = overrides.iops {
            root_ebs.iops = Some(iops);
        }
        if let Some(throughput) = overrides.throughput {
            root_ebs.throughput = Some(throughput);
        }
    }

    let root_device_name =
        (!data_volumes.is_empty()).then(|| ROOT_DEVICE_NAME.to_string());
    let mut devices = vec![BlockDevice::Root {
        device_name: root_device_name,
        ebs: root_ebs,
    }];

    let mut sorted: Vec<&DataVolume> = data_volumes.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    for (index, volume) in sorted.into_iter().enumerate() {
        let mut ebs = compute_ebs(
            &volume.name,
            &volume.size,
            volume.volume_type.as_ref(),
            volume.encrypted,
        )?;
        if let Some(overrides) = config.find_data_volume(&volume.name) {
            if let Some(iops) = overrides.iops {
                ebs.iops = Some(iops);
            }
            if let Some(snapshot_id) = &overrides.snapshot_id {
                ebs.snapshot_id = Some(snapshot_id.clone());
            }
            if let Some(throughput) = overrides.throughput {
                ebs.throughput = Some(throughput);
            }
        }
        let device_name = data_device_name(index).ok_or_else(|| {
            BlockDeviceError::DeviceNamingExhausted {
                volume: volume.name.clone(),
            }
        })?;
        devices.push(BlockDevice::Data { device_name, ebs });
    }

    Ok(devices)
}

fn compute_ebs(
    volume: &str,
    size: &str,
    volume_type: Option<&String>,
    encrypted: Option<bool>,
) -> Result<Ebs, BlockDeviceError> {
    let volume_size: ByteCount =
        size.parse().map_err(|err| BlockDeviceError::SizeParse {
            volume: volume.to_string(),
            size: size.to_string(),
            err,
        })?;
    Ok(Ebs {
        volume_size,
        volume_type: volume_type.cloned(),
        encrypted: encrypted.unwrap_or(true),
        delete_on_termination: true,
        iops: None,
        throughput: None,
        snapshot_id: None,
    })
}

fn data_device_name(index: usize) -> Option<String> {
    DATA_DEVICE_SUFFIXES
        .chars()
        .nth(index)
        .map(|suffix| format!("{DATA_DEVICE_PREFIX}{suffix}"))
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::collection::btree_set;
    use std::collections::BTreeSet;
    use test_strategy::proptest;
    use worker_types::provider_config::DataVolumeOverride;
    use worker_types::provider_config::VolumeOverride;

    fn root() -> Volume {
        Volume {
            size: "50Gi".to_string(),
            volume_type: Some("gp3".to_string()),
            encrypted: None,
        }
    }

    fn data_volume(name: &str) -> DataVolume {
        DataVolume {
            name: name.to_string(),
            size: "10Gi".to_string(),
            volume_type: None,
            encrypted: None,
        }
    }

    #[test]
    fn test_root_only() {
        let devices = compute_block_devices(
            Some(&root()),
            &[],
            &ProviderConfig::default(),
        )
        .unwrap();
        assert_eq!(devices.len(), 1);
        let root = &devices[0];
        assert!(root.is_root());
        assert_eq!(root.device_name(), None);
        assert_eq!(root.ebs().volume_size, ByteCount::from_gibibytes_u32(50));
        assert_eq!(root.ebs().volume_type.as_deref(), Some("gp3"));
        assert!(root.ebs().encrypted);
        assert!(root.ebs().delete_on_termination);
        assert_eq!(root.ebs().snapshot_id, None);
    }

    #[test]
    fn test_data_volumes_sorted_and_named() {
        let volumes = [data_volume("c"), data_volume("a"), data_volume("b")];
        let devices = compute_block_devices(
            Some(&root()),
            &volumes,
            &ProviderConfig::default(),
        )
        .unwrap();

        let names: Vec<_> = devices.iter().map(|d| d.device_name()).collect();
        assert_eq!(
            names,
            vec![
                Some(ROOT_DEVICE_NAME),
                Some("/dev/sdf"),
                Some("/dev/sdg"),
                Some("/dev/sdh"),
            ]
        );
        assert!(devices[0].is_root());
        assert!(devices[1..].iter().all(|d| !d.is_root()));
    }

    #[test]
    fn test_device_naming_exhausted() {
        let names: Vec<String> =
            (0..12).map(|i| format!("vol{i:02}")).collect();
        let volumes: Vec<_> = names.iter().map(|n| data_volume(n)).collect();

        let devices = compute_block_devices(
            Some(&root()),
            &volumes[..MAX_DATA_VOLUMES],
            &ProviderConfig::default(),
        )
        .expect("eleven data volumes fit");
        assert_eq!(devices.last().unwrap().device_name(), Some("/dev/sdp"));

        let err = compute_block_devices(
            Some(&root()),
            &volumes,
            &ProviderConfig::default(),
        )
        .expect_err("twelve data volumes do not fit");
        assert_matches!(
            err,
            BlockDeviceError::DeviceNamingExhausted { volume }
                if volume == "vol11"
        );
    }

    #[test]
    fn test_overrides() {
        let config = ProviderConfig {
            volume: Some(VolumeOverride { iops: Some(3000), throughput: None }),
            data_volumes: vec![DataVolumeOverride {
                name: "logs".to_string(),
                iops: Some(6000),
                throughput: Some(250),
                snapshot_id: Some("snap-0abc".to_string()),
            }],
            ..Default::default()
        };
        let volumes = [
            DataVolume { encrypted: Some(false), ..data_volume("logs") },
            data_volume("cache"),
        ];
        let devices =
            compute_block_devices(Some(&root()), &volumes, &config).unwrap();

        let root = devices[0].ebs();
        assert_eq!(root.iops, Some(3000));
        assert_eq!(root.throughput, None);

        // "cache" sorts first and has no override.
        assert_eq!(devices[1].device_name(), Some("/dev/sdf"));
        assert_eq!(devices[1].ebs().iops, None);
        assert!(devices[1].ebs().encrypted);

        let logs = devices[2].ebs();
        assert_eq!(devices[2].device_name(), Some("/dev/sdg"));
        assert_eq!(logs.iops, Some(6000));
        assert_eq!(logs.throughput, Some(250));
        assert_eq!(logs.snapshot_id.as_deref(), Some("snap-0abc"));
        assert!(!logs.encrypted);
    }

    #[test]
    fn test_errors() {
        assert_matches!(
            compute_block_devices(None, &[], &ProviderConfig::default()),
            Err(BlockDeviceError::MissingRootVolume)
        );

        let bad_root = Volume { size: "big".to_string(), ..root() };
        assert_matches!(
            compute_block_devices(
                Some(&bad_root),
                &[],
                &ProviderConfig::default()
            ),
            Err(BlockDeviceError::SizeParse { volume, .. }) if volume == "root"
        );

        let bad_data =
            DataVolume { size: "10GB".to_string(), ..data_volume("x") };
        assert_matches!(
            compute_block_devices(
                Some(&root()),
                &[bad_data],
                &ProviderConfig::default()
            ),
            Err(BlockDeviceError::SizeParse { volume, .. }) if volume == "x"
        );
    }

    #[proptest]
    fn proptest_naming_ignores_declaration_order(
        #[strategy(btree_set("[a-z]{1,8}", 0..=MAX_DATA_VOLUMES))]
        names: BTreeSet<String>,
        rotate: usize,
        reverse: bool,
    ) {
        let sorted: Vec<DataVolume> =
            names.iter().map(|n| data_volume(n)).collect();
        let mut declared = sorted.clone();
        if !declared.is_empty() {
            let mid = rotate % declared.len();
            declared.rotate_left(mid);
        }
        if reverse {
            declared.reverse();
        }

        let config = ProviderConfig::default();
        let expected =
            compute_block_devices(Some(&root()), &sorted, &config).unwrap();
        let actual =
            compute_block_devices(Some(&root()), &declared, &config).unwrap();
        assert_eq!(expected, actual);
        assert_eq!(actual.len(), names.len() + 1);
    }
}
