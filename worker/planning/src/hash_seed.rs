// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use worker_types::pool::WorkerPool;

/// Extra inputs to a pool's identity hash.
///
/// The pool hash itself only looks at the root volume's size and type.
/// Encryption, and every attribute of the data volumes, change the EBS
/// volumes backing a machine, so they must roll the pool as well.  Data
/// volumes are visited in declaration order.
pub fn additional_hash_data(pool: &WorkerPool) -> Vec<String> {
    let mut data = Vec::new();

    if let Some(encrypted) = pool.volume.as_ref().and_then(|v| v.encrypted) {
        data.push(encrypted.to_string());
    }

    for dv in &pool.data_volumes {
        data.push(dv.size.clone());
        if let Some(volume_type) = &dv.volume_type {
            data.push(volume_type.clone());
        }
        if let Some(encrypted) = dv.encrypted {
            data.push(encrypted.to_string());
        }
    }

    data
}

#[cfg(test)]
mod test {
    use super::*;
    use worker_types::pool::DataVolume;
    use worker_types::pool::Volume;

    #[test]
    fn test_no_volumes() {
        assert!(additional_hash_data(&WorkerPool::default()).is_empty());

        let pool = WorkerPool {
            volume: Some(Volume {
                size: "50Gi".to_string(),
                volume_type: Some("gp3".to_string()),
                encrypted: None,
            }),
            ..Default::default()
        };
        assert!(additional_hash_data(&pool).is_empty());
    }

    #[test]
    fn test_declaration_order() {
        let pool = WorkerPool {
            volume: Some(Volume {
                size: "50Gi".to_string(),
                volume_type: None,
                encrypted: Some(false),
            }),
            data_volumes: vec![
                DataVolume {
                    name: "zz".to_string(),
                    size: "20Gi".to_string(),
                    volume_type: Some("io2".to_string()),
                    encrypted: Some(true),
                },
                DataVolume {
                    name: "aa".to_string(),
                    size: "10Gi".to_string(),
                    volume_type: None,
                    encrypted: None,
                },
            ],
            ..Default::default()
        };
        assert_eq!(
            additional_hash_data(&pool),
            vec!["false", "20Gi", "io2", "true", "10Gi"]
        );
    }
}
