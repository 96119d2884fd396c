// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Instance metadata service (IMDS) hardening

use semver::Version;
use worker_types::machine::InstanceMetadataOptions;
use worker_types::provider_config::HttpTokens;
use worker_types::provider_config::InstanceMetadataOptionsConfig;

/// Hop limit applied by default on clusters new enough to require IMDSv2.
pub const HARDENED_HOP_LIMIT: i64 = 2;

/// First control-plane minor version that gets IMDSv2 by default.
const HARDENED_SINCE: (u64, u64) = (1, 30);

#[derive(Debug, thiserror::Error)]
pub enum InstanceMetadataError {
    #[error("failed to parse control plane version {version:?}")]
    VersionParse {
        version: String,
        #[source]
        err: semver::Error,
    },
}

/// Compute the instance metadata options for one pool.
///
/// A pool without an override gets the version-gated default.  A pool with
/// an override gets exactly the fields set on it: fields the override leaves
/// unset stay unset, even where the version-gated default would have set
/// them.
pub fn compute_instance_metadata(
    config: Option<&InstanceMetadataOptionsConfig>,
    kubernetes_version: &str,
) -> Result<InstanceMetadataOptions, InstanceMetadataError> {
    if let Some(config) = config {
        return Ok(InstanceMetadataOptions {
            http_put_response_hop_limit: config.http_put_response_hop_limit,
            http_tokens: config.http_tokens,
        });
    }

    let version = parse_kubernetes_version(kubernetes_version)?;
    // Comparing (major, minor) admits 1.30 pre-releases as well.
    if (version.major, version.minor) >= HARDENED_SINCE {
        Ok(InstanceMetadataOptions {
            http_put_response_hop_limit: Some(HARDENED_HOP_LIMIT),
            http_tokens: Some(HttpTokens::Required),
        })
    } else {
        Ok(InstanceMetadataOptions::default())
    }
}

/// Parse a control-plane version, accepting a leading `v` and missing minor
/// or patch components (`v1.30` reads as `1.30.0`).
pub fn parse_kubernetes_version(
    version: &str,
) -> Result<Version, InstanceMetadataError> {
    let trimmed = version.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    let core_len = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, rest) = trimmed.split_at(core_len);
    let padding = match core.split('.').count() {
        1 => ".0.0",
        2 => ".0",
        _ => "",
    };
    Version::parse(&format!("{core}{padding}{rest}")).map_err(|err| {
        InstanceMetadataError::VersionParse {
            version: version.to_string(),
            err,
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_version_gated_default() {
        assert!(compute_instance_metadata(None, "1.29.5").unwrap().is_empty());

        let hardened = InstanceMetadataOptions {
            http_put_response_hop_limit: Some(2),
            http_tokens: Some(HttpTokens::Required),
        };
        for version in ["1.30.0", "1.30.0-alpha.1", "v1.31", "1.32.1+build.7"] {
            assert_eq!(
                compute_instance_metadata(None, version).unwrap(),
                hardened,
                "version {version}"
            );
        }
    }

    #[test]
    fn test_partial_override_does_not_default() {
        let config = InstanceMetadataOptionsConfig {
            http_put_response_hop_limit: Some(1),
            http_tokens: None,
        };
        assert_eq!(
            compute_instance_metadata(Some(&config), "1.30.0").unwrap(),
            InstanceMetadataOptions {
                http_put_response_hop_limit: Some(1),
                http_tokens: None,
            }
        );

        let empty = InstanceMetadataOptionsConfig::default();
        assert!(compute_instance_metadata(Some(&empty), "1.31.0")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_override_skips_version_parsing() {
        let config = InstanceMetadataOptionsConfig {
            http_put_response_hop_limit: None,
            http_tokens: Some(HttpTokens::Optional),
        };
        let options =
            compute_instance_metadata(Some(&config), "garbage").unwrap();
        assert_eq!(options.http_tokens, Some(HttpTokens::Optional));
    }

    #[test]
    fn test_bad_version() {
        assert_matches!(
            compute_instance_metadata(None, "one.thirty"),
            Err(InstanceMetadataError::VersionParse { version, .. })
                if version == "one.thirty"
        );
        assert_matches!(
            parse_kubernetes_version(""),
            Err(InstanceMetadataError::VersionParse { .. })
        );
    }

    #[test]
    fn test_parse_kubernetes_version() {
        assert_eq!(
            parse_kubernetes_version("v1.30").unwrap(),
            Version::new(1, 30, 0)
        );
        assert_eq!(
            parse_kubernetes_version("1").unwrap(),
            Version::new(1, 0, 0)
        );
        let pre = parse_kubernetes_version("1.30-rc.1").unwrap();
        assert_eq!((pre.major, pre.minor, pre.patch), (1, 30, 0));
        assert_eq!(pre.pre.as_str(), "rc.1");
    }
}
