// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use worker_types::infrastructure::InfrastructureStatus;
use worker_types::infrastructure::Purpose;
use worker_types::machine::IamInstanceProfile;
use worker_types::provider_config::IamInstanceProfileConfig;

#[derive(Debug, thiserror::Error)]
pub enum IamProfileError {
    #[error("no instance profile for purpose {purpose}")]
    ProfileNotFound { purpose: Purpose },
    #[error("instance profile override sets neither a name nor an ARN")]
    ProfileUnresolvable,
}

/// Pick the instance profile for a pool's machines.
///
/// Without an override the infrastructure's node profile is used.  An
/// override is used by name if it has one, otherwise by ARN.
pub fn resolve_iam_instance_profile(
    config: Option<&IamInstanceProfileConfig>,
    infra: &InfrastructureStatus,
) -> Result<IamInstanceProfile, IamProfileError> {
    let Some(config) = config else {
        let profile = infra.find_instance_profile(Purpose::Nodes).ok_or(
            IamProfileError::ProfileNotFound { purpose: Purpose::Nodes },
        )?;
        return Ok(IamInstanceProfile::Name(profile.name.clone()));
    };

    if let Some(name) = &config.name {
        return Ok(IamInstanceProfile::Name(name.clone()));
    }
    if let Some(arn) = &config.arn {
        return Ok(IamInstanceProfile::Arn(arn.clone()));
    }
    Err(IamProfileError::ProfileUnresolvable)
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;
    use worker_types::infrastructure::IamStatus;
    use worker_types::infrastructure::InstanceProfile;

    fn infra_with_profile() -> InfrastructureStatus {
        InfrastructureStatus {
            iam: IamStatus {
                instance_profiles: vec![InstanceProfile {
                    name: "shoot--dev--demo-nodes".to_string(),
                    purpose: Purpose::Nodes,
                }],
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_default_profile() {
        assert_eq!(
            resolve_iam_instance_profile(None, &infra_with_profile()).unwrap(),
            IamInstanceProfile::Name("shoot--dev--demo-nodes".to_string())
        );
        assert_matches!(
            resolve_iam_instance_profile(
                None,
                &InfrastructureStatus::default()
            ),
            Err(IamProfileError::ProfileNotFound { purpose: Purpose::Nodes })
        );
    }

    #[test]
    fn test_overrides() {
        let infra = InfrastructureStatus::default();

        let arn_only = IamInstanceProfileConfig {
            name: None,
            arn: Some("arn:aws:iam::123:instance-profile/custom".to_string()),
        };
        assert_eq!(
            resolve_iam_instance_profile(Some(&arn_only), &infra).unwrap(),
            IamInstanceProfile::Arn(
                "arn:aws:iam::123:instance-profile/custom".to_string()
            )
        );

        let both = IamInstanceProfileConfig {
            name: Some("custom".to_string()),
            ..arn_only
        };
        assert_eq!(
            resolve_iam_instance_profile(Some(&both), &infra).unwrap(),
            IamInstanceProfile::Name("custom".to_string())
        );

        // An override, even an empty one, never falls back to the
        // infrastructure profile.
        assert_matches!(
            resolve_iam_instance_profile(
                Some(&IamInstanceProfileConfig::default()),
                &infra_with_profile()
            ),
            Err(IamProfileError::ProfileUnresolvable)
        );
    }
}
