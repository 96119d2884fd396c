// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::schema::SchemaObject;
use schemars::schema::SubschemaValidation;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use std::fmt;

/// A rollout bound that is either an absolute number of machines or a
/// percentage of some base, written `"25%"` on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntOrPercent {
    Int(u32),
    Percent(u32),
}

impl Default for IntOrPercent {
    fn default() -> Self {
        IntOrPercent::Int(0)
    }
}

impl fmt::Display for IntOrPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntOrPercent::Int(n) => write!(f, "{n}"),
            IntOrPercent::Percent(p) => write!(f, "{p}%"),
        }
    }
}

impl JsonSchema for IntOrPercent {
    fn schema_name() -> String {
        "IntOrPercent".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        SchemaObject {
            subschemas: Some(Box::new(SubschemaValidation {
                any_of: Some(vec![
                    gen.subschema_for::<u32>(),
                    gen.subschema_for::<String>(),
                ]),
                ..Default::default()
            })),
            ..Default::default()
        }
        .into()
    }
}

impl Serialize for IntOrPercent {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match self {
            IntOrPercent::Int(n) => serializer.serialize_u32(*n),
            IntOrPercent::Percent(_) => {
                serializer.collect_str(&format_args!("{self}"))
            }
        }
    }
}

impl<'de> Deserialize<'de> for IntOrPercent {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(u32),
            Str(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(n) => Ok(IntOrPercent::Int(n)),
            Raw::Str(s) => {
                let invalid = || {
                    serde::de::Error::custom(format!(
                        "expected an integer or a percentage like \"25%\", \
                         found {s:?}"
                    ))
                };
                match s.strip_suffix('%') {
                    Some(p) => p
                        .parse()
                        .map(IntOrPercent::Percent)
                        .map_err(|_| invalid()),
                    None => {
                        s.parse().map(IntOrPercent::Int).map_err(|_| invalid())
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_wire_format() {
        let parsed: Vec<IntOrPercent> =
            serde_json::from_str(r#"[3, "25%", "7"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![
                IntOrPercent::Int(3),
                IntOrPercent::Percent(25),
                IntOrPercent::Int(7)
            ]
        );
        assert_eq!(
            serde_json::to_string(&parsed).unwrap(),
            r#"[3,"25%",7]"#
        );

        serde_json::from_str::<IntOrPercent>(r#""lots""#)
            .expect_err("not a bound");
        serde_json::from_str::<IntOrPercent>(r#""-5%""#)
            .expect_err("negative percentage");
    }
}
