// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Machine image resolution

use serde::Deserialize;
use serde::Serialize;
use worker_types::machine::MachineImage;
use worker_types::pool::DEFAULT_ARCHITECTURE;

/// Maps an image name and version to a region-specific AMI.
pub trait ImageResolver: Send + Sync {
    fn resolve(
        &self,
        name: &str,
        version: &str,
        region: &str,
        architecture: &str,
    ) -> Option<String>;
}

/// One row of an [`ImageCatalog`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCatalogEntry {
    pub name: String,
    pub version: String,
    pub region: String,
    #[serde(default = "default_architecture")]
    pub architecture: String,
    pub ami: String,
}

fn default_architecture() -> String {
    DEFAULT_ARCHITECTURE.to_string()
}

/// A fixed table of AMIs.
#[derive(Clone, Debug, Default)]
pub struct ImageCatalog {
    entries: Vec<ImageCatalogEntry>,
}

impl ImageCatalog {
    pub fn new(entries: Vec<ImageCatalogEntry>) -> Self {
        ImageCatalog { entries }
    }
}

impl ImageResolver for ImageCatalog {
    fn resolve(
        &self,
        name: &str,
        version: &str,
        region: &str,
        architecture: &str,
    ) -> Option<String> {
        self.entries
            .iter()
            .find(|e| {
                e.name == name
                    && e.version == version
                    && e.region == region
                    && e.architecture == architecture
            })
            .map(|e| e.ami.clone())
    }
}

/// Record `image` in the inventory unless an image with the same name,
/// version and architecture is already there.
pub(crate) fn append_machine_image(
    images: &mut Vec<MachineImage>,
    image: MachineImage,
) {
    let known = images.iter().any(|i| {
        i.name == image.name
            && i.version == image.version
            && i.architecture == image.architecture
    });
    if !known {
        images.push(image);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn entry(region: &str, architecture: &str, ami: &str) -> ImageCatalogEntry {
        ImageCatalogEntry {
            name: "gardenlinux".to_string(),
            version: "1592.1.0".to_string(),
            region: region.to_string(),
            architecture: architecture.to_string(),
            ami: ami.to_string(),
        }
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog = ImageCatalog::new(vec![
            entry("eu-west-1", "amd64", "ami-amd"),
            entry("eu-west-1", "arm64", "ami-arm"),
            entry("us-east-1", "amd64", "ami-us"),
        ]);
        assert_eq!(
            catalog.resolve("gardenlinux", "1592.1.0", "eu-west-1", "arm64"),
            Some("ami-arm".to_string())
        );
        assert_eq!(
            catalog.resolve("gardenlinux", "1592.1.0", "us-east-1", "amd64"),
            Some("ami-us".to_string())
        );
        assert_eq!(
            catalog.resolve("gardenlinux", "1592.2.0", "eu-west-1", "amd64"),
            None
        );
        assert_eq!(
            catalog.resolve("gardenlinux", "1592.1.0", "us-east-1", "arm64"),
            None
        );
    }

    #[test]
    fn test_entry_architecture_defaults() {
        let entry: ImageCatalogEntry = serde_json::from_str(
            r#"{"name":"a","version":"1","region":"r","ami":"ami-1"}"#,
        )
        .unwrap();
        assert_eq!(entry.architecture, DEFAULT_ARCHITECTURE);
    }

    #[test]
    fn test_append_machine_image_deduplicates() {
        let image = |arch: &str, ami: &str| MachineImage {
            name: "gardenlinux".to_string(),
            version: "1592.1.0".to_string(),
            ami: ami.to_string(),
            architecture: arch.to_string(),
        };
        let mut images = Vec::new();
        append_machine_image(&mut images, image("amd64", "ami-1"));
        append_machine_image(&mut images, image("amd64", "ami-2"));
        append_machine_image(&mut images, image("arm64", "ami-3"));
        assert_eq!(
            images,
            vec![image("amd64", "ami-1"), image("arm64", "ami-3")]
        );
    }
}
