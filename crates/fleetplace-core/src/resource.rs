//! Workload resources submitted for placement.
//!
//! A resource is either a VM (with its attached disks) or a set of
//! standalone disks. The placement core only looks inside it to derive
//! constraints; the rest is forwarded verbatim to host scorers.

use serde::{Deserialize, Serialize};

/// Something to place on exactly one host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm: Option<Vm>,
    /// Standalone disks (e.g. a persistent disk created on its own).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disks: Vec<Disk>,
}

impl Resource {
    pub fn vm(vm: Vm) -> Self {
        Self {
            vm: Some(vm),
            disks: Vec::new(),
        }
    }

    pub fn disks(disks: Vec<Disk>) -> Self {
        Self { vm: None, disks }
    }
}

/// A virtual machine and the disks attached to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vm {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,
    #[serde(default)]
    pub disks: Vec<Disk>,
}

impl Vm {
    /// Image id of the first disk that references one.
    pub fn first_image_id(&self) -> Option<&str> {
        self.disks
            .iter()
            .find_map(|d| d.image.as_ref().map(|i| i.id.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Disk {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,
    #[serde(default)]
    pub capacity_gb: u32,
    #[serde(default)]
    pub persistent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<DiskImage>,
}

/// Reference to the image a disk is cloned from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskImage {
    pub id: String,
}
