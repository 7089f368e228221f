// ── Resource registry ──
//
// Closed catalogue of device resources, the mutations that change them,
// and the tag sets used for invalidation. Lookups are total `match`es
// over the enums; `Registry::validated()` checks the tables once at startup.

use std::collections::HashSet;

use enumset::{EnumSet, EnumSetType};
use ootb_api::Method;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::error::CoreError;

/// A class of device-exposed data.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumSetType,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[enumset(no_super_impls)]
#[strum(serialize_all = "kebab-case")]
pub enum Resource {
    Networks,
    Board,
    Wlan,
    Ethernet,
    FactoryName,
    Hostname,
    IotCloudRegistration,
    FirmwareAvailable,
    FirmwareUpdate,
}

/// Invalidation label. Tags are drawn from the same closed set as resources.
pub type Tag = Resource;

/// A set of tags, one bit per resource.
pub type TagSet = EnumSet<Resource>;

/// What a resource accepts as its read argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentShape {
    /// The resource takes no argument.
    None,
    /// Optional scalar fields forwarded as query parameters.
    Query(&'static [&'static str]),
}

/// Static description of a readable resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub resource: Resource,
    /// GET path below the API base.
    pub path: &'static str,
    pub argument: ArgumentShape,
    /// Tags a cache entry for this resource is fetched under.
    pub tags: TagSet,
}

/// A write operation against the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Mutation {
    ScanNetworks,
    ConfigureWlan,
    ConfigureEthernet,
    SetFactoryName,
    SetHostname,
    RegisterIotCloud,
    StartFirmwareUpdate,
}

/// Static description of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationDescriptor {
    pub mutation: Mutation,
    pub method: Method,
    pub path: &'static str,
    /// Resource the mutation writes to.
    pub resource: Resource,
    /// Tags refetched once the write succeeds.
    pub invalidates: TagSet,
}

/// Lookup for a resource.
pub fn describe(resource: Resource) -> ResourceDescriptor {
    let (path, argument) = match resource {
        Resource::Networks => ("networks", ArgumentShape::Query(&["interface"])),
        Resource::Board => ("board", ArgumentShape::None),
        Resource::Wlan => ("network/wlan", ArgumentShape::None),
        Resource::Ethernet => ("network/ethernet", ArgumentShape::None),
        Resource::FactoryName => ("factory-name", ArgumentShape::None),
        Resource::Hostname => ("hostname", ArgumentShape::None),
        Resource::IotCloudRegistration => ("iot-cloud/registration", ArgumentShape::None),
        Resource::FirmwareAvailable => ("firmware/available", ArgumentShape::Query(&["channel"])),
        Resource::FirmwareUpdate => ("firmware/update", ArgumentShape::None),
    };
    ResourceDescriptor {
        resource,
        path,
        argument,
        tags: EnumSet::only(resource),
    }
}

/// Lookup for a mutation.
pub fn describe_mutation(mutation: Mutation) -> MutationDescriptor {
    let (path, resource, invalidates) = match mutation {
        Mutation::ScanNetworks => (
            "networks/scan",
            Resource::Networks,
            EnumSet::only(Resource::Networks),
        ),
        Mutation::ConfigureWlan => (
            "network/wlan",
            Resource::Wlan,
            Resource::Wlan | Resource::Networks,
        ),
        Mutation::ConfigureEthernet => (
            "network/ethernet",
            Resource::Ethernet,
            EnumSet::only(Resource::Ethernet),
        ),
        Mutation::SetFactoryName => (
            "factory-name",
            Resource::FactoryName,
            Resource::FactoryName | Resource::Board,
        ),
        Mutation::SetHostname => (
            "hostname",
            Resource::Hostname,
            Resource::Hostname | Resource::Board,
        ),
        Mutation::RegisterIotCloud => (
            "iot-cloud/registration",
            Resource::IotCloudRegistration,
            EnumSet::only(Resource::IotCloudRegistration),
        ),
        Mutation::StartFirmwareUpdate => (
            "firmware/update",
            Resource::FirmwareUpdate,
            Resource::FirmwareUpdate | Resource::FirmwareAvailable,
        ),
    };
    MutationDescriptor {
        mutation,
        method: Method::Post,
        path,
        resource,
        invalidates,
    }
}

/// Validated view over the resource and mutation tables.
///
/// Construct once at startup with [`Registry::validated`]; every lookup
/// afterwards is infallible.
#[derive(Debug, Clone, Copy)]
pub struct Registry {
    _validated: (),
}

impl Registry {
    /// Check the built-in tables and return a registry over them.
    pub fn validated() -> Result<Self, CoreError> {
        let resources: Vec<_> = Resource::iter().map(describe).collect();
        let mutations: Vec<_> = Mutation::iter().map(describe_mutation).collect();
        validate_tables(&resources, &mutations)?;
        Ok(Self { _validated: () })
    }

    pub fn describe(&self, resource: Resource) -> ResourceDescriptor {
        describe(resource)
    }

    pub fn mutation(&self, mutation: Mutation) -> MutationDescriptor {
        describe_mutation(mutation)
    }

    pub fn tags(&self, resource: Resource) -> TagSet {
        describe(resource).tags
    }

    pub fn resources(&self) -> impl Iterator<Item = ResourceDescriptor> {
        Resource::iter().map(describe)
    }
}

/// Consistency checks over descriptor tables.
pub(crate) fn validate_tables(
    resources: &[ResourceDescriptor],
    mutations: &[MutationDescriptor],
) -> Result<(), CoreError> {
    let mut seen_paths = HashSet::new();
    for desc in resources {
        if !desc.tags.contains(desc.resource) {
            return Err(registry_error(format!(
                "{} is not tagged with itself",
                desc.resource
            )));
        }
        if desc.path.is_empty() || desc.path.starts_with('/') {
            return Err(registry_error(format!(
                "{} has invalid path {:?}",
                desc.resource, desc.path
            )));
        }
        if !seen_paths.insert(desc.path) {
            return Err(registry_error(format!(
                "path {:?} is registered twice",
                desc.path
            )));
        }
        if let ArgumentShape::Query(fields) = desc.argument {
            let unique: HashSet<_> = fields.iter().collect();
            if fields.is_empty() || unique.len() != fields.len() {
                return Err(registry_error(format!(
                    "{} has an empty or repeated query field list",
                    desc.resource
                )));
            }
        }
    }

    for desc in mutations {
        if !desc.invalidates.contains(desc.resource) {
            return Err(registry_error(format!(
                "{} does not invalidate its own resource {}",
                desc.mutation, desc.resource
            )));
        }
        if desc.method == Method::Get {
            return Err(registry_error(format!("{} is declared as GET", desc.mutation)));
        }
    }

    Ok(())
}

fn registry_error(message: String) -> CoreError {
    CoreError::Registry { message }
}
