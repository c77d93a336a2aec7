//! Typed resource records and confirmed stage values
//!
//! Records are what the inventory returns for each resource kind. They derive
//! `Deserialize` with the inventory's field names so the HTTP adapter can
//! validate them at the boundary; reference lists default to empty so that a
//! missing list is reported by the stage that needs it instead of by serde.
//!
//! `Confirmed*` values are produced by the stage verifiers and exist only for
//! the duration of a single verification run.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Resource kinds the inventory can be queried for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// Declared chained service
    ServiceInstance,
    /// Compute unit launched for one scale-out unit
    Workload,
    /// Network attachment point on a workload
    WorkloadInterface,
    /// Logical network an interface attaches to
    VirtualNetwork,
    /// Forwarding-table context associated with a network
    RoutingInstance,
}

impl ResourceKind {
    /// Path segment and envelope key used by the inventory API
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceInstance => "service-instance",
            Self::Workload => "virtual-machine",
            Self::WorkloadInterface => "virtual-machine-interface",
            Self::VirtualNetwork => "virtual-network",
            Self::RoutingInstance => "routing-instance",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ServiceInstance => "service instance",
            Self::Workload => "workload",
            Self::WorkloadInterface => "workload interface",
            Self::VirtualNetwork => "virtual network",
            Self::RoutingInstance => "routing instance",
        };
        f.write_str(name)
    }
}

/// Fully-qualified name, outermost scope first (domain, project, ..., name)
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FqName(Vec<String>);

impl FqName {
    /// Build a name from its components
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Parse a colon-separated name such as `default-domain:demo:fw`
    pub fn parse(s: &str) -> Self {
        Self::new(s.split(':').filter(|p| !p.is_empty()))
    }

    /// Last component, the object's own name
    pub fn leaf(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    /// Enclosing scope (everything but the leaf)
    pub fn parent(&self) -> FqName {
        let len = self.0.len().saturating_sub(1);
        Self(self.0[..len].to_vec())
    }

    /// Name components
    pub fn parts(&self) -> &[String] {
        &self.0
    }

    /// Whether the name has no components
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FqName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(":"))
    }
}

/// Attributes carried on an interface's routing-instance reference
///
/// A non-empty set marks the reference as a policy-based forwarding hop of a
/// service chain.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefAttributes {
    /// Traffic direction steered into the chain (`ingress`, `egress`, `both`)
    pub direction: Option<String>,
    /// VLAN tag used to steer traffic into the service workload
    pub vlan_tag: Option<u32>,
    /// Source MAC rewritten on the chain hop
    pub src_mac: Option<String>,
    /// Destination MAC rewritten on the chain hop
    pub dst_mac: Option<String>,
    /// Service chain address assigned to the hop
    pub service_chain_address: Option<String>,
}

impl RefAttributes {
    /// Whether no attribute is set
    pub fn is_empty(&self) -> bool {
        self.direction.as_deref().map_or(true, str::is_empty)
            && self.vlan_tag.is_none()
            && self.src_mac.as_deref().map_or(true, str::is_empty)
            && self.dst_mac.as_deref().map_or(true, str::is_empty)
            && self.service_chain_address.as_deref().map_or(true, str::is_empty)
    }
}

/// Reference from one resource to another
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Fully-qualified name of the referenced object
    pub to: FqName,
    /// Id of the referenced object
    pub uuid: String,
    /// Reference attributes, only present on some reference kinds
    #[serde(default)]
    pub attr: Option<RefAttributes>,
}

impl ObjectRef {
    /// Create a reference without attributes
    pub fn new(to: FqName, uuid: impl Into<String>) -> Self {
        Self {
            to,
            uuid: uuid.into(),
            attr: None,
        }
    }

    /// Attach reference attributes
    pub fn with_attr(mut self, attr: RefAttributes) -> Self {
        self.attr = Some(attr);
        self
    }

    /// Whether the reference carries a non-empty attribute set
    pub fn has_attributes(&self) -> bool {
        self.attr.as_ref().is_some_and(|a| !a.is_empty())
    }
}

/// Service-chain metadata attached to a routing instance acting as a chain hop
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceChainInfo {
    /// Address of the service in the chain
    pub service_chain_address: Option<String>,
    /// Routing instance traffic is forwarded into
    pub routing_instance: Option<String>,
    /// Prefixes steered through the chain
    pub prefix: Vec<String>,
    /// Routing instance traffic originates from
    pub source_routing_instance: Option<String>,
    /// Service instance that owns this hop
    pub service_instance: Option<String>,
}

impl ServiceChainInfo {
    /// Whether the metadata carries no information
    pub fn is_empty(&self) -> bool {
        self.service_chain_address.as_deref().map_or(true, str::is_empty)
            && self.routing_instance.as_deref().map_or(true, str::is_empty)
            && self.prefix.is_empty()
            && self.source_routing_instance.as_deref().map_or(true, str::is_empty)
            && self.service_instance.as_deref().map_or(true, str::is_empty)
    }
}

// =============================================================================
// Inventory records
// =============================================================================

/// Observed service instance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstanceRecord {
    /// Fully-qualified name
    pub fq_name: FqName,
    /// Instance id
    pub uuid: String,
    /// References to the service template(s) the instance was created from
    #[serde(default, rename = "service_template_refs")]
    pub template_refs: Vec<ObjectRef>,
    /// Back-references from the workloads launched for the instance
    #[serde(default, rename = "virtual_machine_back_refs")]
    pub workload_back_refs: Vec<ObjectRef>,
}

/// Observed compute workload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadRecord {
    /// Workload id
    pub uuid: String,
    /// Workload display name
    #[serde(default)]
    pub name: String,
    /// Interfaces attached to the workload
    #[serde(default, rename = "virtual_machine_interfaces")]
    pub interface_refs: Vec<ObjectRef>,
}

/// Properties of a workload interface
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceProperties {
    /// Role of the interface in the chain (`left`, `right`, `management`)
    #[serde(rename = "service_interface_type")]
    pub interface_type: Option<String>,
}

/// Observed workload interface
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceRecord {
    /// Fully-qualified name
    pub fq_name: FqName,
    /// Interface id
    pub uuid: String,
    /// Interface properties, absent until the control plane fills them in
    #[serde(default, rename = "virtual_machine_interface_properties")]
    pub properties: Option<InterfaceProperties>,
    /// Networks the interface attaches to
    #[serde(default, rename = "virtual_network_refs")]
    pub network_refs: Vec<ObjectRef>,
    /// Routing instances the interface forwards into
    #[serde(default)]
    pub routing_instance_refs: Vec<ObjectRef>,
}

impl InterfaceRecord {
    /// Declared interface role, if the properties carry one
    pub fn interface_type(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|p| p.interface_type.as_deref())
            .filter(|t| !t.is_empty())
    }
}

/// Observed virtual network
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRecord {
    /// Fully-qualified name
    pub fq_name: FqName,
    /// Network id
    pub uuid: String,
    /// Network name
    pub name: String,
}

/// Observed routing instance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingInstanceRecord {
    /// Fully-qualified name
    pub fq_name: FqName,
    /// Routing instance id
    pub uuid: String,
    /// Routing instance name
    pub name: String,
    /// Chain metadata, present when the instance is a service-chain hop
    #[serde(default, rename = "service_chain_information")]
    pub service_chain: Option<ServiceChainInfo>,
}

// =============================================================================
// Declared state
// =============================================================================

/// What was requested: the service instance the verification is about
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstanceRef {
    /// Fully-qualified name (domain, project, instance)
    pub fq_name: FqName,
    /// Name of the service template the instance is created from
    pub template: String,
    /// Interface roles every workload must carry, in template order
    pub interface_types: Vec<String>,
    /// Number of workloads to launch
    pub scale_out: u32,
    /// Optional left network passed to the create call
    #[serde(default)]
    pub left_network: Option<String>,
    /// Optional right network passed to the create call
    #[serde(default)]
    pub right_network: Option<String>,
}

impl ServiceInstanceRef {
    /// Declare a service instance with a single workload
    pub fn new(
        fq_name: FqName,
        template: impl Into<String>,
        interface_types: Vec<String>,
    ) -> Self {
        Self {
            fq_name,
            template: template.into(),
            interface_types,
            scale_out: 1,
            left_network: None,
            right_network: None,
        }
    }

    /// Set the declared scale-out
    pub fn with_scale_out(mut self, scale_out: u32) -> Self {
        self.scale_out = scale_out;
        self
    }

    /// Set the left and right networks passed to the create call
    pub fn with_networks(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.left_network = Some(left.into());
        self.right_network = Some(right.into());
        self
    }

    /// Instance name (leaf of the fully-qualified name)
    pub fn name(&self) -> &str {
        self.fq_name.leaf()
    }

    /// Project scope the instance lives in
    pub fn scope(&self) -> FqName {
        self.fq_name.parent()
    }

    /// Whether `interface_type` is one of the declared roles
    pub fn declares_interface(&self, interface_type: &str) -> bool {
        self.interface_types.iter().any(|t| t == interface_type)
    }
}

// =============================================================================
// Confirmed stage values
// =============================================================================

/// Service instance confirmed to exist
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmedServiceInstance {
    /// Record as observed
    pub record: ServiceInstanceRecord,
}

/// Workload confirmed to be launched and observable
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmedWorkload {
    /// Record as observed
    pub record: WorkloadRecord,
}

impl ConfirmedWorkload {
    /// Workload id
    pub fn id(&self) -> &str {
        &self.record.uuid
    }
}

/// Interface confirmed to carry a declared role
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmedInterface {
    /// Record as observed
    pub record: InterfaceRecord,
    /// Role the interface carries
    pub interface_type: String,
}

/// Network an interface resolves to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmedNetwork {
    /// Record as observed
    pub record: NetworkRecord,
    /// Whether the name is in the reserved chain-managed set
    pub chain_managed: bool,
}

impl ConfirmedNetwork {
    /// Network name
    pub fn name(&self) -> &str {
        &self.record.name
    }
}

/// Routing instance an interface resolves to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmedRoutingInstance {
    /// Record as observed
    pub record: RoutingInstanceRecord,
    /// Whether the name is in the reserved chain-managed set
    pub chain_managed: bool,
    /// Whether the instance is a service-chain hop (name differs from its network)
    pub chain_hop: bool,
}
