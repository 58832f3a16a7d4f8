//! Dragonfly boot data rendering
//!
//! This crate renders the documents a bare metal machine reads on first
//! boot: a flat cloud-init metadata map and an OpenStack-style network data
//! document. Both are produced from a [`DataTemplate`](dragonfly_crd::DataTemplate)
//! whose rules refer to IP pools, host NICs and node objects.
//!
//! Rendering is pure: pool addresses are resolved beforehand into a
//! [`PoolCache`] and the node objects are passed in as [`NodeAttributes`].
//! Output is serialized to YAML with fields in a fixed order, so rendering
//! the same inputs twice yields identical bytes.
//!
//! # Example
//!
//! ```
//! use dragonfly_crd::{DataRequest, Host, InfraMachine, Machine, MetaDataIndex, MetaDataTemplate};
//! use dragonfly_metadata::{render_meta_data, NodeAttributes, PoolCache};
//!
//! let mut template = MetaDataTemplate::default();
//! template.indexes.push(MetaDataIndex {
//!     key: "hostname".to_string(),
//!     prefix: "node-".to_string(),
//!     step: 1,
//!     ..Default::default()
//! });
//!
//! let request = DataRequest::new("node-3", "metal", "workers", 3);
//! let infra = InfraMachine::new("m3m-0", "metal");
//! let machine = Machine::new("machine-0", "metal");
//! let host = Host::new("host-0", "metal");
//! let node = NodeAttributes::new(&infra, &machine, &host);
//!
//! let meta = render_meta_data(&request, &template, &PoolCache::new(), &node).unwrap();
//! assert_eq!(meta["hostname"], "node-3");
//! ```

pub mod error;
pub mod render;
pub mod types;

pub use error::{RenderError, Result};
pub use render::{
    render, render_meta_data, render_network_data, NodeAttributes, ObjectKind, RenderedDocuments,
};
pub use types::{
    to_yaml, BondEntry, DynamicNetworkEntry, EthernetEntry, LinkEntry, MetaData, NetworkData,
    NetworkEntry, PoolAddress, PoolCache, RouteEntry, ServiceEntry, StaticNetworkEntry, VlanEntry,
};
