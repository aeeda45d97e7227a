//! Timeslice - Ingestion output
//!
//! One time-bounded batch of multi-detector data. Components follow the
//! upstream link order, which stays stable for a whole run.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Size of a serialized microslice descriptor in the upstream format (bytes)
pub const DESCRIPTOR_SIZE: u64 = 32;

/// Microslice header
///
/// Mirrors the upstream descriptor layout; `idx` is the microslice start time
/// in nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicrosliceDescriptor {
    pub hdr_id: u8,
    pub hdr_ver: u8,
    pub eq_id: u16,
    pub flags: u16,
    /// Subsystem identifier of the link that produced this microslice
    pub sys_id: u16,
    pub sys_ver: u8,
    /// Start time (ns)
    pub idx: u64,
    pub crc: u32,
    /// Content size (bytes)
    pub size: u32,
    pub offset: u64,
}

/// Smallest addressable unit inside a component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Microslice {
    pub descriptor: MicrosliceDescriptor,

    /// Opaque payload (shared, cloning is a refcount bump)
    pub content: Bytes,
}

/// Data of one physical link within a timeslice
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub microslices: Vec<Microslice>,
}

impl Component {
    /// Create a component from its microslices
    pub fn new(microslices: Vec<Microslice>) -> Self {
        Self { microslices }
    }

    /// Subsystem id taken from the first microslice descriptor
    pub fn system_id(&self) -> Option<u16> {
        self.microslices.first().map(|ms| ms.descriptor.sys_id)
    }

    /// Descriptor plus content bytes, used for monitoring only
    pub fn size_bytes(&self) -> u64 {
        self.microslices
            .iter()
            .map(|ms| DESCRIPTOR_SIZE + ms.content.len() as u64)
            .sum()
    }
}

/// Timeslice
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeslice {
    /// Position in the upstream stream
    pub index: u64,

    /// Number of core (non-overlap) microslices per component
    pub num_core_microslices: u32,

    /// Components in link order
    pub components: Vec<Component>,
}

impl Timeslice {
    /// Create an empty timeslice
    pub fn new(index: u64, num_core_microslices: u32) -> Self {
        Self {
            index,
            num_core_microslices,
            components: Vec::new(),
        }
    }

    /// Append a component
    pub fn push_component(&mut self, component: Component) {
        self.components.push(component);
    }

    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    /// Descriptor of microslice `ms` in component `comp`
    pub fn descriptor(&self, comp: usize, ms: usize) -> Option<&MicrosliceDescriptor> {
        self.components
            .get(comp)
            .and_then(|c| c.microslices.get(ms))
            .map(|m| &m.descriptor)
    }

    /// Start time (ns) of the first microslice of the first component
    pub fn start_time_ns(&self) -> Option<u64> {
        self.descriptor(0, 0).map(|d| d.idx)
    }

    /// Total size over all components (bytes)
    pub fn size_bytes(&self) -> u64 {
        self.components.iter().map(Component::size_bytes).sum()
    }

    /// Copy restricted to the given component positions
    ///
    /// Index, core microslice count, descriptors and contents are preserved
    /// verbatim. Positions past the end are skipped.
    pub fn select_components(&self, positions: &[u32]) -> Timeslice {
        let components = positions
            .iter()
            .filter_map(|&pos| self.components.get(pos as usize).cloned())
            .collect();

        Timeslice {
            index: self.index,
            num_core_microslices: self.num_core_microslices,
            components,
        }
    }
}
