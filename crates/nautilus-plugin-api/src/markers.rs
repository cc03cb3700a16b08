//! Declarative handler markers
//!
//! Markers are plain data attached to handler descriptors and to scanned
//! method metadata. They replace runtime annotation scanning: a plugin
//! type declares its handlers by building a vtable whose entries carry
//! these markers.

use serde::{Deserialize, Serialize};

/// Type-marker name that plugin classes reach through superclass or
/// interface edges in the metadata graph.
pub const PLUGIN_TYPE: &str = "nautilus::Plugin";

/// Marker attached to a handler method
///
/// A method may carry several markers; in particular a single method may
/// carry both an `Event` and an `Events` marker and is then bound under
/// every listed event name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Marker {
    /// Runs during plugin initialization
    Init,

    /// Runs during plugin destruction
    Destroy,

    /// Runs when the named event fires
    Event(String),

    /// Runs when any of the named events fire
    Events(Vec<String>),
}

impl Marker {
    /// Whether this is the init marker
    pub fn is_init(&self) -> bool {
        matches!(self, Marker::Init)
    }

    /// Whether this is the destroy marker
    pub fn is_destroy(&self) -> bool {
        matches!(self, Marker::Destroy)
    }

    /// Event names this marker binds, empty for lifecycle markers
    pub fn event_names(&self) -> &[String] {
        match self {
            Marker::Event(name) => std::slice::from_ref(name),
            Marker::Events(names) => names,
            _ => &[],
        }
    }
}
