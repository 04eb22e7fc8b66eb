pub mod memory;
pub mod transport;

pub use memory::{InMemoryHub, InMemoryTransport, TransportStats};
pub use transport::{Transport, TransportError, TransportEvent};
