//! Peer-to-peer layer: wire envelope, gossip dispatch and connection lifecycle

pub mod dispatch;
pub mod message;
pub mod node;

pub use dispatch::Dispatcher;
pub use message::Message;
pub use node::NetworkNode;
