//! Tools advertised by the session and the capability used to invoke them

pub mod registry;

pub use registry::{ToolDescriptor, ToolInvoker, ToolRegistry};
