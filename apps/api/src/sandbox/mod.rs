//! Sandbox host: isolated render surfaces for the live preview.

pub mod policy;
pub mod shell;
pub mod surface;

pub use policy::{FrameDescriptor, SandboxPolicy};
pub use shell::DocumentShell;
pub use surface::{RenderReport, RenderSurfaceHandle, SandboxHost};
