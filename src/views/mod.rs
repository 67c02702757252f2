//! Views Module
//!
//! Record types, user policies, and the permission filter that sits between
//! callers and the upstream.

mod client;
mod policy;
mod records;
mod resource;

pub use client::ViewClient;
pub use policy::{Capabilities, Capability, Group, PolicyError, PolicyStore, User, UserSpec};
pub use records::{
    sealed_path, split_sealed_path, Alert, AlertView, Call, CallView, Message, MessageView,
    Recording, RecordingView, MEDIA_PATH_PREFIX, RECORDING_PATH_PREFIX,
};
pub use resource::{PageQuery, RawPage, Resource, ResourceKind, TimeRange, ViewPage, ViewRecord};
