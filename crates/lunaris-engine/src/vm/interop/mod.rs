//! Host interop: exposing Rust objects, types, enums and events to scripts
//!
//! Every host value reaches scripts as a [`UserData`]: an optional object plus
//! the [`UserDataDescriptor`] that resolves member access on it. Descriptors
//! answer `None` (or `false` for writes) when they do not know a member, which
//! lets [`CompositeUserDataDescriptor`] fall through to the next descriptor.
//! A real `nil` member is `Some(DynValue::Nil)`.

mod composite;
mod convert;
mod descriptor;
mod enums;
mod event;
mod proxy;
mod registry;
mod standard;
mod userdata;

pub use composite::CompositeUserDataDescriptor;
pub use convert::{FromDynValue, ToDynValue};
pub use descriptor::UserDataDescriptor;
pub use enums::{EnumRaw, EnumStorage, EnumUserDataDescriptor, EnumValue};
pub use event::{event_facade, HostEvent};
pub use proxy::{ProxyFactory, ProxyUserDataDescriptor};
pub use registry::UserDataRegistry;
pub use standard::{DescriptorBuilder, StandardUserDataDescriptor};
pub use userdata::UserData;
