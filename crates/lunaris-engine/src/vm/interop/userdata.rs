//! Userdata handles

use std::any::Any;
use std::sync::Arc;

use super::UserDataDescriptor;

/// A host object (or a host type, for static access) visible to scripts.
#[derive(Clone)]
pub struct UserData {
    /// `None` for the static side of a type: constructors, static methods
    /// and constants
    object: Option<Arc<dyn Any + Send + Sync>>,
    descriptor: Arc<dyn UserDataDescriptor>,
}

impl UserData {
    pub fn new<T: Any + Send + Sync>(object: T, descriptor: Arc<dyn UserDataDescriptor>) -> Self {
        Self::from_arc(Arc::new(object), descriptor)
    }

    pub fn from_arc(object: Arc<dyn Any + Send + Sync>, descriptor: Arc<dyn UserDataDescriptor>) -> Self {
        Self {
            object: Some(object),
            descriptor,
        }
    }

    /// The static side of the type described by `descriptor`.
    pub fn static_type(descriptor: Arc<dyn UserDataDescriptor>) -> Self {
        Self {
            object: None,
            descriptor,
        }
    }

    pub fn object(&self) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.object.as_ref()
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.object.clone()?.downcast::<T>().ok()
    }

    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.object.as_ref()?.downcast_ref::<T>()
    }

    pub fn descriptor(&self) -> &Arc<dyn UserDataDescriptor> {
        &self.descriptor
    }

    pub fn is_static(&self) -> bool {
        self.object.is_none()
    }

    /// Identity: the object's address, or the descriptor's for static userdata.
    pub fn id(&self) -> usize {
        match &self.object {
            Some(object) => Arc::as_ptr(object) as *const () as usize,
            None => Arc::as_ptr(&self.descriptor) as *const () as usize,
        }
    }

    /// Whether both handles refer to the same object (or the same static type).
    pub fn same_object(&self, other: &UserData) -> bool {
        match (&self.object, &other.object) {
            (Some(_), Some(_)) | (None, None) => self.id() == other.id(),
            _ => false,
        }
    }

    pub fn display_string(&self) -> String {
        self.descriptor
            .as_string(self)
            .unwrap_or_else(|| format!("userdata: {}", self.descriptor.name()))
    }
}

impl std::fmt::Debug for UserData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserData")
            .field("type", &self.descriptor.name())
            .field("static", &self.is_static())
            .finish()
    }
}
