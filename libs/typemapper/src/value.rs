use std::any::{Any, TypeId};
use std::fmt;

/// Type identity used for class lookup (descriptor cache) and for declared
/// field types (converter registry).
///
/// Equality and hashing use the `TypeId` only; the name is kept for logs and
/// error messages.
#[derive(Clone, Copy)]
pub struct TypeRef {
    id: TypeId,
    name: &'static str,
}

impl TypeRef {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeRef {}

impl std::hash::Hash for TypeRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Owned, type-erased value travelling from a converter to a field.
///
/// Carries the concrete type name so a mismatched write can say what it got.
pub struct Value {
    inner: Box<dyn Any>,
    ty: TypeRef,
}

impl Value {
    pub fn new<T: Any>(value: T) -> Self {
        Self {
            inner: Box::new(value),
            ty: TypeRef::of::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.ty.name()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Take the concrete value out, or hand the `Value` back untouched.
    pub fn downcast<T: Any>(self) -> Result<T, Value> {
        let ty = self.ty;
        match self.inner.downcast::<T>() {
            Ok(boxed) => Ok(*boxed),
            Err(inner) => Err(Value { inner, ty }),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({})", self.ty.name())
    }
}
