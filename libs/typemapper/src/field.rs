use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::error::MappingError;
use crate::meta::{ClassInfo, ClassRef, FieldDecl, ReadFn, UpcastFn, WriteFn};
use crate::value::{TypeRef, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorKind {
    Get,
    Set,
}

impl AccessorKind {
    fn prefix(self) -> &'static str {
        match self {
            AccessorKind::Get => "get",
            AccessorKind::Set => "set",
        }
    }
}

/// Bean-style accessor name for `field`: `name` → `setName`, `URL` → `setURL`.
pub fn accessor_name(kind: AccessorKind, field: &str) -> String {
    format!("{}{}", kind.prefix(), capitalize(field))
}

fn capitalize(name: &str) -> Cow<'_, str> {
    let mut chars = name.chars();
    match chars.next() {
        None => Cow::Borrowed(name),
        Some(first) if first.is_uppercase() => Cow::Borrowed(name),
        Some(first) => {
            let mut upper = first.to_uppercase();
            match (upper.next(), upper.next()) {
                (Some(single), None) => Cow::Owned(std::iter::once(single).chain(chars).collect()),
                // No one-character upper case form (`ß`): keep the name as is.
                _ => Cow::Borrowed(name),
            }
        }
    }
}

/// Resolved handle to a concrete field.
///
/// `read` and `write` take the instance the field was discovered from. The
/// instance is first projected to the declaring type (through any ancestor
/// links), then the accessor method is used when the declaring type has one,
/// else the field storage directly.
#[derive(Clone)]
pub struct FieldRef {
    decl: FieldDecl,
    path: Arc<[UpcastFn]>,
    setter: Option<WriteFn>,
    getter: Option<ReadFn>,
}

impl FieldRef {
    pub(crate) fn resolve(decl: &FieldDecl, declaring: &ClassInfo, path: &[UpcastFn]) -> Self {
        Self {
            decl: decl.clone(),
            path: path.into(),
            setter: declaring.setter_for(decl).and_then(|m| m.write_fn()),
            getter: declaring.getter_for(decl).and_then(|m| m.read_fn()),
        }
    }

    /// Type that declares the field.
    pub fn owner(&self) -> TypeRef {
        self.decl.owner
    }

    pub fn name(&self) -> &'static str {
        self.decl.name
    }

    pub fn declared_type(&self) -> TypeRef {
        self.decl.ty
    }

    pub fn has_setter(&self) -> bool {
        self.setter.is_some()
    }

    pub fn has_getter(&self) -> bool {
        self.getter.is_some()
    }

    pub fn embedded_class(&self) -> Option<ClassRef> {
        self.decl.embedded_class()
    }

    pub(crate) fn decl(&self) -> &FieldDecl {
        &self.decl
    }

    /// Current value of the field, `None` while an optional slot is empty.
    pub fn read<'a>(
        &self,
        instance: &'a mut dyn Any,
    ) -> Result<Option<&'a mut dyn Any>, MappingError> {
        let owner = self.project(instance)?;
        let read = self.getter.as_ref().unwrap_or(&self.decl.read);
        read(owner).map_err(|reason| self.access_error(reason))
    }

    pub fn write(&self, instance: &mut dyn Any, value: Value) -> Result<(), MappingError> {
        let owner = self.project(instance)?;
        let write = self.setter.as_ref().unwrap_or(&self.decl.write);
        write(owner, value).map_err(|reason| self.access_error(reason))
    }

    /// Build a fresh instance of the field's declared type.
    pub fn construct(&self) -> Result<Value, MappingError> {
        let construct = self
            .decl
            .embed
            .as_ref()
            .ok_or_else(|| self.construction_error("field is not embeddable"))?
            .construct
            .as_ref()
            .ok_or_else(|| self.construction_error("no default construction available"))?;
        construct().map_err(|reason| self.construction_error(reason))
    }

    fn project<'a>(&self, instance: &'a mut dyn Any) -> Result<&'a mut dyn Any, MappingError> {
        let mut current = instance;
        for upcast in self.path.iter() {
            current = upcast(current)
                .ok_or_else(|| self.access_error("instance does not hold the declaring type"))?;
        }
        Ok(current)
    }

    fn access_error(&self, reason: impl Into<String>) -> MappingError {
        MappingError::Access {
            owner: self.decl.owner,
            field: self.decl.name,
            reason: reason.into(),
        }
    }

    fn construction_error(&self, reason: impl Into<String>) -> MappingError {
        MappingError::Construction {
            ty: self.decl.ty,
            field: self.decl.name,
            reason: reason.into(),
        }
    }
}

impl PartialEq for FieldRef {
    fn eq(&self, other: &Self) -> bool {
        self.decl.owner == other.decl.owner && self.decl.name == other.decl.name
    }
}

impl Eq for FieldRef {}

impl fmt::Debug for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}: {}",
            self.decl.owner, self.decl.name, self.decl.ty
        )
    }
}
