//! Class metadata: the data the discovery walk reads.
//!
//! Rust has no runtime reflection, so every mapped type describes itself
//! through [`Mapped::class_info`]. `#[derive(Mapped)]` writes that description
//! from field attributes; it can also be assembled by hand with the builders
//! below.
//!
//! Direct storage access is an explicit capability here: the read/write
//! closures of a [`FieldDecl`] are created inside the declaring module, so
//! they reach private fields that no outside code could touch.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::field::{AccessorKind, accessor_name};
use crate::value::{TypeRef, Value};

pub(crate) type ReadFn = Arc<
    dyn for<'a> Fn(&'a mut dyn Any) -> Result<Option<&'a mut dyn Any>, String> + Send + Sync,
>;
pub(crate) type WriteFn = Arc<dyn Fn(&mut dyn Any, Value) -> Result<(), String> + Send + Sync>;
pub(crate) type UpcastFn =
    Arc<dyn for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any> + Send + Sync>;
pub(crate) type ConstructFn = Arc<dyn Fn() -> Result<Value, String> + Send + Sync>;

/// A type that can describe its mapped fields.
pub trait Mapped: Any {
    fn class_info() -> ClassInfo;
}

/// Handle to a mapped type: its identity plus the way to describe it.
#[derive(Clone, Copy)]
pub struct ClassRef {
    ty: TypeRef,
    describe: fn() -> ClassInfo,
}

impl ClassRef {
    pub fn of<T: Mapped>() -> Self {
        Self {
            ty: TypeRef::of::<T>(),
            describe: T::class_info,
        }
    }

    pub fn ty(&self) -> TypeRef {
        self.ty
    }

    pub fn name(&self) -> &'static str {
        self.ty.name()
    }

    pub fn describe(&self) -> ClassInfo {
        (self.describe)()
    }
}

impl PartialEq for ClassRef {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty
    }
}

impl Eq for ClassRef {}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassRef({})", self.ty)
    }
}

/// Declared shape of one type: its own fields in declaration order, its
/// accessor methods and its ancestor, if any.
pub struct ClassInfo {
    ty: TypeRef,
    fields: Vec<FieldDecl>,
    methods: Vec<Method>,
    parent: Option<ParentLink>,
}

impl ClassInfo {
    pub fn new<T: Any>() -> Self {
        Self {
            ty: TypeRef::of::<T>(),
            fields: Vec::new(),
            methods: Vec::new(),
            parent: None,
        }
    }

    pub fn field(mut self, field: impl Into<FieldDecl>) -> Self {
        self.fields.push(field.into());
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    /// Declare `P` as the ancestor of `C`, reachable through `project`.
    ///
    /// Ancestor fields are collected after the type's own fields; their
    /// accessors are looked up on `P`'s own method table.
    pub fn parent<C, P, F>(mut self, project: F) -> Self
    where
        C: Any,
        P: Mapped,
        F: Fn(&mut C) -> &mut P + Send + Sync + 'static,
    {
        let upcast = upcast_fn(move |child| {
            child
                .downcast_mut::<C>()
                .map(|child| project(child) as &mut dyn Any)
        });
        self.parent = Some(ParentLink {
            class: ClassRef::of::<P>(),
            upcast,
        });
        self
    }

    pub fn ty(&self) -> TypeRef {
        self.ty
    }

    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn parent_class(&self) -> Option<ClassRef> {
        self.parent.as_ref().map(|p| p.class)
    }

    pub(crate) fn parent_link(&self) -> Option<&ParentLink> {
        self.parent.as_ref()
    }

    /// `set<Name>` taking exactly the field's declared type.
    pub fn setter_for(&self, field: &FieldDecl) -> Option<&Method> {
        let name = accessor_name(AccessorKind::Set, field.name);
        self.methods.iter().find(|m| {
            m.name == name && matches!(&m.kind, MethodKind::Setter { param, .. } if *param == field.ty)
        })
    }

    /// `get<Name>` taking no parameter.
    pub fn getter_for(&self, field: &FieldDecl) -> Option<&Method> {
        let name = accessor_name(AccessorKind::Get, field.name);
        self.methods
            .iter()
            .find(|m| m.name == name && matches!(m.kind, MethodKind::Getter { .. }))
    }
}

impl fmt::Debug for ClassInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassInfo")
            .field("ty", &self.ty)
            .field("fields", &self.fields)
            .field("methods", &self.methods)
            .field("parent", &self.parent_class())
            .finish()
    }
}

pub(crate) struct ParentLink {
    pub(crate) class: ClassRef,
    pub(crate) upcast: UpcastFn,
}

/// Embedding context of an `#[embed]` field.
#[derive(Clone)]
pub(crate) struct EmbedInfo {
    pub(crate) class: ClassRef,
    pub(crate) construct: Option<ConstructFn>,
}

/// One declared field, type-erased.
#[derive(Clone)]
pub struct FieldDecl {
    pub(crate) name: &'static str,
    pub(crate) owner: TypeRef,
    pub(crate) ty: TypeRef,
    pub(crate) mapped: Option<&'static str>,
    pub(crate) embed: Option<EmbedInfo>,
    pub(crate) read: ReadFn,
    pub(crate) write: WriteFn,
}

impl FieldDecl {
    /// Start describing field `name` of `O` whose declared type is `T`.
    ///
    /// `read` yields the stored value, or `None` while an optional slot is
    /// empty. `write` stores a value of the declared type.
    pub fn new<O, T, R, W>(name: &'static str, read: R, write: W) -> FieldBuilder<O, T>
    where
        O: Any,
        T: Any,
        R: for<'a> Fn(&'a mut O) -> Option<&'a mut T> + Send + Sync + 'static,
        W: Fn(&mut O, T) + Send + Sync + 'static,
    {
        FieldBuilder {
            decl: FieldDecl {
                name,
                owner: TypeRef::of::<O>(),
                ty: TypeRef::of::<T>(),
                mapped: None,
                embed: None,
                read: erase_read(read),
                write: erase_write(write),
            },
            _types: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn owner(&self) -> TypeRef {
        self.owner
    }

    pub fn declared_type(&self) -> TypeRef {
        self.ty
    }

    /// External name carried by the mapped-field tag.
    pub fn mapped_name(&self) -> Option<&'static str> {
        self.mapped
    }

    pub fn is_embeddable(&self) -> bool {
        self.embed.is_some()
    }

    pub fn embedded_class(&self) -> Option<ClassRef> {
        self.embed.as_ref().map(|e| e.class)
    }
}

impl fmt::Debug for FieldDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDecl")
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("mapped", &self.mapped)
            .field("embed", &self.embedded_class())
            .finish()
    }
}

/// Typed builder returned by [`FieldDecl::new`].
pub struct FieldBuilder<O, T> {
    decl: FieldDecl,
    _types: PhantomData<fn(O) -> T>,
}

impl<O: Any, T: Any> FieldBuilder<O, T> {
    /// Tag as a mapped field known externally as `external_name`.
    pub fn mapped(mut self, external_name: &'static str) -> Self {
        self.decl.mapped = Some(external_name);
        self
    }

    /// Tag as embeddable; a missing sub-object is built with `T::default()`.
    pub fn embed(self) -> Self
    where
        T: Mapped + Default,
    {
        self.embed_with(|| Ok(T::default()))
    }

    /// Tag as embeddable with a custom construction routine.
    pub fn embed_with<F>(mut self, construct: F) -> Self
    where
        T: Mapped,
        F: Fn() -> Result<T, String> + Send + Sync + 'static,
    {
        let construct: ConstructFn = Arc::new(move || construct().map(Value::new));
        self.decl.embed = Some(EmbedInfo {
            class: ClassRef::of::<T>(),
            construct: Some(construct),
        });
        self
    }

    /// Tag as embeddable without any way to construct a missing sub-object.
    pub fn embed_existing(mut self) -> Self
    where
        T: Mapped,
    {
        self.decl.embed = Some(EmbedInfo {
            class: ClassRef::of::<T>(),
            construct: None,
        });
        self
    }

    pub fn build(self) -> FieldDecl {
        self.decl
    }
}

impl<O: Any, T: Any> From<FieldBuilder<O, T>> for FieldDecl {
    fn from(builder: FieldBuilder<O, T>) -> Self {
        builder.build()
    }
}

/// A named accessor method of a mapped type.
pub struct Method {
    name: String,
    kind: MethodKind,
}

pub(crate) enum MethodKind {
    Setter { param: TypeRef, invoke: WriteFn },
    Getter { returns: TypeRef, invoke: ReadFn },
}

impl Method {
    /// Register `set<Field>` taking one `T`.
    pub fn setter<O, T, F>(field: &str, set: F) -> Self
    where
        O: Any,
        T: Any,
        F: Fn(&mut O, T) + Send + Sync + 'static,
    {
        Self {
            name: accessor_name(AccessorKind::Set, field),
            kind: MethodKind::Setter {
                param: TypeRef::of::<T>(),
                invoke: erase_write(set),
            },
        }
    }

    /// Register `get<Field>` yielding the held `T`, if any.
    pub fn getter<O, T, F>(field: &str, get: F) -> Self
    where
        O: Any,
        T: Any,
        F: for<'a> Fn(&'a mut O) -> Option<&'a mut T> + Send + Sync + 'static,
    {
        Self {
            name: accessor_name(AccessorKind::Get, field),
            kind: MethodKind::Getter {
                returns: TypeRef::of::<T>(),
                invoke: erase_read(get),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn write_fn(&self) -> Option<WriteFn> {
        match &self.kind {
            MethodKind::Setter { invoke, .. } => Some(invoke.clone()),
            MethodKind::Getter { .. } => None,
        }
    }

    pub(crate) fn read_fn(&self) -> Option<ReadFn> {
        match &self.kind {
            MethodKind::Getter { invoke, .. } => Some(invoke.clone()),
            MethodKind::Setter { .. } => None,
        }
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            MethodKind::Setter { param, .. } => write!(f, "{}({param})", self.name),
            MethodKind::Getter { returns, .. } => write!(f, "{}() -> {returns}", self.name),
        }
    }
}

fn erase_read<O, T, F>(read: F) -> ReadFn
where
    O: Any,
    T: Any,
    F: for<'a> Fn(&'a mut O) -> Option<&'a mut T> + Send + Sync + 'static,
{
    read_fn(move |owner| match owner.downcast_mut::<O>() {
        Some(owner) => Ok(read(owner).map(|held| held as &mut dyn Any)),
        None => Err(format!("instance is not a {}", std::any::type_name::<O>())),
    })
}

fn erase_write<O, T, F>(write: F) -> WriteFn
where
    O: Any,
    T: Any,
    F: Fn(&mut O, T) + Send + Sync + 'static,
{
    Arc::new(move |owner: &mut dyn Any, value: Value| {
        let Some(owner) = owner.downcast_mut::<O>() else {
            return Err(format!("instance is not a {}", std::any::type_name::<O>()));
        };
        let value = value.downcast::<T>().map_err(|value| {
            format!(
                "expected a {} value, got {}",
                std::any::type_name::<T>(),
                value.type_name()
            )
        })?;
        write(owner, value);
        Ok(())
    })
}

fn read_fn<F>(f: F) -> ReadFn
where
    F: for<'a> Fn(&'a mut dyn Any) -> Result<Option<&'a mut dyn Any>, String>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

fn upcast_fn<F>(f: F) -> UpcastFn
where
    F: for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any> + Send + Sync + 'static,
{
    Arc::new(f)
}
