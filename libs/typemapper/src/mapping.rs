use std::any::Any;
use std::fmt;

use crate::error::MappingError;
use crate::field::FieldRef;
use crate::meta::{ClassRef, UpcastFn};
use crate::value::{TypeRef, Value};

/// One discovered mapped field together with its embedding context.
///
/// Invariant: the descriptor is embedded exactly when it has an embed anchor.
#[derive(Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    external_name: &'static str,
    target: FieldRef,
    embed_anchor: Option<FieldRef>,
}

impl FieldDescriptor {
    pub(crate) fn new(
        external_name: &'static str,
        target: FieldRef,
        embed_anchor: Option<FieldRef>,
    ) -> Self {
        Self {
            external_name,
            target,
            embed_anchor,
        }
    }

    /// Name the external data source uses for this field.
    pub fn external_name(&self) -> &'static str {
        self.external_name
    }

    pub fn target(&self) -> &FieldRef {
        &self.target
    }

    /// Declared type of the target field; selects the converter.
    pub fn field_type(&self) -> TypeRef {
        self.target.declared_type()
    }

    pub fn is_embedded(&self) -> bool {
        self.embed_anchor.is_some()
    }

    /// Field on the root that holds the embedded sub-object.
    pub fn embed_anchor(&self) -> Option<&FieldRef> {
        self.embed_anchor.as_ref()
    }

    /// Write `value` into the field this descriptor targets on `root`.
    ///
    /// For an embedded descriptor the sub-object is read through the anchor
    /// first; when it is missing a new one is constructed and stored at the
    /// anchor before the leaf write. That store stays in place even if the
    /// leaf write then fails.
    pub fn assign(&self, root: &mut dyn Any, value: Value) -> Result<(), MappingError> {
        tracing::trace!(
            field = self.external_name,
            target = ?self.target,
            value = value.type_name(),
            "assign"
        );
        match &self.embed_anchor {
            None => self.target.write(root, value),
            Some(anchor) => {
                let embedded = embedded_target(anchor, root)?;
                self.target.write(embedded, value)
            }
        }
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("external_name", &self.external_name)
            .field("target", &self.target)
            .field("embedded", &self.is_embedded())
            .field("embed_anchor", &self.embed_anchor)
            .finish()
    }
}

fn embedded_target<'a>(
    anchor: &FieldRef,
    root: &'a mut dyn Any,
) -> Result<&'a mut dyn Any, MappingError> {
    if anchor.read(root)?.is_none() {
        let fresh = anchor.construct()?;
        tracing::trace!(anchor = ?anchor, "initialised embedded object");
        anchor.write(root, fresh)?;
    }
    anchor.read(root)?.ok_or_else(|| MappingError::Access {
        owner: anchor.owner(),
        field: anchor.name(),
        reason: "embedded object still missing after initialisation".to_string(),
    })
}

/// Walk `class` and build its descriptor list.
///
/// Fields are visited in order: the type's own declared fields, then each
/// ancestor's outward. A mapped tag emits a descriptor. An embed tag, outside
/// an embedding, appends the embedded type's descriptors anchored at that
/// field; inside an embedding it is ignored, so embedding is one level deep.
/// The two tags are checked independently and may both fire on one field.
pub fn discover(
    class: &ClassRef,
    embedded: bool,
    embed_anchor: Option<&FieldRef>,
) -> Vec<FieldDescriptor> {
    let mut result = Vec::new();
    for field in declared_fields(class) {
        if let Some(name) = field.decl().mapped_name() {
            result.push(FieldDescriptor::new(
                name,
                field.clone(),
                embed_anchor.cloned(),
            ));
        }
        if !embedded && let Some(inner) = field.embedded_class() {
            result.extend(discover(&inner, true, Some(&field)));
        }
    }
    result
}

/// Own fields first, then every ancestor's, each resolved against the type
/// that declares it.
fn declared_fields(class: &ClassRef) -> Vec<FieldRef> {
    let mut fields = Vec::new();
    let mut path: Vec<UpcastFn> = Vec::new();
    let mut seen = vec![class.ty()];
    let mut info = class.describe();
    loop {
        fields.extend(
            info.fields()
                .iter()
                .map(|decl| FieldRef::resolve(decl, &info, &path)),
        );
        let Some(parent) = info.parent_link() else {
            break;
        };
        let ancestor = parent.class;
        if seen.contains(&ancestor.ty()) {
            tracing::warn!(class = %class.name(), ancestor = %ancestor.name(), "ancestor cycle, stopping walk");
            break;
        }
        seen.push(ancestor.ty());
        path.push(parent.upcast.clone());
        info = ancestor.describe();
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{ClassInfo, FieldDecl, Mapped, Method};

    #[derive(Default)]
    struct Address {
        city: String,
        zip: Option<String>,
    }

    impl Mapped for Address {
        fn class_info() -> ClassInfo {
            ClassInfo::new::<Self>()
                .field(
                    FieldDecl::new::<Self, String, _, _>(
                        "city",
                        |o| Some(&mut o.city),
                        |o, v| o.city = v,
                    )
                    .mapped("city"),
                )
                .field(
                    FieldDecl::new::<Self, String, _, _>(
                        "zip",
                        |o| o.zip.as_mut(),
                        |o, v| o.zip = Some(v),
                    )
                    .mapped("zip"),
                )
        }
    }

    #[derive(Default)]
    struct Base {
        id: i64,
        note: String,
    }

    impl Mapped for Base {
        fn class_info() -> ClassInfo {
            ClassInfo::new::<Self>()
                .field(
                    FieldDecl::new::<Self, i64, _, _>("id", |o| Some(&mut o.id), |o, v| o.id = v)
                        .mapped("id"),
                )
                .field(FieldDecl::new::<Self, String, _, _>(
                    "note",
                    |o| Some(&mut o.note),
                    |o, v| o.note = v,
                ))
                .method(Method::setter::<Self, i64, _>("id", |o, v| o.id = v * 10))
        }
    }

    #[derive(Default)]
    struct Customer {
        base: Base,
        name: String,
        age: i32,
        addr: Option<Address>,
        addr_gets: usize,
    }

    impl Mapped for Customer {
        fn class_info() -> ClassInfo {
            ClassInfo::new::<Self>()
                .field(
                    FieldDecl::new::<Self, String, _, _>(
                        "name",
                        |o| Some(&mut o.name),
                        |o, v| o.name = v,
                    )
                    .mapped("name"),
                )
                .field(
                    FieldDecl::new::<Self, i32, _, _>("age", |o| Some(&mut o.age), |o, v| o.age = v)
                        .mapped("age"),
                )
                .field(
                    FieldDecl::new::<Self, Address, _, _>(
                        "addr",
                        |o| o.addr.as_mut(),
                        |o, v| o.addr = Some(v),
                    )
                    .embed(),
                )
                .method(Method::getter::<Self, Address, _>("addr", |o| {
                    o.addr_gets += 1;
                    o.addr.as_mut()
                }))
                .parent::<Self, Base, _>(|o| &mut o.base)
        }
    }

    fn names(list: &[FieldDescriptor]) -> Vec<&'static str> {
        list.iter().map(FieldDescriptor::external_name).collect()
    }

    #[test]
    fn flat_class_yields_fields_in_declaration_order() {
        let list = discover(&ClassRef::of::<Address>(), false, None);
        assert_eq!(names(&list), ["city", "zip"]);
        assert!(list.iter().all(|d| !d.is_embedded()));
    }

    #[test]
    fn own_fields_then_embedded_then_ancestor() {
        let list = discover(&ClassRef::of::<Customer>(), false, None);
        assert_eq!(names(&list), ["name", "age", "city", "zip", "id"]);

        let city = &list[2];
        assert!(city.is_embedded());
        let anchor = city.embed_anchor().unwrap();
        assert_eq!(anchor.name(), "addr");
        assert_eq!(anchor.owner(), TypeRef::of::<Customer>());
        assert!(anchor.has_getter());

        let id = &list[4];
        assert!(!id.is_embedded());
        assert_eq!(id.target().owner(), TypeRef::of::<Base>());
        assert!(id.target().has_setter());
    }

    #[test]
    fn untagged_fields_are_skipped() {
        let list = discover(&ClassRef::of::<Base>(), false, None);
        assert_eq!(names(&list), ["id"]);
    }

    #[test]
    fn discovery_is_deterministic() {
        let first = discover(&ClassRef::of::<Customer>(), false, None);
        let second = discover(&ClassRef::of::<Customer>(), false, None);
        assert_eq!(first, second);
    }

    #[test]
    fn assign_plain_field_uses_storage() {
        let list = discover(&ClassRef::of::<Customer>(), false, None);
        let mut customer = Customer::default();
        list[0]
            .assign(&mut customer, Value::new("Ada".to_string()))
            .unwrap();
        list[1].assign(&mut customer, Value::new(36_i32)).unwrap();
        assert_eq!(customer.name, "Ada");
        assert_eq!(customer.age, 36);
    }

    #[test]
    fn assign_ancestor_field_uses_ancestor_setter() {
        let list = discover(&ClassRef::of::<Customer>(), false, None);
        let mut customer = Customer::default();
        list[4].assign(&mut customer, Value::new(4_i64)).unwrap();
        assert_eq!(customer.base.id, 40);
    }

    #[test]
    fn assign_embedded_initialises_missing_anchor() {
        let list = discover(&ClassRef::of::<Customer>(), false, None);
        let mut customer = Customer::default();
        assert!(customer.addr.is_none());

        list[2]
            .assign(&mut customer, Value::new("Oslo".to_string()))
            .unwrap();
        let addr = customer.addr.as_ref().unwrap();
        assert_eq!(addr.city, "Oslo");
        assert_eq!(addr.zip, None);
        assert!(customer.addr_gets >= 1);

        list[3]
            .assign(&mut customer, Value::new("0150".to_string()))
            .unwrap();
        let addr = customer.addr.as_ref().unwrap();
        assert_eq!(addr.city, "Oslo");
        assert_eq!(addr.zip.as_deref(), Some("0150"));
    }

    #[test]
    fn failed_leaf_write_keeps_initialised_anchor() {
        let list = discover(&ClassRef::of::<Customer>(), false, None);
        let mut customer = Customer::default();
        let err = list[2].assign(&mut customer, Value::new(1_u8)).unwrap_err();
        assert!(matches!(err, MappingError::Access { field: "city", .. }));
        assert!(customer.addr.is_some());
    }

    struct Fragile {
        inner: Option<Address>,
    }

    impl Mapped for Fragile {
        fn class_info() -> ClassInfo {
            ClassInfo::new::<Self>().field(
                FieldDecl::new::<Self, Address, _, _>(
                    "inner",
                    |o| o.inner.as_mut(),
                    |o, v| o.inner = Some(v),
                )
                .embed_with(|| Err("refused".to_string())),
            )
        }
    }

    #[test]
    fn construction_failure_propagates() {
        let list = discover(&ClassRef::of::<Fragile>(), false, None);
        let mut fragile = Fragile { inner: None };
        let err = list[0]
            .assign(&mut fragile, Value::new("Rome".to_string()))
            .unwrap_err();
        match err {
            MappingError::Construction { field, reason, .. } => {
                assert_eq!(field, "inner");
                assert_eq!(reason, "refused");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(fragile.inner.is_none());
    }

    struct Pinned {
        label: String,
        inner: Option<Address>,
    }

    impl Mapped for Pinned {
        fn class_info() -> ClassInfo {
            ClassInfo::new::<Self>()
                .field(
                    FieldDecl::new::<Self, String, _, _>(
                        "label",
                        |o| Some(&mut o.label),
                        |o, v| o.label = v,
                    )
                    .mapped("label"),
                )
                .field(
                    FieldDecl::new::<Self, Address, _, _>(
                        "inner",
                        |o| o.inner.as_mut(),
                        |o, v| o.inner = Some(v),
                    )
                    .embed_existing(),
                )
        }
    }

    #[test]
    fn empty_anchor_without_constructor_is_a_construction_error() {
        let list = discover(&ClassRef::of::<Pinned>(), false, None);
        assert_eq!(names(&list), ["label", "city", "zip"]);

        let mut pinned = Pinned {
            label: "keep".to_string(),
            inner: None,
        };
        let err = list[1]
            .assign(&mut pinned, Value::new("Rome".to_string()))
            .unwrap_err();
        match err {
            MappingError::Construction { ty, field, reason } => {
                assert_eq!(ty, TypeRef::of::<Address>());
                assert_eq!(field, "inner");
                assert_eq!(reason, "no default construction available");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(pinned.inner.is_none());
        assert_eq!(pinned.label, "keep");
    }

    #[test]
    fn existing_embedded_object_is_written_in_place() {
        let list = discover(&ClassRef::of::<Pinned>(), false, None);
        let mut pinned = Pinned {
            label: String::new(),
            inner: Some(Address::default()),
        };
        list[2]
            .assign(&mut pinned, Value::new("00100".to_string()))
            .unwrap();
        let inner = pinned.inner.as_ref().unwrap();
        assert_eq!(inner.zip.as_deref(), Some("00100"));
        assert_eq!(inner.city, "");
    }

    #[derive(Default)]
    struct Loop {
        inner: Option<Box<Loop>>,
    }

    impl Mapped for Loop {
        fn class_info() -> ClassInfo {
            ClassInfo::new::<Self>()
                .field(
                    FieldDecl::new::<Self, Self, _, _>(
                        "inner",
                        |o| o.inner.as_deref_mut(),
                        |o, v| o.inner = Some(Box::new(v)),
                    )
                    .mapped("inner")
                    .embed(),
                )
        }
    }

    #[test]
    fn self_embedding_stops_after_one_level() {
        let list = discover(&ClassRef::of::<Loop>(), false, None);
        assert_eq!(list.len(), 2);
        assert!(!list[0].is_embedded());
        assert!(list[1].is_embedded());
        assert_eq!(list[1].embed_anchor(), Some(list[0].target()));
    }

    struct Cyclic;

    impl Mapped for Cyclic {
        fn class_info() -> ClassInfo {
            ClassInfo::new::<Self>().parent::<Self, Self, _>(|o| o)
        }
    }

    #[test]
    fn ancestor_cycle_terminates() {
        assert!(discover(&ClassRef::of::<Cyclic>(), false, None).is_empty());
    }
}
