use std::sync::Arc;

use crate::cache::DescriptorCache;
use crate::config::MapperConfig;
use crate::converter::{Converter, ConverterRegistry};
use crate::error::MappingError;
use crate::mapping::FieldDescriptor;
use crate::meta::{ClassRef, Mapped};
use crate::value::TypeRef;

/// Long-lived mapping service: the descriptor cache plus the converter
/// registry.
///
/// Build one at startup and share it by reference (or `Arc`) with whatever
/// drives the mapping.
#[derive(Debug, Default)]
pub struct MappingRegistry {
    descriptors: DescriptorCache,
    converters: ConverterRegistry,
}

impl MappingRegistry {
    pub fn new(converters: ConverterRegistry) -> Self {
        Self {
            descriptors: DescriptorCache::new(),
            converters,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ConverterRegistry::with_defaults())
    }

    pub fn from_config(config: &MapperConfig) -> Self {
        if config.default_converters {
            Self::with_defaults()
        } else {
            Self::new(ConverterRegistry::new())
        }
    }

    pub fn descriptors<T: Mapped>(&self) -> Arc<[FieldDescriptor]> {
        self.descriptors_for(&ClassRef::of::<T>())
    }

    pub fn descriptors_for(&self, class: &ClassRef) -> Arc<[FieldDescriptor]> {
        self.descriptors.get(class)
    }

    /// First descriptor of `T` whose external name is `external_name`.
    pub fn descriptor<T: Mapped>(&self, external_name: &str) -> Option<FieldDescriptor> {
        self.descriptors::<T>()
            .iter()
            .find(|d| d.external_name() == external_name)
            .cloned()
    }

    pub fn converter(&self, ty: &TypeRef) -> Option<Arc<dyn Converter>> {
        self.converters.get(ty)
    }

    /// Converter for the descriptor's declared field type.
    pub fn converter_for(
        &self,
        descriptor: &FieldDescriptor,
    ) -> Result<Arc<dyn Converter>, MappingError> {
        self.converters.require(&descriptor.field_type())
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    pub fn converters_mut(&mut self) -> &mut ConverterRegistry {
        &mut self.converters
    }

    pub fn cache(&self) -> &DescriptorCache {
        &self.descriptors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FailurePolicy;
    use crate::meta::{ClassInfo, FieldDecl};
    use crate::value::Value;

    struct Point {
        x: f64,
        tag: Tag,
    }

    #[derive(Debug, PartialEq)]
    struct Tag(String);

    impl Mapped for Point {
        fn class_info() -> ClassInfo {
            ClassInfo::new::<Self>()
                .field(
                    FieldDecl::new::<Self, f64, _, _>("x", |o| Some(&mut o.x), |o, v| o.x = v)
                        .mapped("x"),
                )
                .field(
                    FieldDecl::new::<Self, Tag, _, _>("tag", |o| Some(&mut o.tag), |o, v| o.tag = v)
                        .mapped("tag"),
                )
        }
    }

    #[test]
    fn repeated_lookups_share_one_discovery() {
        let registry = MappingRegistry::with_defaults();
        let first = registry.descriptors::<Point>();
        let second = registry.descriptors::<Point>();
        assert_eq!(first, second);
        assert_eq!(registry.cache().discoveries(), 1);
    }

    #[test]
    fn descriptor_by_external_name() {
        let registry = MappingRegistry::with_defaults();
        let x = registry.descriptor::<Point>("x").unwrap();
        assert_eq!(x.field_type(), TypeRef::of::<f64>());
        assert!(registry.descriptor::<Point>("y").is_none());
    }

    #[test]
    fn converter_for_unsupported_field_type() {
        let registry = MappingRegistry::with_defaults();
        let tag = registry.descriptor::<Point>("tag").unwrap();
        let err = registry.converter_for(&tag).err().unwrap();
        assert!(matches!(err, MappingError::UnsupportedType { ty } if ty == TypeRef::of::<Tag>()));
    }

    #[test]
    fn converters_can_be_added_after_construction() {
        let mut registry = MappingRegistry::new(ConverterRegistry::new());
        let x = registry.descriptor::<Point>("x").unwrap();
        assert!(registry.converter_for(&x).is_err());

        registry.converters_mut().register_from_str::<f64>();
        let value = registry.converter_for(&x).unwrap().convert("2.5").unwrap();
        assert_eq!(value.downcast::<f64>().unwrap(), 2.5);

        let mut point = Point {
            x: 0.0,
            tag: Tag(String::new()),
        };
        x.assign(&mut point, Value::new(2.5_f64)).unwrap();
        assert_eq!(point.x, 2.5);
        assert_eq!(point.tag, Tag(String::new()));
    }

    #[test]
    fn config_controls_default_converters() {
        let bare = MappingRegistry::from_config(&MapperConfig {
            on_conversion_failure: FailurePolicy::Abort,
            default_converters: false,
        });
        assert!(bare.converters().is_empty());

        let stocked = MappingRegistry::from_config(&MapperConfig::default());
        assert!(stocked.converter(&TypeRef::of::<i32>()).is_some());
    }
}
