use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{ConversionFailure, MappingError};
use crate::value::{TypeRef, Value};

/// Turns the textual form of a value into one target type.
///
/// Converters are stateless and shared. A malformed input is a
/// [`ConversionFailure`]; whether that skips the field or aborts the row is
/// the caller's decision.
pub trait Converter: Send + Sync {
    fn target(&self) -> TypeRef;

    fn convert(&self, raw: &str) -> Result<Value, ConversionFailure>;
}

/// Parses with the target type's own `FromStr` grammar.
pub struct FromStrConverter<T> {
    _target: PhantomData<fn() -> T>,
}

impl<T> FromStrConverter<T> {
    pub fn new() -> Self {
        Self {
            _target: PhantomData,
        }
    }
}

impl<T> Default for FromStrConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Converter for FromStrConverter<T>
where
    T: FromStr + Any,
    T::Err: fmt::Display,
{
    fn target(&self) -> TypeRef {
        TypeRef::of::<T>()
    }

    fn convert(&self, raw: &str) -> Result<Value, ConversionFailure> {
        raw.parse::<T>()
            .map(Value::new)
            .map_err(|e| ConversionFailure::new(self.target(), raw, e))
    }
}

/// Lenient booleans: `true/false`, `t/f`, `yes/no`, `1/0`, any case.
#[derive(Debug, Default, Clone, Copy)]
pub struct BoolConverter;

impl Converter for BoolConverter {
    fn target(&self) -> TypeRef {
        TypeRef::of::<bool>()
    }

    fn convert(&self, raw: &str) -> Result<Value, ConversionFailure> {
        match raw.to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "1" => Ok(Value::new(true)),
            "false" | "f" | "no" | "0" => Ok(Value::new(false)),
            _ => Err(ConversionFailure::new(
                self.target(),
                raw,
                "not a boolean literal",
            )),
        }
    }
}

/// Converters keyed by the exact type they produce.
///
/// No subtype fallback: a lookup only matches the type it was registered for.
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    converters: HashMap<TypeRef, Arc<dyn Converter>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the stock scalar converters.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_from_str::<i8>();
        registry.register_from_str::<i16>();
        registry.register_from_str::<i32>();
        registry.register_from_str::<i64>();
        registry.register_from_str::<i128>();
        registry.register_from_str::<isize>();
        registry.register_from_str::<u8>();
        registry.register_from_str::<u16>();
        registry.register_from_str::<u32>();
        registry.register_from_str::<u64>();
        registry.register_from_str::<u128>();
        registry.register_from_str::<usize>();
        registry.register_from_str::<f32>();
        registry.register_from_str::<f64>();
        registry.register_from_str::<char>();
        registry.register_from_str::<String>();
        registry.register(BoolConverter);
        registry
    }

    /// Add `converter` under its target type, returning the one it replaces.
    pub fn register<C>(&mut self, converter: C) -> Option<Arc<dyn Converter>>
    where
        C: Converter + 'static,
    {
        self.register_shared(Arc::new(converter))
    }

    pub fn register_shared(&mut self, converter: Arc<dyn Converter>) -> Option<Arc<dyn Converter>> {
        self.converters.insert(converter.target(), converter)
    }

    pub fn register_from_str<T>(&mut self) -> Option<Arc<dyn Converter>>
    where
        T: FromStr + Any,
        T::Err: fmt::Display,
    {
        self.register(FromStrConverter::<T>::new())
    }

    pub fn get(&self, ty: &TypeRef) -> Option<Arc<dyn Converter>> {
        self.converters.get(ty).cloned()
    }

    /// Like [`get`](Self::get), but a missing converter is an error.
    pub fn require(&self, ty: &TypeRef) -> Result<Arc<dyn Converter>, MappingError> {
        self.get(ty)
            .ok_or(MappingError::UnsupportedType { ty: *ty })
    }

    pub fn contains(&self, ty: &TypeRef) -> bool {
        self.converters.contains_key(ty)
    }

    /// Registered target types, sorted by name.
    pub fn types(&self) -> Vec<TypeRef> {
        let mut types: Vec<TypeRef> = self.converters.keys().copied().collect();
        types.sort_by_key(|t| t.name());
        types
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.types()).finish()
    }
}
