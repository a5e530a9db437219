pub mod cache;
pub mod config;
pub mod converter;
pub mod error;
pub mod field;
pub mod mapper;
pub mod mapping;
pub mod meta;
pub mod registry;
pub mod value;

pub use typemapper_derive::Mapped;

pub use cache::DescriptorCache;
pub use config::{FailurePolicy, MapperConfig};
pub use converter::{BoolConverter, Converter, ConverterRegistry, FromStrConverter};
pub use error::{ConversionFailure, MappingError};
pub use field::{AccessorKind, FieldRef, accessor_name};
pub use mapper::{FieldOutcome, MapReport, RowMapper, Skipped};
pub use mapping::{FieldDescriptor, discover};
pub use meta::{ClassInfo, ClassRef, FieldBuilder, FieldDecl, Mapped, Method};
pub use registry::MappingRegistry;
pub use value::{TypeRef, Value};
