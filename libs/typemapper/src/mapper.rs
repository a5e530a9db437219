use crate::config::FailurePolicy;
use crate::error::{ConversionFailure, MappingError};
use crate::mapping::FieldDescriptor;
use crate::meta::Mapped;
use crate::registry::MappingRegistry;

/// What happened to one `(column, raw)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    Assigned,
    /// The converter rejected the text; the field was left untouched.
    Skipped(ConversionFailure),
    /// No descriptor carries this external name.
    Unmatched,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub column: String,
    pub failure: ConversionFailure,
}

/// Per-row summary returned by [`RowMapper::map_row`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapReport {
    pub assigned: Vec<String>,
    pub skipped: Vec<Skipped>,
    pub unmatched: Vec<String>,
}

impl MapReport {
    /// Every column found a field and every value converted.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.unmatched.is_empty()
    }

    fn record(&mut self, column: &str, outcome: FieldOutcome) {
        match outcome {
            FieldOutcome::Assigned => self.assigned.push(column.to_string()),
            FieldOutcome::Skipped(failure) => self.skipped.push(Skipped {
                column: column.to_string(),
                failure,
            }),
            FieldOutcome::Unmatched => self.unmatched.push(column.to_string()),
        }
    }
}

/// Drives the mapping of external rows onto objects.
///
/// For each pair: find the descriptor by external name, fetch the converter
/// for its field type, convert, assign. A missing converter, an access
/// failure or a construction failure aborts the row; a rejected value is
/// handled by the [`FailurePolicy`].
#[derive(Debug, Clone, Copy)]
pub struct RowMapper<'r> {
    registry: &'r MappingRegistry,
    policy: FailurePolicy,
}

impl<'r> RowMapper<'r> {
    pub fn new(registry: &'r MappingRegistry, policy: FailurePolicy) -> Self {
        Self { registry, policy }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Map one column of `target`.
    pub fn map_field<T: Mapped>(
        &self,
        target: &mut T,
        column: &str,
        raw: &str,
    ) -> Result<FieldOutcome, MappingError> {
        let descriptors = self.registry.descriptors::<T>();
        let Some(descriptor) = descriptors.iter().find(|d| d.external_name() == column) else {
            tracing::debug!(column, target = std::any::type_name::<T>(), "no mapped field");
            return Ok(FieldOutcome::Unmatched);
        };
        self.apply(descriptor, target, raw)
            .map_err(|e| e.with_context(format!("column '{column}'")))
    }

    pub fn map_row<T, I, K, V>(&self, target: &mut T, row: I) -> Result<MapReport, MappingError>
    where
        T: Mapped,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut report = MapReport::default();
        for (column, raw) in row {
            let column = column.as_ref();
            let outcome = self.map_field(target, column, raw.as_ref())?;
            report.record(column, outcome);
        }
        Ok(report)
    }

    /// Map a row onto a freshly defaulted `T`.
    pub fn map_new<T, I, K, V>(&self, row: I) -> Result<(T, MapReport), MappingError>
    where
        T: Mapped + Default,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut target = T::default();
        let report = self.map_row(&mut target, row)?;
        Ok((target, report))
    }

    fn apply<T: Mapped>(
        &self,
        descriptor: &FieldDescriptor,
        target: &mut T,
        raw: &str,
    ) -> Result<FieldOutcome, MappingError> {
        let converter = self.registry.converter_for(descriptor)?;
        let value = match converter.convert(raw) {
            Ok(value) => value,
            Err(failure) => match self.policy {
                FailurePolicy::Skip => {
                    tracing::warn!(
                        column = descriptor.external_name(),
                        error = %failure,
                        "bad value, skipping field"
                    );
                    return Ok(FieldOutcome::Skipped(failure));
                }
                FailurePolicy::Abort => return Err(failure.into()),
            },
        };
        descriptor.assign(target, value)?;
        Ok(FieldOutcome::Assigned)
    }
}
