use crate::{
    db::{
        backend::{NullSlots, StorageBackend, UniqueOutcome},
        query::{Query, StringOrder},
    },
    error::Error,
    model::{EntityKind, PropertyRef},
    value::{TypeTag, Value},
};

///
/// NullValue
///
/// Substitute returned in place of engine nulls by property retrievals.
/// Only strings and numbers are representable, which is the whole contract:
/// anything else is rejected at compile time by the `From` surface.
///

#[derive(Clone, Debug, PartialEq)]
pub enum NullValue {
    Text(String),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl NullValue {
    /// String slot crossing the capability boundary.
    pub(crate) fn string_slot(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Long slot: any numeric substitute that is not a float or double.
    pub(crate) const fn long_slot(&self) -> i64 {
        match self {
            Self::Long(value) => *value,
            _ => 0,
        }
    }

    pub(crate) const fn float_slot(&self) -> f32 {
        match self {
            Self::Float(value) => *value,
            _ => 0.0,
        }
    }

    pub(crate) const fn double_slot(&self) -> f64 {
        match self {
            Self::Double(value) => *value,
            _ => 0.0,
        }
    }

    pub(crate) fn slots(&self) -> NullSlots {
        NullSlots {
            enabled: true,
            long_value: self.long_slot(),
            float_value: self.float_slot(),
            double_value: self.double_slot(),
        }
    }
}

impl From<&str> for NullValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for NullValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i8> for NullValue {
    fn from(value: i8) -> Self {
        Self::Long(i64::from(value))
    }
}

impl From<i16> for NullValue {
    fn from(value: i16) -> Self {
        Self::Long(i64::from(value))
    }
}

impl From<i32> for NullValue {
    fn from(value: i32) -> Self {
        Self::Long(i64::from(value))
    }
}

impl From<i64> for NullValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<u8> for NullValue {
    fn from(value: u8) -> Self {
        Self::Long(i64::from(value))
    }
}

impl From<u16> for NullValue {
    fn from(value: u16) -> Self {
        Self::Long(i64::from(value))
    }
}

impl From<u32> for NullValue {
    fn from(value: u32) -> Self {
        Self::Long(i64::from(value))
    }
}

impl From<f32> for NullValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<f64> for NullValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

///
/// PropertyQuery
///
/// Runs the parent query but returns a single property's values or an
/// aggregate; created via [`Query::property`]. Values do not follow any
/// ordering defined on the parent query.
///
/// Configuration is fluent and reusable; [`PropertyQuery::reset`] restores
/// the state immediately after construction.
///

pub struct PropertyQuery<'q, E: EntityKind, B: StorageBackend> {
    query: &'q Query<E, B>,
    property: PropertyRef,
    distinct: bool,
    no_case_if_distinct: bool,
    unique: bool,
    null_value: Option<NullValue>,
}

impl<'q, E: EntityKind, B: StorageBackend> PropertyQuery<'q, E, B> {
    pub(crate) const fn new(query: &'q Query<E, B>, property: PropertyRef) -> Self {
        Self {
            query,
            property,
            distinct: false,
            no_case_if_distinct: true,
            unique: false,
            null_value: None,
        }
    }

    #[must_use]
    pub const fn property(&self) -> PropertyRef {
        self.property
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Return each distinct value once, e.g. 1,2,3 instead of 1,1,2,3,3.
    /// String properties compare case-insensitively by default; see
    /// [`Self::distinct_with_order`].
    pub fn distinct(&mut self) -> &mut Self {
        self.distinct = true;
        self
    }

    /// Distinct with an explicit case mode. Reserved for string
    /// properties: `CaseSensitive` keeps "foo", "Foo", and "FOO" apart.
    pub fn distinct_with_order(&mut self, order: StringOrder) -> Result<&mut Self, Error> {
        if self.property.tag() != TypeTag::String {
            return Err(Error::invalid_argument(format!(
                "distinct with a string order is reserved for string properties, but `{}` is {}",
                self.property.name(),
                self.property.tag(),
            )));
        }
        self.distinct = true;
        self.no_case_if_distinct = !order.case_sensitive();
        Ok(self)
    }

    /// For scalar finds, verify the result is the only one and fail with
    /// [`Error::NotUnique`] otherwise. Combinable with [`Self::distinct`];
    /// array-returning finds ignore it.
    pub fn unique(&mut self) -> &mut Self {
        self.unique = true;
        self
    }

    /// Return `value` in place of nulls, which are otherwise excluded from
    /// results. E.g. `-1` for numbers or `"NULL"` for strings.
    pub fn null_value(&mut self, value: impl Into<NullValue>) -> &mut Self {
        self.null_value = Some(value.into());
        self
    }

    /// Clear all configuration (distinct, unique, and the null substitute).
    pub fn reset(&mut self) -> &mut Self {
        self.distinct = false;
        self.no_case_if_distinct = true;
        self.unique = false;
        self.null_value = None;
        self
    }

    // ------------------------------------------------------------------
    // Array retrieval
    // ------------------------------------------------------------------

    /// Values of this string property for all matches. Nulls are excluded
    /// unless a substitute is configured; ordering is unspecified.
    pub fn find_strings(&self) -> Result<Vec<String>, Error> {
        let distinct_no_case = self.distinct && self.no_case_if_distinct;
        self.query.run_property(|backend, handle, cursor| {
            backend
                .find_strings(
                    handle,
                    cursor,
                    self.property.id(),
                    self.distinct,
                    distinct_no_case,
                    self.null_value.as_ref().and_then(NullValue::string_slot),
                )
                .map_err(Error::from)
        })
    }

    pub fn find_longs(&self) -> Result<Vec<i64>, Error> {
        self.query.run_property(|backend, handle, cursor| {
            backend
                .find_longs(
                    handle,
                    cursor,
                    self.property.id(),
                    self.distinct,
                    self.null_value.as_ref().map(NullValue::long_slot),
                )
                .map_err(Error::from)
        })
    }

    pub fn find_ints(&self) -> Result<Vec<i32>, Error> {
        #[expect(clippy::cast_possible_truncation)]
        let null_value = self
            .null_value
            .as_ref()
            .map(|value| value.long_slot() as i32);
        self.query.run_property(|backend, handle, cursor| {
            backend
                .find_ints(
                    handle,
                    cursor,
                    self.property.id(),
                    self.distinct,
                    null_value,
                )
                .map_err(Error::from)
        })
    }

    pub fn find_shorts(&self) -> Result<Vec<i16>, Error> {
        #[expect(clippy::cast_possible_truncation)]
        let null_value = self
            .null_value
            .as_ref()
            .map(|value| value.long_slot() as i16);
        self.query.run_property(|backend, handle, cursor| {
            backend
                .find_shorts(
                    handle,
                    cursor,
                    self.property.id(),
                    self.distinct,
                    null_value,
                )
                .map_err(Error::from)
        })
    }

    pub fn find_chars(&self) -> Result<Vec<char>, Error> {
        #[expect(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let null_value = self
            .null_value
            .as_ref()
            .map(|value| char::from_u32(value.long_slot() as u32).unwrap_or('\0'));
        self.query.run_property(|backend, handle, cursor| {
            backend
                .find_chars(
                    handle,
                    cursor,
                    self.property.id(),
                    self.distinct,
                    null_value,
                )
                .map_err(Error::from)
        })
    }

    pub fn find_bytes(&self) -> Result<Vec<i8>, Error> {
        #[expect(clippy::cast_possible_truncation)]
        let null_value = self
            .null_value
            .as_ref()
            .map(|value| value.long_slot() as i8);
        self.query.run_property(|backend, handle, cursor| {
            backend
                .find_bytes(
                    handle,
                    cursor,
                    self.property.id(),
                    self.distinct,
                    null_value,
                )
                .map_err(Error::from)
        })
    }

    pub fn find_floats(&self) -> Result<Vec<f32>, Error> {
        let null_value = self.null_value.as_ref().map(NullValue::float_slot);
        self.query.run_property(|backend, handle, cursor| {
            backend
                .find_floats(
                    handle,
                    cursor,
                    self.property.id(),
                    self.distinct,
                    null_value,
                )
                .map_err(Error::from)
        })
    }

    pub fn find_doubles(&self) -> Result<Vec<f64>, Error> {
        let null_value = self.null_value.as_ref().map(NullValue::double_slot);
        self.query.run_property(|backend, handle, cursor| {
            backend
                .find_doubles(
                    handle,
                    cursor,
                    self.property.id(),
                    self.distinct,
                    null_value,
                )
                .map_err(Error::from)
        })
    }

    // ------------------------------------------------------------------
    // Scalar retrieval
    // ------------------------------------------------------------------

    /// First (or unique) value of this string property.
    pub fn find_string(&self) -> Result<Option<String>, Error> {
        let distinct_case = self.distinct && !self.no_case_if_distinct;
        let outcome = self.query.run_property(|backend, handle, cursor| {
            backend
                .find_scalar_string(
                    handle,
                    cursor,
                    self.property.id(),
                    self.unique,
                    self.distinct,
                    distinct_case,
                    self.null_value.as_ref().and_then(NullValue::string_slot),
                )
                .map_err(Error::from)
        })?;
        Self::unwrap_unique(outcome)
    }

    pub fn find_long(&self) -> Result<Option<i64>, Error> {
        match self.find_scalar()? {
            None => Ok(None),
            Some(value) => value
                .as_long()
                .map(Some)
                .ok_or_else(|| self.type_mismatch(&value, "long")),
        }
    }

    pub fn find_int(&self) -> Result<Option<i32>, Error> {
        match self.find_long()? {
            None => Ok(None),
            Some(value) => i32::try_from(value)
                .map(Some)
                .map_err(|_| Error::invalid_argument("property value does not fit an int")),
        }
    }

    pub fn find_short(&self) -> Result<Option<i16>, Error> {
        match self.find_long()? {
            None => Ok(None),
            Some(value) => i16::try_from(value)
                .map(Some)
                .map_err(|_| Error::invalid_argument("property value does not fit a short")),
        }
    }

    pub fn find_char(&self) -> Result<Option<char>, Error> {
        match self.find_scalar()? {
            None => Ok(None),
            Some(Value::Char(value)) => Ok(Some(value)),
            Some(value) => Err(self.type_mismatch(&value, "char")),
        }
    }

    pub fn find_byte(&self) -> Result<Option<i8>, Error> {
        match self.find_long()? {
            None => Ok(None),
            Some(value) => i8::try_from(value)
                .map(Some)
                .map_err(|_| Error::invalid_argument("property value does not fit a byte")),
        }
    }

    pub fn find_boolean(&self) -> Result<Option<bool>, Error> {
        match self.find_scalar()? {
            None => Ok(None),
            Some(Value::Bool(value)) => Ok(Some(value)),
            Some(value) => value
                .as_long()
                .map(|packed| Some(packed != 0))
                .ok_or_else(|| self.type_mismatch(&value, "boolean")),
        }
    }

    pub fn find_float(&self) -> Result<Option<f32>, Error> {
        match self.find_scalar()? {
            None => Ok(None),
            Some(Value::Float(value)) => Ok(Some(value)),
            Some(value) => Err(self.type_mismatch(&value, "float")),
        }
    }

    pub fn find_double(&self) -> Result<Option<f64>, Error> {
        match self.find_scalar()? {
            None => Ok(None),
            Some(value) => value
                .as_double()
                .map(Some)
                .ok_or_else(|| self.type_mismatch(&value, "double")),
        }
    }

    fn find_scalar(&self) -> Result<Option<Value>, Error> {
        let nulls = self
            .null_value
            .as_ref()
            .map(NullValue::slots)
            .unwrap_or_default();
        let outcome = self.query.run_property(|backend, handle, cursor| {
            backend
                .find_scalar_number(
                    handle,
                    cursor,
                    self.property.id(),
                    self.unique,
                    self.distinct,
                    nulls,
                )
                .map_err(Error::from)
        })?;
        Self::unwrap_unique(outcome)
    }

    fn unwrap_unique<T>(outcome: UniqueOutcome<T>) -> Result<Option<T>, Error> {
        match outcome {
            UniqueOutcome::Empty => Ok(None),
            UniqueOutcome::Unique(value) => Ok(Some(value)),
            UniqueOutcome::Ambiguous => Err(Error::NotUnique),
        }
    }

    fn type_mismatch(&self, value: &Value, wanted: &str) -> Error {
        Error::invalid_argument(format!(
            "property `{}` returned {:?}, not a {wanted}",
            self.property.name(),
            value,
        ))
    }

    // ------------------------------------------------------------------
    // Aggregates
    // ------------------------------------------------------------------

    /// Sum over all matches. A post-filter on the parent query is silently
    /// ignored, as by every aggregate.
    pub fn sum(&self) -> Result<i64, Error> {
        self.query.run_property(|backend, handle, cursor| {
            backend
                .sum(handle, cursor, self.property.id())
                .map_err(Error::from)
        })
    }

    pub fn sum_double(&self) -> Result<f64, Error> {
        self.query.run_property(|backend, handle, cursor| {
            backend
                .sum_double(handle, cursor, self.property.id())
                .map_err(Error::from)
        })
    }

    pub fn min(&self) -> Result<i64, Error> {
        self.query.run_property(|backend, handle, cursor| {
            backend
                .min(handle, cursor, self.property.id())
                .map_err(Error::from)
        })
    }

    pub fn max(&self) -> Result<i64, Error> {
        self.query.run_property(|backend, handle, cursor| {
            backend
                .max(handle, cursor, self.property.id())
                .map_err(Error::from)
        })
    }

    pub fn min_double(&self) -> Result<f64, Error> {
        self.query.run_property(|backend, handle, cursor| {
            backend
                .min_double(handle, cursor, self.property.id())
                .map_err(Error::from)
        })
    }

    pub fn max_double(&self) -> Result<f64, Error> {
        self.query.run_property(|backend, handle, cursor| {
            backend
                .max_double(handle, cursor, self.property.id())
                .map_err(Error::from)
        })
    }

    /// Average over all matches, always floating point.
    pub fn avg(&self) -> Result<f64, Error> {
        self.query.run_property(|backend, handle, cursor| {
            backend
                .avg(handle, cursor, self.property.id())
                .map_err(Error::from)
        })
    }
}
