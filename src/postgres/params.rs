use std::error::Error;

use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use tokio_util::bytes;

use crate::error::DbUtilsError;
use crate::types::{ConversionMode, ParamConverter, RowValues};

/// Borrowed view of `RowValues` in the shape the driver expects.
pub struct Params<'a> {
    references: Vec<&'a (dyn ToSql + Sync)>,
}

impl<'a> Params<'a> {
    /// Convert from a slice of `RowValues` to Postgres parameters
    ///
    /// # Errors
    /// Never fails today; kept fallible to match [`ParamConverter`].
    pub fn convert(params: &'a [RowValues]) -> Result<Params<'a>, DbUtilsError> {
        let mut references = Vec::with_capacity(params.len());
        for p in params {
            references.push(p as &(dyn ToSql + Sync));
        }
        Ok(Params { references })
    }

    /// Get a reference to the underlying parameter array
    #[must_use]
    pub fn as_refs(&self) -> &[&(dyn ToSql + Sync)] {
        &self.references
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.references.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}

impl<'a> ParamConverter<'a> for Params<'a> {
    type Converted = Params<'a>;

    fn convert_sql_params(
        params: &'a [RowValues],
        _mode: ConversionMode,
    ) -> Result<Self::Converted, DbUtilsError> {
        Self::convert(params)
    }
}

impl ToSql for RowValues {
    /// Encode for the parameter's declared type.
    ///
    /// Integers widen to float columns and timestamps narrow to dates; any other
    /// variant/type mismatch is rejected instead of sending the wrong wire format.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match (self, ty) {
            (RowValues::Null, _) => Ok(IsNull::Yes),
            (RowValues::Int(i), &Type::INT2) => i16::try_from(*i)?.to_sql(ty, out),
            (RowValues::Int(i), &Type::INT4) => i32::try_from(*i)?.to_sql(ty, out),
            (RowValues::Int(i), &Type::INT8) => (*i).to_sql(ty, out),
            (RowValues::Int(i), &Type::FLOAT4) => (*i as f32).to_sql(ty, out),
            (RowValues::Int(i), &Type::FLOAT8) => (*i as f64).to_sql(ty, out),
            (RowValues::Float(f), &Type::FLOAT4) => (*f as f32).to_sql(ty, out),
            (RowValues::Float(f), &Type::FLOAT8) => (*f).to_sql(ty, out),
            (RowValues::Text(s), &Type::TEXT | &Type::VARCHAR | &Type::BPCHAR | &Type::NAME) => {
                s.to_sql(ty, out)
            }
            (RowValues::Bool(b), &Type::BOOL) => (*b).to_sql(ty, out),
            (RowValues::Timestamp(dt), &Type::TIMESTAMP) => dt.to_sql(ty, out),
            (RowValues::Timestamp(dt), &Type::TIMESTAMPTZ) => dt.and_utc().to_sql(ty, out),
            (RowValues::Timestamp(dt), &Type::DATE) => dt.date().to_sql(ty, out),
            (RowValues::JSON(jsval), &Type::JSON | &Type::JSONB) => jsval.to_sql(ty, out),
            (RowValues::Blob(bytes), &Type::BYTEA) => bytes.to_sql(ty, out),
            (value, _) => Err(format!(
                "cannot bind {} value to a {} parameter",
                variant_name(value),
                ty.name()
            )
            .into()),
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::TEXT
                | Type::VARCHAR
                | Type::BPCHAR
                | Type::NAME
                | Type::BOOL
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
                | Type::DATE
                | Type::JSON
                | Type::JSONB
                | Type::BYTEA
        )
    }

    to_sql_checked!();
}

fn variant_name(value: &RowValues) -> &'static str {
    match value {
        RowValues::Int(_) => "Int",
        RowValues::Float(_) => "Float",
        RowValues::Text(_) => "Text",
        RowValues::Bool(_) => "Bool",
        RowValues::Timestamp(_) => "Timestamp",
        RowValues::Null => "Null",
        RowValues::JSON(_) => "JSON",
        RowValues::Blob(_) => "Blob",
    }
}
