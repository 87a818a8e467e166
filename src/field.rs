use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use diesel::deserialize::{self, FromSql, Queryable};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::BigInt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Codec, Config, Decoded};

thread_local! {
    static CODEC_CACHE: RefCell<HashMap<String, Arc<Codec>>> = RefCell::new(HashMap::new());
}

fn get_or_create_codec(name: &str) -> Arc<Codec> {
    CODEC_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if let Some(codec) = cache.get(name) {
            codec.clone()
        } else {
            let config = Config::global()
                .derive(name, &[])
                .expect("derivation without overrides should succeed");
            let codec = Arc::new(
                Codec::new(name, &config)
                    .expect("global configuration alphabet should be valid"),
            );
            cache.insert(name.to_string(), codec.clone());
            codec
        }
    })
}

/// Drops the codecs memoized for the calling thread.
///
/// Codecs are derived lazily from the global configuration on first use per
/// scope and kept; call this after [`Config::set_global`] if already-used
/// scopes should pick the new configuration up.
pub fn reset_scope_codecs() {
    CODEC_CACHE.with(|cache| cache.borrow_mut().clear());
}

/// Names the scope a [`Field`] belongs to.
///
/// The name is treated as the scope's type name: it becomes the scope tag in
/// the derived configuration and its non-lowercase letters form the token
/// prefix, so it should be a CamelCase name such as `"Invoice"` or
/// `"UserAccount"`.
pub trait TypeMarker: std::fmt::Debug {
    fn name() -> &'static str;
}

/// A generic type-safe object ID field (a wrapped `u64`).
///
/// When serialized with Serde, the id is automatically encoded into its
/// prefixed, obfuscated token. Deserialization decodes the token back to an
/// integer. The scope's configuration is derived from the process-wide
/// default on first use.
///
/// Traits are also provided for Diesel compatibility with Postgres BigInt
/// columns; storage always sees the raw id.
///
/// # Examples
///
/// ```
/// use maskid_rs::{Config, Field, TypeMarker};
/// use serde::Serialize;
///
/// #[derive(Clone, Copy, Debug)]
/// pub struct InvoiceIdMarker;
/// impl TypeMarker for InvoiceIdMarker {
///     fn name() -> &'static str { "Invoice" }
/// }
///
/// type InvoiceId = maskid_rs::Field<InvoiceIdMarker>;
///
/// #[derive(Serialize)]
/// struct Invoice {
///     pub id: InvoiceId,
/// }
///
/// Config::set_global(Config::default().salt("your-seed"));
/// let obj = Invoice { id: InvoiceId::from(12345) };
/// let json = serde_json::to_string(&obj).unwrap();
/// assert!(json.starts_with("{\"id\":\"i_"));
/// ```
#[derive(AsExpression, Debug, Clone, Copy)]
#[diesel(sql_type = BigInt)]
pub struct Field<T: TypeMarker> {
    id: u64,
    _marker: std::marker::PhantomData<T>,
}

impl<T: TypeMarker> From<Field<T>> for u64 {
    /// Returns the raw `u64` value.
    fn from(field: Field<T>) -> Self {
        field.id
    }
}

impl<T: TypeMarker> Field<T> {
    /// Creates a `Field<T>` value from a `u64`.
    pub fn from(id: u64) -> Self {
        Field {
            id,
            _marker: std::marker::PhantomData,
        }
    }

    /// Encodes the id into the scope's token.
    pub fn token(&self) -> String {
        get_or_create_codec(T::name()).encode(self.id)
    }

    /// Resolves caller-supplied input (a token or an already-raw key) to a
    /// lookup key via the scope's codec, honoring the scope's
    /// `override_lookup` setting.
    pub fn resolve(input: &str) -> Decoded<'_> {
        get_or_create_codec(T::name()).resolve(input)
    }
}

impl<T: TypeMarker> fmt::Display for Field<T> {
    /// The canonical external string form: the token when the scope has
    /// `override_string_form` enabled, the raw decimal id otherwise.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let codec = get_or_create_codec(T::name());
        if codec.string_form_enabled() {
            write!(f, "{}", codec.encode(self.id))
        } else {
            write!(f, "{}", self.id)
        }
    }
}

impl<T: TypeMarker> Serialize for Field<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let codec = get_or_create_codec(T::name());
        serializer.serialize_str(&codec.encode(self.id))
    }
}

impl<'de, T: TypeMarker> Deserialize<'de> for Field<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        let codec = get_or_create_codec(T::name());
        let id = codec.decode(&token).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid or foreign token for scope {}",
                T::name()
            ))
        })?;
        Ok(Field::from(id))
    }
}

impl<T: TypeMarker> ToSql<BigInt, Pg> for Field<T> {
    fn to_sql(&self, out: &mut Output<'_, '_, Pg>) -> serialize::Result {
        <i64 as ToSql<BigInt, Pg>>::to_sql(&(self.id as i64), &mut out.reborrow())
    }
}

impl<T: TypeMarker> FromSql<BigInt, Pg> for Field<T> {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let id = <i64 as FromSql<BigInt, Pg>>::from_sql(bytes)?;
        Ok(Field::from(id as u64))
    }
}

impl<T> Queryable<BigInt, Pg> for Field<T>
where
    T: TypeMarker,
{
    type Row = <i64 as Queryable<BigInt, Pg>>::Row;

    fn build(row: Self::Row) -> deserialize::Result<Self> {
        let id = i64::build(row)?;
        Ok(Field::from(id as u64))
    }
}
