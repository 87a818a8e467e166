//! `maskid` encodes internal numeric identifiers into opaque, prefixed,
//! URL-safe tokens and recovers the original identifier from such a token,
//! plus a generic field type to conveniently manage the process with Serde
//! and Diesel.
//!
//! This library is designed for APIs that keep monotonically increasing
//! integers as database keys but should not leak them: the exposed token is
//! an alphabet-restricted obfuscation of the id, salted per deployment and
//! per scope, so tokens from one object type do not decode under another.
//! The tokens include an object type prefix, inspired by Stripe's API, which
//! makes ids instantly identifiable in logs and URLs.
//!
//! The obfuscation is reversible by construction and is *not* cryptographic
//! security: collisions and brute force are feasible for a determined
//! attacker. The optional signing marker only lets decode tell a token
//! minted by this system apart from an arbitrary guess, so malformed or
//! foreign input degrades to a caller-chosen fallback instead of a spurious
//! id. Decoding tolerates untrusted input and never crashes on it.
//!
//! # Usage
//!
//! ## Generic `Field` API (recommended)
//!
//! Use the generic `Field` type to define a type for each kind of object
//! you expose in your public APIs. The `Field` type supports automatic
//! encoding and decoding with Diesel and Serde.
//!
//! ```
//! use maskid_rs::{Config, Field, TypeMarker};
//!
//! // Define the InvoiceId field type. The marker names the scope; its
//! // non-lowercase letters become the token prefix ("i").
//! #[derive(Debug)]
//! pub struct InvoiceIdMarker;
//! impl TypeMarker for InvoiceIdMarker {
//!     fn name() -> &'static str { "Invoice" }
//! }
//!
//! type InvoiceId = maskid_rs::Field<InvoiceIdMarker>;
//!
//! // The field can then be used in structs, and works automatically with
//! // Serde and Diesel.
//! #[derive(serde::Serialize)]
//! struct Invoice {
//!     pub id: InvoiceId,
//! }
//!
//! maskid_rs::Config::set_global(Config::default().salt("your-seed"));
//! let obj = Invoice { id: InvoiceId::from(12345) };
//! let json = serde_json::to_string(&obj).unwrap();
//! assert!(json.starts_with("{\"id\":\"i_"));
//! ```
//!
//! ## Low level API
//!
//! `Codec` provides a simple API to encode and decode integers. Each scope
//! derives its own configuration from a base and builds a codec from it.
//!
//! ```
//! use maskid_rs::{Codec, Config, Decoded};
//!
//! let config = Config::default()
//!     .salt("your-seed")
//!     .derive("Invoice", &[])
//!     .unwrap();
//! let codec = Codec::new("Invoice", &config).unwrap();
//!
//! let token = codec.encode(12345);
//! assert!(token.starts_with("i_"));
//! assert_eq!(codec.decode(&token), Some(12345));
//!
//! // Malformed or foreign tokens never error; they fall back.
//! assert_eq!(codec.decode("i_000000"), None);
//! assert_eq!(codec.decode_or_raw("i_000000"), Decoded::Raw("i_000000"));
//! ```

mod codec;
mod config;
mod field;

pub use codec::{Codec, Decoded};
pub use config::{Config, ConfigError, OptionValue, DEFAULT_ALPHABET};
pub use field::{reset_scope_codecs, Field, TypeMarker};
