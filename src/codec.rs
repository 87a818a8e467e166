use harsh::Harsh;

use crate::config::{Config, ConfigError};

// Arbitrary fixed marker mixed into signed payloads. Not a secret; it only
// lets decode tell "this payload came from us" apart from arbitrary strings
// that happen to survive the transform inverse.
const SIGNING_MARKER: u64 = 42;

/// Outcome of a token-fallback decode: the recovered id, or the original
/// input passed through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded<'a> {
    Id(u64),
    Raw(&'a str),
}

impl<'a> Decoded<'a> {
    /// Returns the recovered id, if any.
    pub fn id(self) -> Option<u64> {
        match self {
            Decoded::Id(id) => Some(id),
            Decoded::Raw(_) => None,
        }
    }
}

/// Per-scope encoder/decoder.
///
/// A `Codec` is built once from a scope's [`Config`] and is a pure value
/// computation from then on: encoding never fails for well-typed input, and
/// decoding converts every malformed-input condition into the caller-chosen
/// fallback instead of an error.
pub struct Codec {
    harsh: Harsh,
    prefix: String,
    sign: bool,
    test_mode: bool,
    override_lookup: bool,
    override_string_form: bool,
}

impl Codec {
    /// Creates the `Codec` for the scope named `name`, using `config` as the
    /// scope's encoding parameters.
    ///
    /// The token prefix is the scope's short code: `name` with its ASCII
    /// lowercase letters removed and the remainder lowercased, so
    /// `"UserAccount"` becomes `ua`. Scope names are expected to be CamelCase
    /// type names; a name without any uppercase letters produces an empty
    /// short code, and two names may reduce to the same code. Cross-scope
    /// token rejection relies on the seed, not the prefix.
    ///
    /// Fails if the configured alphabet is unusable for the transform.
    ///
    /// # Examples
    ///
    /// ```
    /// use maskid_rs::{Codec, Config};
    ///
    /// let config = Config::default()
    ///     .salt("example-seed")
    ///     .derive("Invoice", &[])
    ///     .unwrap();
    /// let codec = Codec::new("Invoice", &config).unwrap();
    ///
    /// let token = codec.encode(12345);
    /// assert!(token.starts_with("i_"));
    /// assert_eq!(codec.decode(&token), Some(12345));
    /// ```
    pub fn new(name: &str, config: &Config) -> Result<Codec, ConfigError> {
        let harsh = Harsh::builder()
            .salt(config.seed_material().as_bytes())
            .length(config.min_length)
            .alphabet(config.alphabet.as_bytes())
            .build()
            .map_err(|err| ConfigError::InvalidAlphabet(err.to_string()))?;
        Ok(Codec {
            harsh,
            prefix: short_code(name),
            sign: config.sign,
            test_mode: config.test_mode,
            override_lookup: config.override_lookup,
            override_string_form: config.override_string_form,
        })
    }

    /// Returns the scope's token prefix (without the `_` separator).
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Encodes `id` into a token of the form `<prefix>_<payload>`.
    ///
    /// In test mode the payload is the decimal id itself; otherwise it is the
    /// obfuscated encoding of `[SIGNING_MARKER, id]` (signing on) or `[id]`
    /// (signing off).
    pub fn encode(&self, id: u64) -> String {
        format!("{}_{}", self.prefix, self.payload(id))
    }

    /// Encodes an optional id. Absence propagates: `None` in, `None` out, so
    /// mapping over optional-id fields is safe.
    pub fn encode_opt(&self, id: Option<u64>) -> Option<String> {
        id.map(|id| self.encode(id))
    }

    /// Encodes a sequence of ids element-wise, preserving order.
    pub fn encode_all(&self, ids: &[u64]) -> Vec<String> {
        ids.iter().map(|&id| self.encode(id)).collect()
    }

    fn payload(&self, id: u64) -> String {
        if self.test_mode {
            return id.to_string();
        }
        if self.sign {
            self.harsh.encode(&[SIGNING_MARKER, id])
        } else {
            self.harsh.encode(&[id])
        }
    }

    /// Decodes a token back to its id, or `None` if the input cannot be
    /// validated.
    ///
    /// A leading run of lowercase letters followed by `_` is stripped from
    /// the front; the remainder goes through the transform inverse with this
    /// scope's seed and alphabet. With signing on, the inverse must yield
    /// exactly the signing marker and one id. Tokens from another scope fail
    /// the signature or alphabet check and fall through to `None`, which is
    /// normal, not exceptional. This method never panics and never returns an
    /// error.
    pub fn decode(&self, token: &str) -> Option<u64> {
        let payload = strip_scope_prefix(token);
        if self.test_mode {
            return Some(leading_digits(payload));
        }
        let values = self.harsh.decode(payload).ok()?;
        if self.sign {
            match values.as_slice() {
                [SIGNING_MARKER, id] => Some(*id),
                _ => None,
            }
        } else {
            values.first().copied()
        }
    }

    /// Decodes an optional token. Absence propagates.
    pub fn decode_opt(&self, token: Option<&str>) -> Option<u64> {
        self.decode(token?)
    }

    /// Decodes a sequence of tokens element-wise, preserving order.
    pub fn decode_all(&self, tokens: &[&str]) -> Vec<Option<u64>> {
        tokens.iter().map(|token| self.decode(token)).collect()
    }

    /// Decodes a token, falling back to the original input: returns
    /// [`Decoded::Id`] on success and [`Decoded::Raw`] with the untouched
    /// token otherwise.
    pub fn decode_or_raw<'a>(&self, token: &'a str) -> Decoded<'a> {
        match self.decode(token) {
            Some(id) => Decoded::Id(id),
            None => Decoded::Raw(token),
        }
    }

    /// Token-fallback decode of a sequence, element-wise, preserving order.
    pub fn decode_all_or_raw<'a>(&self, tokens: &[&'a str]) -> Vec<Decoded<'a>> {
        tokens.iter().map(|token| self.decode_or_raw(token)).collect()
    }

    /// Resolves caller-supplied input to a lookup key.
    ///
    /// When the scope has `override_lookup` enabled, tokens are transparently
    /// decoded and anything else passes through as [`Decoded::Raw`] for the
    /// host to treat as an already-raw key. With `override_lookup` disabled
    /// the input always passes through unchanged.
    pub fn resolve<'a>(&self, input: &'a str) -> Decoded<'a> {
        if self.override_lookup {
            self.decode_or_raw(input)
        } else {
            Decoded::Raw(input)
        }
    }

    pub(crate) fn string_form_enabled(&self) -> bool {
        self.override_string_form
    }
}

// The scope's short code: lowercase letters stripped, remainder lowercased.
fn short_code(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_ascii_lowercase())
        .collect::<String>()
        .to_lowercase()
}

// Strips one leading `<lowercase letters>_` run, front of the string only.
fn strip_scope_prefix(token: &str) -> &str {
    match token.find('_') {
        Some(split) if split > 0 && token[..split].bytes().all(|b| b.is_ascii_lowercase()) => {
            &token[split + 1..]
        }
        _ => token,
    }
}

// Permissive decimal parse for test-mode payloads: leading digits, else 0.
fn leading_digits(value: &str) -> u64 {
    let end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    value[..end].parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{distributions::Uniform, Rng};

    fn scope_codec(name: &str, base: Config) -> Codec {
        let config = base.derive(name, &[]).unwrap();
        Codec::new(name, &config).unwrap()
    }

    #[test]
    fn test_prefix_derivation() {
        let base = Config::default().salt("s1");
        assert_eq!(scope_codec("User", base.clone()).prefix(), "u");
        assert_eq!(scope_codec("UserAccount", base.clone()).prefix(), "ua");
        assert_eq!(scope_codec("X", base).prefix(), "x");
    }

    #[test]
    fn test_signed_roundtrip() {
        let codec = scope_codec("User", Config::default().salt("Test key here"));
        for id in [0, 1, 2, 123, 7_452_348_953, u64::MAX] {
            let token = codec.encode(id);
            assert!(token.starts_with("u_"), "unexpected token {}", token);
            assert_eq!(codec.decode(&token), Some(id), "failed at id {}", id);
        }
    }

    #[test]
    fn test_unsigned_roundtrip() {
        let codec = scope_codec("User", Config::default().salt("Test key here").sign(false));
        for id in [0, 1, 2, 123, u64::MAX] {
            let token = codec.encode(id);
            assert_eq!(codec.decode(&token), Some(id), "failed at id {}", id);
        }
    }

    #[test]
    fn test_custom_alphabet_and_min_length() {
        let config = Config::default()
            .salt("Test key here")
            .alphabet("abcdefghjkmnpqrstvwxyz0123456789")
            .unwrap()
            .min_length(10);
        let codec = scope_codec("Order", config);

        let token = codec.encode(7);
        let payload = &token[token.find('_').unwrap() + 1..];
        assert!(payload.len() >= 10, "payload too short: {}", token);
        assert!(payload
            .chars()
            .all(|c| "abcdefghjkmnpqrstvwxyz0123456789".contains(c)));
        assert_eq!(codec.decode(&token), Some(7));
    }

    #[test]
    fn test_min_length_pads_payload() {
        let codec = scope_codec("User", Config::default().salt("s1"));
        let token = codec.encode(1);
        let payload = &token[2..];
        assert!(payload.len() >= 6, "payload too short: {}", token);
        assert!(payload.chars().all(|c| crate::DEFAULT_ALPHABET.contains(c)));
    }

    #[test]
    fn test_absence_propagation() {
        let codec = scope_codec("User", Config::default().salt("s1"));
        assert_eq!(codec.encode_opt(None), None);
        assert_eq!(codec.decode_opt(None), None);

        let token = codec.encode_opt(Some(5)).unwrap();
        assert_eq!(codec.decode_opt(Some(&token)), Some(5));
    }

    #[test]
    fn test_sequences_preserve_order() {
        let codec = scope_codec("User", Config::default().salt("s1"));
        let tokens = codec.encode_all(&[10, 20, 30]);
        assert_eq!(
            tokens,
            vec![codec.encode(10), codec.encode(20), codec.encode(30)]
        );

        let refs: Vec<&str> = tokens.iter().map(String::as_str).collect();
        assert_eq!(
            codec.decode_all(&refs),
            vec![Some(10), Some(20), Some(30)]
        );
        assert_eq!(
            codec.decode_all_or_raw(&refs),
            vec![Decoded::Id(10), Decoded::Id(20), Decoded::Id(30)]
        );
    }

    #[test]
    fn test_fallback_semantics() {
        let codec = scope_codec("User", Config::default().salt("s1"));

        // Valid alphabet characters, but not a signed payload.
        assert_eq!(codec.decode("u_000000"), None);
        assert_eq!(codec.decode_or_raw("u_000000"), Decoded::Raw("u_000000"));

        // Characters outside the alphabet.
        assert_eq!(codec.decode("u_!!!"), None);
        assert_eq!(codec.decode_or_raw("u_!!!"), Decoded::Raw("u_!!!"));

        // No prefix at all.
        assert_eq!(codec.decode("garbage"), None);
    }

    #[test]
    fn test_prefix_is_not_verified() {
        // The stripped prefix is never compared against the codec's own;
        // rejection of foreign tokens comes from the seed.
        let codec = scope_codec("User", Config::default().salt("s1"));
        let token = codec.encode(123);
        let respliced = format!("zz_{}", &token[2..]);
        assert_eq!(codec.decode(&respliced), Some(123));
    }

    #[test]
    fn test_cross_scope_rejection() {
        let users = scope_codec("User", Config::default().salt("s1"));
        let posts = scope_codec("Post", Config::default().salt("s2"));

        let token = users.encode(123);
        assert_ne!(posts.decode(&token), Some(123));
        assert_eq!(users.decode(&token), Some(123));
    }

    #[test]
    fn test_signing_guard() {
        // An unsigned payload under the same seed decodes to a single value,
        // which a signing codec must reject rather than hand back.
        let signed = scope_codec("User", Config::default().salt("s1"));
        let unsigned = scope_codec("User", Config::default().salt("s1").sign(false));

        let token = unsigned.encode(99);
        assert_eq!(unsigned.decode(&token), Some(99));
        assert_eq!(signed.decode(&token), None);
        assert_eq!(signed.decode_or_raw(&token), Decoded::Raw(&token));
    }

    #[test]
    fn test_test_mode_determinism() {
        let codec = scope_codec("X", Config::default().test_mode(true));
        assert_eq!(codec.encode(7), "x_7");
        assert_eq!(codec.decode("x_7"), Some(7));

        // The permissive conversion keeps leading digits and bottoms out at 0.
        assert_eq!(codec.decode("x_123abc"), Some(123));
        assert_eq!(codec.decode("x_zzz"), Some(0));
    }

    #[test]
    fn test_resolve_honors_override_lookup() {
        let codec = scope_codec("User", Config::default().salt("s1"));
        let token = codec.encode(123);
        assert_eq!(codec.resolve(&token), Decoded::Id(123));
        assert_eq!(codec.resolve("4711"), Decoded::Raw("4711"));

        let passthrough = scope_codec(
            "User",
            Config::default().salt("s1").override_lookup(false),
        );
        let token = passthrough.encode(123);
        assert_eq!(passthrough.resolve(&token), Decoded::Raw(&token));
    }

    #[test]
    fn test_strip_scope_prefix() {
        assert_eq!(strip_scope_prefix("ua_abc"), "abc");
        assert_eq!(strip_scope_prefix("abc"), "abc");
        assert_eq!(strip_scope_prefix("_abc"), "_abc");
        assert_eq!(strip_scope_prefix("Ua_abc"), "Ua_abc");
        // Only the front is stripped, interior separators stay.
        assert_eq!(strip_scope_prefix("ua_bc_de"), "bc_de");
    }

    #[test]
    fn test_leading_digits() {
        assert_eq!(leading_digits("123abc"), 123);
        assert_eq!(leading_digits("abc"), 0);
        assert_eq!(leading_digits(""), 0);
        assert_eq!(leading_digits("00042"), 42);
        // Overflow is a failed parse, not a wrap.
        assert_eq!(leading_digits("99999999999999999999999999"), 0);
    }

    #[test]
    fn test_end_to_end_example() {
        let config = Config::default()
            .salt("s1")
            .min_length(6)
            .derive("User", &[])
            .unwrap();
        let codec = Codec::new("User", &config).unwrap();

        let token = codec.encode(123);
        assert!(token.starts_with("u_"));
        assert!(token.len() >= "u_".len() + 6);
        assert_eq!(codec.decode(&token), Some(123));
        assert_eq!(codec.decode_or_raw("u_000000"), Decoded::Raw("u_000000"));
    }

    #[test]
    fn test_random_roundtrips() {
        let codec = scope_codec("User", Config::default().salt("Test key here"));
        let mut rng = rand::thread_rng();
        let range = Uniform::new(0u64, u64::MAX);

        for _ in 0..10_000 {
            let id = rng.sample(range);
            let token = codec.encode(id);
            assert_eq!(codec.decode(&token), Some(id), "failed at id {}", id);
        }
    }
}
