use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Mutex;

static GLOBAL_CONFIG: Lazy<Mutex<Config>> = Lazy::new(|| Mutex::new(Config::default()));

#[cfg(test)]
pub(crate) static GLOBAL_TEST_LOCK: Mutex<()> = Mutex::new(());

/// Default payload alphabet: ASCII alphanumerics minus the visually ambiguous
/// `i`, `l`, `o`, `u` in both cases.
///
/// The character order is part of the encoding. Reordering it, like changing
/// the salt, changes every issued token.
pub const DEFAULT_ALPHABET: &str = "abcdefghjkmnpqrstvwxyz\
                                    ABCDEFGHJKMNPQRSTVWXYZ\
                                    1234567890";

// The transform refuses alphabets with fewer distinct characters than this.
const MIN_ALPHABET_LENGTH: usize = 16;

/// Encoding parameters for one scope.
///
/// A `Config` is a plain value. Scopes derive their own copy from a base
/// configuration (usually the process-wide default) with [`Config::derive`],
/// and the copy is immutable from then on; replacing the global default never
/// reaches into configurations that were already derived.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub(crate) salt: String,
    pub(crate) scope_tag: String,
    pub(crate) min_length: usize,
    pub(crate) alphabet: String,
    pub(crate) override_lookup: bool,
    pub(crate) override_string_form: bool,
    pub(crate) sign: bool,
    pub(crate) test_mode: bool,
}

/// A value for one named configuration override, see [`Config::derive`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OptionValue {
    Text(String),
    Number(usize),
    Flag(bool),
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    InvalidOption(String),
    InvalidValue {
        option: String,
        expected: &'static str,
    },
    InvalidAlphabet(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::InvalidOption(option) => {
                write!(f, "Unrecognized configuration option `{}`", option)
            }
            ConfigError::InvalidValue { option, expected } => {
                write!(f, "Option `{}` expects a {} value", option, expected)
            }
            ConfigError::InvalidAlphabet(reason) => {
                write!(f, "Unusable alphabet: {}", reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for Config {
    fn default() -> Self {
        Config {
            salt: String::new(),
            scope_tag: String::new(),
            min_length: 6,
            alphabet: DEFAULT_ALPHABET.to_string(),
            override_lookup: true,
            override_string_form: true,
            sign: true,
            test_mode: false,
        }
    }
}

impl Config {
    /// Sets the salt contributed to every scope's seed.
    pub fn salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = salt.into();
        self
    }

    /// Sets the per-scope disambiguator combined with the salt.
    /// Usually set through [`Config::derive`] instead.
    pub fn scope_tag(mut self, scope_tag: impl Into<String>) -> Self {
        self.scope_tag = scope_tag.into();
        self
    }

    /// Sets the minimum payload length. Shorter encodings are padded up to
    /// this length; longer ones are never truncated.
    pub fn min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    /// Sets the payload alphabet.
    ///
    /// The alphabet must be ASCII, free of duplicate characters, and hold at
    /// least 16 distinct characters for the transform to function.
    pub fn alphabet(mut self, alphabet: &str) -> Result<Self, ConfigError> {
        validate_alphabet(alphabet)?;
        self.alphabet = alphabet.to_string();
        Ok(self)
    }

    /// Sets whether host lookup routines should transparently decode tokens
    /// before querying storage.
    pub fn override_lookup(mut self, override_lookup: bool) -> Self {
        self.override_lookup = override_lookup;
        self
    }

    /// Sets whether an entity's external string representation is its token
    /// rather than its raw id.
    pub fn override_string_form(mut self, override_string_form: bool) -> Self {
        self.override_string_form = override_string_form;
        self
    }

    /// Sets whether payloads carry the signing marker.
    pub fn sign(mut self, sign: bool) -> Self {
        self.sign = sign;
        self
    }

    /// Sets test mode, which bypasses obfuscation and uses the decimal id as
    /// the payload for deterministic tests.
    pub fn test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    /// Derives a scope's own configuration: a copy of `self` with `scope_tag`
    /// set and the named `overrides` applied.
    ///
    /// Recognized option names are `salt`, `scope_tag`, `min_length`,
    /// `alphabet`, `override_lookup`, `override_string_form`, `sign` and
    /// `test_mode`. An unrecognized name fails with
    /// [`ConfigError::InvalidOption`].
    ///
    /// # Examples
    ///
    /// ```
    /// use maskid_rs::{Config, OptionValue};
    ///
    /// let base = Config::default().salt("production-seed");
    /// let config = base
    ///     .derive("UserAccount", &[("min_length", OptionValue::Number(8))])
    ///     .unwrap();
    /// assert_eq!(config.seed_material(), "production-seedUserAccount");
    /// ```
    pub fn derive(
        &self,
        scope_tag: &str,
        overrides: &[(&str, OptionValue)],
    ) -> Result<Config, ConfigError> {
        let mut config = self.clone().scope_tag(scope_tag);
        for (option, value) in overrides {
            config = config.apply(option, value)?;
        }
        Ok(config)
    }

    fn apply(self, option: &str, value: &OptionValue) -> Result<Config, ConfigError> {
        match (option, value) {
            ("salt", OptionValue::Text(v)) => Ok(self.salt(v.clone())),
            ("scope_tag", OptionValue::Text(v)) => Ok(self.scope_tag(v.clone())),
            ("alphabet", OptionValue::Text(v)) => self.alphabet(v),
            ("min_length", OptionValue::Number(v)) => Ok(self.min_length(*v)),
            ("override_lookup", OptionValue::Flag(v)) => Ok(self.override_lookup(*v)),
            ("override_string_form", OptionValue::Flag(v)) => Ok(self.override_string_form(*v)),
            ("sign", OptionValue::Flag(v)) => Ok(self.sign(*v)),
            ("test_mode", OptionValue::Flag(v)) => Ok(self.test_mode(*v)),
            ("salt" | "scope_tag" | "alphabet", _) => Err(ConfigError::InvalidValue {
                option: option.to_string(),
                expected: "text",
            }),
            ("min_length", _) => Err(ConfigError::InvalidValue {
                option: option.to_string(),
                expected: "number",
            }),
            ("override_lookup" | "override_string_form" | "sign" | "test_mode", _) => {
                Err(ConfigError::InvalidValue {
                    option: option.to_string(),
                    expected: "flag",
                })
            }
            _ => Err(ConfigError::InvalidOption(option.to_string())),
        }
    }

    /// Seed handed to the transform: the salt followed by the scope tag.
    ///
    /// The concatenation order is part of the encoding. Swapping it
    /// invalidates every previously issued token, so it is fixed.
    pub fn seed_material(&self) -> String {
        format!("{}{}", self.salt, self.scope_tag)
    }

    /// Replaces the process-wide default configuration. Scopes derived before
    /// the call keep their old configuration.
    pub fn set_global(config: Config) {
        let mut global_config = GLOBAL_CONFIG.lock().unwrap();
        *global_config = config;
    }

    /// Returns a copy of the process-wide default configuration.
    pub fn global() -> Config {
        GLOBAL_CONFIG.lock().unwrap().clone()
    }

    /// Restores the process-wide default configuration to [`Config::default`].
    pub fn reset_global() {
        let mut global_config = GLOBAL_CONFIG.lock().unwrap();
        *global_config = Config::default();
    }
}

fn validate_alphabet(alphabet: &str) -> Result<(), ConfigError> {
    if !alphabet.is_ascii() {
        return Err(ConfigError::InvalidAlphabet(
            "must contain only ASCII characters".to_string(),
        ));
    }
    let mut seen = [false; 128];
    for byte in alphabet.bytes() {
        if seen[byte as usize] {
            return Err(ConfigError::InvalidAlphabet(format!(
                "duplicate character `{}`",
                byte as char
            )));
        }
        seen[byte as usize] = true;
    }
    if alphabet.len() < MIN_ALPHABET_LENGTH {
        return Err(ConfigError::InvalidAlphabet(format!(
            "must contain at least {} distinct characters",
            MIN_ALPHABET_LENGTH
        )));
    }
    Ok(())
}
