//! # Store Configuration
//!
//! Configuration management for the cart store.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     SHOPBASE_STORAGE_DIR=/tmp/cart                                     │
//! │     SHOPBASE_QUANTITY_POLICY=clamp                                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/shopbase-cart/cart.toml (Linux)                          │
//! │     ~/Library/Application Support/com.shopbase.cart/cart.toml (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     key "cart-storage", inline saves, reject policy, USD               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # cart.toml
//! [storage]
//! dir = "/var/lib/shopbase"
//! key = "cart-storage"
//! persist_mode = "queued"   # inline | queued
//!
//! [cart]
//! quantity_policy = "reject" # reject | clamp
//! max_item_quantity = 999
//!
//! [currency]
//! code = "USD"
//! symbol = "$"
//! decimals = 2
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use shopbase_core::money::MAX_MINOR_DIGITS;
use shopbase_core::{
    CartRules, Money, QuantityPolicy, ValidationError, CART_STORAGE_KEY, MAX_ITEM_QUANTITY,
    QUANTITY_CEILING,
};

use crate::error::{StoreError, StoreResult};

// =============================================================================
// Persist Mode
// =============================================================================

/// How cart writes reach storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistMode {
    /// Write synchronously inside the mutation. No runtime needed.
    #[default]
    Inline,

    /// Hand the write to the background save worker (needs a tokio runtime).
    Queued,
}

impl std::fmt::Display for PersistMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistMode::Inline => write!(f, "inline"),
            PersistMode::Queued => write!(f, "queued"),
        }
    }
}

impl std::str::FromStr for PersistMode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inline" | "sync" => Ok(PersistMode::Inline),
            "queued" | "async" | "worker" => Ok(PersistMode::Queued),
            other => Err(StoreError::InvalidConfig(format!(
                "Unknown persist mode: '{}'. Valid options: inline, queued",
                other
            ))),
        }
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory holding the record. Platform data dir when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Key (namespace) of the cart record.
    #[serde(default = "default_storage_key")]
    pub key: String,

    #[serde(default)]
    pub persist_mode: PersistMode,
}

fn default_storage_key() -> String {
    CART_STORAGE_KEY.to_string()
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            dir: None,
            key: default_storage_key(),
            persist_mode: PersistMode::default(),
        }
    }
}

// =============================================================================
// Cart Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartSettings {
    #[serde(default)]
    pub quantity_policy: QuantityPolicy,

    #[serde(default = "default_max_item_quantity")]
    pub max_item_quantity: i64,
}

fn default_max_item_quantity() -> i64 {
    MAX_ITEM_QUANTITY
}

impl Default for CartSettings {
    fn default() -> Self {
        CartSettings {
            quantity_policy: QuantityPolicy::default(),
            max_item_quantity: default_max_item_quantity(),
        }
    }
}

impl CartSettings {
    pub fn rules(&self) -> CartRules {
        CartRules {
            quantity_policy: self.quantity_policy,
            max_item_quantity: self.max_item_quantity,
        }
    }
}

// =============================================================================
// Currency
// =============================================================================

/// Display currency. Amounts are always held in minor units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyConfig {
    /// ISO 4217 code
    #[serde(default = "default_currency_code")]
    pub code: String,

    #[serde(default = "default_currency_symbol")]
    pub symbol: String,

    /// Number of minor-unit digits
    #[serde(default = "default_currency_decimals")]
    pub decimals: u8,
}

fn default_currency_code() -> String {
    "USD".to_string()
}

fn default_currency_symbol() -> String {
    "$".to_string()
}

fn default_currency_decimals() -> u8 {
    2
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        CurrencyConfig {
            code: default_currency_code(),
            symbol: default_currency_symbol(),
            decimals: default_currency_decimals(),
        }
    }
}

impl CurrencyConfig {
    /// Symbol and minor-unit digits of a known ISO code.
    fn known(code: &str) -> Option<(&'static str, u8)> {
        match code {
            "USD" | "CAD" | "AUD" => Some(("$", 2)),
            "EUR" => Some(("€", 2)),
            "GBP" => Some(("£", 2)),
            "JPY" => Some(("¥", 0)),
            "KRW" => Some(("₩", 0)),
            "KWD" => Some(("KD ", 3)),
            _ => None,
        }
    }

    /// Currency for an ISO code. Unknown codes use the code as symbol and
    /// two decimals.
    pub fn for_code(code: &str) -> Self {
        let code = code.trim().to_uppercase();
        let (symbol, decimals) = match Self::known(&code) {
            Some((symbol, decimals)) => (symbol.to_string(), decimals),
            None => (format!("{} ", code), 2),
        };

        CurrencyConfig {
            code,
            symbol,
            decimals,
        }
    }

    /// Parses a decimal amount typed in this currency into minor units.
    ///
    /// ## Example
    /// ```rust
    /// use shopbase_store::config::CurrencyConfig;
    ///
    /// assert_eq!(CurrencyConfig::default().parse("9.99").unwrap().cents(), 999);
    /// assert_eq!(CurrencyConfig::for_code("JPY").parse("1500").unwrap().cents(), 1500);
    /// ```
    pub fn parse(&self, input: &str) -> Result<Money, ValidationError> {
        Money::parse_decimal(input, self.decimals)
    }

    /// Formats a minor-unit amount as a currency string.
    ///
    /// ## Example
    /// ```rust
    /// use shopbase_store::config::CurrencyConfig;
    ///
    /// let usd = CurrencyConfig::default();
    /// assert_eq!(usd.format(3498), "$34.98");
    /// ```
    pub fn format(&self, cents: i64) -> String {
        let divisor = 10_i64.pow(self.decimals as u32);
        let whole = cents / divisor;
        let frac = (cents % divisor).abs();

        format!(
            "{}{}{}",
            if cents < 0 { "-" } else { "" },
            self.symbol,
            if self.decimals > 0 {
                format!(
                    "{}.{:0width$}",
                    whole.abs(),
                    frac,
                    width = self.decimals as usize
                )
            } else {
                whole.abs().to_string()
            }
        )
    }
}

// =============================================================================
// Main Store Configuration
// =============================================================================

/// Complete store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub cart: CartSettings,

    #[serde(default)]
    pub currency: CurrencyConfig,
}

impl StoreConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (cart.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> StoreResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading cart config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load cart config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Validates the configuration.
    pub fn validate(&self) -> StoreResult<()> {
        if self.storage.key.trim().is_empty() {
            return Err(StoreError::InvalidConfig(
                "storage.key must not be empty".into(),
            ));
        }

        if !(1..=QUANTITY_CEILING).contains(&self.cart.max_item_quantity) {
            return Err(StoreError::InvalidConfig(format!(
                "cart.max_item_quantity must be between 1 and {}",
                QUANTITY_CEILING
            )));
        }

        if self.currency.decimals > MAX_MINOR_DIGITS {
            return Err(StoreError::InvalidConfig(format!(
                "currency.decimals must be between 0 and {}",
                MAX_MINOR_DIGITS
            )));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies overrides from any variable source.
    ///
    /// ## Variables
    /// - `SHOPBASE_STORAGE_DIR`
    /// - `SHOPBASE_STORAGE_KEY`
    /// - `SHOPBASE_PERSIST_MODE` (`inline` | `queued`)
    /// - `SHOPBASE_QUANTITY_POLICY` (`reject` | `clamp`)
    /// - `SHOPBASE_MAX_ITEM_QUANTITY`
    /// - `SHOPBASE_CURRENCY` (ISO code; symbol and decimals follow for known codes)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("SHOPBASE_STORAGE_DIR") {
            debug!(dir = %dir, "Overriding storage dir from environment");
            self.storage.dir = Some(PathBuf::from(dir));
        }

        if let Some(key) = lookup("SHOPBASE_STORAGE_KEY") {
            self.storage.key = key;
        }

        if let Some(mode) = lookup("SHOPBASE_PERSIST_MODE") {
            match mode.parse() {
                Ok(parsed) => self.storage.persist_mode = parsed,
                Err(_) => warn!(mode = %mode, "Unknown persist mode in environment"),
            }
        }

        if let Some(policy) = lookup("SHOPBASE_QUANTITY_POLICY") {
            match policy.parse() {
                Ok(parsed) => self.cart.quantity_policy = parsed,
                Err(_) => warn!(policy = %policy, "Unknown quantity policy in environment"),
            }
        }

        if let Some(max) = lookup("SHOPBASE_MAX_ITEM_QUANTITY") {
            if let Ok(max) = max.parse::<i64>() {
                self.cart.max_item_quantity = max;
            }
        }

        if let Some(code) = lookup("SHOPBASE_CURRENCY") {
            self.currency = CurrencyConfig::for_code(&code);
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "shopbase", "cart")
            .map(|dirs| dirs.config_dir().join("cart.toml"))
    }

    /// Directory the cart record lives in.
    pub fn storage_dir(&self) -> StoreResult<PathBuf> {
        if let Some(dir) = &self.storage.dir {
            return Ok(dir.clone());
        }

        directories::ProjectDirs::from("com", "shopbase", "cart")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| StoreError::NoStorageDir("no home directory".into()))
    }

    pub fn rules(&self) -> CartRules {
        self.cart.rules()
    }
}
