//! Network consensus parameters for target computation.
//!
//! - `ChainParams::mainnet()` and the other presets for the known networks
//! - `ChainParams::from_config()` for private networks or tweaked presets,
//!   usually loaded with `ChainParamsConfig::from_toml_str()`
//! - `ActivationOverrides` to replace time-gated activation thresholds at
//!   runtime (deterministic test scenarios)

use crate::compact::CompactTarget;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Two weeks.
const TWO_WEEKS: i64 = 14 * 24 * 60 * 60;

/// Nov 15, 2020 12:00:00 UTC.
const AXION_TIME_2020: i64 = 1_605_441_600;

/// May 15, 2021 12:00:00 UTC.
const TACHYON_TIME_2021: i64 = 1_621_080_000;

/// Error when constructing ChainParams from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainParamsError {
    /// The field that is missing or invalid.
    pub field: &'static str,
    /// Description of the error.
    pub message: String,
}

impl ChainParamsError {
    fn missing(field: &'static str) -> Self {
        Self {
            field,
            message: "required field missing".to_string(),
        }
    }

    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ChainParamsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainParams error for '{}': {}", self.field, self.message)
    }
}

impl std::error::Error for ChainParamsError {}

/// Known networks with compiled-in parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Main,
    Test,
    Test4,
    Scale,
    Regtest,
}

impl Network {
    pub const ALL: [Network; 5] = [
        Network::Main,
        Network::Test,
        Network::Test4,
        Network::Scale,
        Network::Regtest,
    ];

    /// Short name, as accepted by `FromStr`.
    pub fn name(self) -> &'static str {
        match self {
            Network::Main => "main",
            Network::Test => "test",
            Network::Test4 => "test4",
            Network::Scale => "scale",
            Network::Regtest => "regtest",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = ChainParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Network::ALL
            .into_iter()
            .find(|n| n.name() == s.trim())
            .ok_or_else(|| {
                ChainParamsError::invalid(
                    "network",
                    format!("unknown network '{}' (expected main, test, test4, scale or regtest)", s),
                )
            })
    }
}

/// Pinned ASERT reference block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AsertAnchor {
    /// Height of the anchor block.
    pub height: u32,
    /// Compact target of the anchor block.
    pub bits: CompactTarget,
    /// Timestamp of the anchor block's parent.
    pub prev_block_time: i64,
}

/// Operator-supplied replacements for time-gated activation thresholds.
///
/// A `None` field keeps the compiled-in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActivationOverrides {
    pub axion_activation_time: Option<i64>,
    pub ema_activation_time: Option<i64>,
    pub tachyon_activation_time: Option<i64>,
}

impl ActivationOverrides {
    pub fn is_empty(&self) -> bool {
        self.axion_activation_time.is_none()
            && self.ema_activation_time.is_none()
            && self.tachyon_activation_time.is_none()
    }
}

/// Network-specific consensus parameters.
///
/// Read-only once built; shared by reference with every computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainParams {
    /// Easiest allowed target. Never zero.
    pub pow_limit: BigUint,

    /// Target block interval in seconds.
    pub pow_target_spacing: i64,

    /// Legacy retarget window in seconds.
    pub pow_target_timespan: i64,

    /// Allow a minimum-difficulty block after a long gap (test networks).
    pub pow_allow_min_difficulty_blocks: bool,

    /// Keep the previous target forever (regtest).
    pub pow_no_retargeting: bool,

    /// ASERT half-life in seconds.
    pub asert_half_life: i64,

    /// Pinned ASERT anchor, if the network has one.
    pub asert_anchor: Option<AsertAnchor>,

    pub uahf_height: u32,
    pub daa_height: u32,
    pub magnetic_anomaly_height: u32,
    pub graviton_height: u32,
    pub phonon_height: u32,

    pub axion_activation_time: i64,
    pub ema_activation_time: i64,
    pub tachyon_activation_time: i64,

    /// Runtime replacements for the three activation times above.
    pub overrides: ActivationOverrides,
}

/// `2^bits - 1`.
fn all_ones(bits: u32) -> BigUint {
    (BigUint::one() << bits) - 1u32
}

impl ChainParams {
    /// Mainnet parameters.
    pub fn mainnet() -> Self {
        Self {
            pow_limit: all_ones(228),
            pow_target_spacing: 10 * 60,
            pow_target_timespan: TWO_WEEKS,
            pow_allow_min_difficulty_blocks: false,
            pow_no_retargeting: false,
            asert_half_life: 2 * 24 * 60 * 60,
            asert_anchor: Some(AsertAnchor {
                height: 661_647,
                bits: CompactTarget(0x1804_dafe),
                prev_block_time: 1_605_447_844,
            }),
            uahf_height: 0,
            daa_height: 0,
            magnetic_anomaly_height: 0,
            graviton_height: 0,
            phonon_height: 0,
            axion_activation_time: 1_583_000_000,
            ema_activation_time: TACHYON_TIME_2021,
            tachyon_activation_time: TACHYON_TIME_2021,
            overrides: ActivationOverrides::default(),
        }
    }

    /// Public test network.
    pub fn testnet() -> Self {
        Self {
            pow_target_spacing: 60,
            pow_allow_min_difficulty_blocks: true,
            asert_half_life: 60 * 60,
            asert_anchor: Some(AsertAnchor {
                height: 1_421_481,
                bits: CompactTarget(0x1d00_ffff),
                prev_block_time: 1_605_445_400,
            }),
            ..Self::mainnet()
        }
    }

    /// Test network 4.
    pub fn testnet4() -> Self {
        Self {
            pow_limit: all_ones(224),
            pow_target_spacing: 60,
            pow_allow_min_difficulty_blocks: true,
            asert_half_life: 60 * 60,
            asert_anchor: Some(AsertAnchor {
                height: 16_844,
                bits: CompactTarget(0x1d00_ffff),
                prev_block_time: 1_605_451_779,
            }),
            uahf_height: 6,
            daa_height: 3000,
            magnetic_anomaly_height: 4000,
            graviton_height: 5000,
            phonon_height: 0,
            axion_activation_time: AXION_TIME_2020,
            ..Self::mainnet()
        }
    }

    /// Large-block scaling network. No pinned anchor: it is expected to
    /// reorg back below its ASERT activation.
    pub fn scalenet() -> Self {
        Self {
            pow_limit: all_ones(224),
            pow_target_spacing: 10 * 60,
            asert_half_life: 2 * 24 * 60 * 60,
            asert_anchor: None,
            ..Self::testnet4()
        }
    }

    /// Local regression-test network.
    pub fn regtest() -> Self {
        Self {
            pow_limit: all_ones(255),
            pow_allow_min_difficulty_blocks: true,
            pow_no_retargeting: true,
            asert_anchor: None,
            axion_activation_time: AXION_TIME_2020,
            ..Self::mainnet()
        }
    }

    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Main => Self::mainnet(),
            Network::Test => Self::testnet(),
            Network::Test4 => Self::testnet4(),
            Network::Scale => Self::scalenet(),
            Network::Regtest => Self::regtest(),
        }
    }

    /// Create ChainParams from configuration.
    ///
    /// With `base` set, the named network fills every field the config
    /// leaves out. Without it all fields are required except
    /// `ema_activation_time` (defaults to the tachyon time), `asert_anchor`
    /// and `overrides`. Returns an error naming the first missing or invalid
    /// field.
    ///
    /// Note: `pow_limit_hex` is trimmed and accepts an optional "0x" prefix.
    pub fn from_config(config: &ChainParamsConfig) -> Result<Self, ChainParamsError> {
        let base = config
            .base
            .as_deref()
            .map(Network::from_str)
            .transpose()
            .map_err(|e| ChainParamsError { field: "base", ..e })?
            .map(Self::for_network);

        fn pick<T: Clone>(
            field: &'static str,
            value: &Option<T>,
            base: Option<&ChainParams>,
            from_base: impl Fn(&ChainParams) -> T,
        ) -> Result<T, ChainParamsError> {
            match (value, base) {
                (Some(v), _) => Ok(v.clone()),
                (None, Some(b)) => Ok(from_base(b)),
                (None, None) => Err(ChainParamsError::missing(field)),
            }
        }
        let base = base.as_ref();

        let pow_limit = match (&config.pow_limit_hex, base) {
            (Some(hex_str), _) => parse_pow_limit(hex_str)?,
            (None, Some(b)) => b.pow_limit.clone(),
            (None, None) => return Err(ChainParamsError::missing("pow_limit_hex")),
        };

        let pow_target_spacing = pick(
            "pow_target_spacing",
            &config.pow_target_spacing,
            base,
            |b| b.pow_target_spacing,
        )?;
        if pow_target_spacing <= 0 {
            return Err(ChainParamsError::invalid(
                "pow_target_spacing",
                "must be positive",
            ));
        }

        let pow_target_timespan = pick(
            "pow_target_timespan",
            &config.pow_target_timespan,
            base,
            |b| b.pow_target_timespan,
        )?;
        if pow_target_timespan < pow_target_spacing {
            return Err(ChainParamsError::invalid(
                "pow_target_timespan",
                format!("must be at least pow_target_spacing ({})", pow_target_spacing),
            ));
        }

        let asert_half_life =
            pick("asert_half_life", &config.asert_half_life, base, |b| b.asert_half_life)?;
        if asert_half_life <= 0 {
            return Err(ChainParamsError::invalid("asert_half_life", "must be positive"));
        }

        let asert_anchor = match (&config.asert_anchor, base) {
            (Some(anchor), _) => Some(*anchor),
            (None, Some(b)) => b.asert_anchor,
            (None, None) => None,
        };
        if let Some(anchor) = &asert_anchor {
            let decoded = anchor.bits.decode();
            if !decoded.is_valid() {
                return Err(ChainParamsError::invalid(
                    "asert_anchor",
                    format!("anchor bits {} do not encode a positive target", anchor.bits),
                ));
            }
            if decoded.target > pow_limit {
                return Err(ChainParamsError::invalid(
                    "asert_anchor",
                    format!("anchor bits {} exceed pow_limit", anchor.bits),
                ));
            }
        }

        let tachyon_activation_time = pick(
            "tachyon_activation_time",
            &config.tachyon_activation_time,
            base,
            |b| b.tachyon_activation_time,
        )?;
        let ema_activation_time = config
            .ema_activation_time
            .or_else(|| base.map(|b| b.ema_activation_time))
            .unwrap_or(tachyon_activation_time);

        let params = Self {
            pow_limit,
            pow_target_spacing,
            pow_target_timespan,
            pow_allow_min_difficulty_blocks: pick(
                "pow_allow_min_difficulty_blocks",
                &config.pow_allow_min_difficulty_blocks,
                base,
                |b| b.pow_allow_min_difficulty_blocks,
            )?,
            pow_no_retargeting: pick(
                "pow_no_retargeting",
                &config.pow_no_retargeting,
                base,
                |b| b.pow_no_retargeting,
            )?,
            asert_half_life,
            asert_anchor,
            uahf_height: pick("uahf_height", &config.uahf_height, base, |b| b.uahf_height)?,
            daa_height: pick("daa_height", &config.daa_height, base, |b| b.daa_height)?,
            magnetic_anomaly_height: pick(
                "magnetic_anomaly_height",
                &config.magnetic_anomaly_height,
                base,
                |b| b.magnetic_anomaly_height,
            )?,
            graviton_height: pick(
                "graviton_height",
                &config.graviton_height,
                base,
                |b| b.graviton_height,
            )?,
            phonon_height: pick("phonon_height", &config.phonon_height, base, |b| b.phonon_height)?,
            axion_activation_time: pick(
                "axion_activation_time",
                &config.axion_activation_time,
                base,
                |b| b.axion_activation_time,
            )?,
            ema_activation_time,
            tachyon_activation_time,
            overrides: ActivationOverrides::default(),
        };

        Ok(match config.overrides {
            Some(overrides) => params.with_overrides(overrides),
            None => params,
        })
    }

    /// Replace time-gated activation thresholds at runtime.
    ///
    /// Fields left `None` keep any earlier override.
    pub fn with_overrides(mut self, overrides: ActivationOverrides) -> Self {
        for (name, compiled, value) in [
            ("axion", self.axion_activation_time, overrides.axion_activation_time),
            ("ema", self.ema_activation_time, overrides.ema_activation_time),
            ("tachyon", self.tachyon_activation_time, overrides.tachyon_activation_time),
        ] {
            if let Some(time) = value {
                warn!(upgrade = name, compiled, override_time = time, "Activation time overridden");
            }
        }

        self.overrides = ActivationOverrides {
            axion_activation_time: overrides
                .axion_activation_time
                .or(self.overrides.axion_activation_time),
            ema_activation_time: overrides
                .ema_activation_time
                .or(self.overrides.ema_activation_time),
            tachyon_activation_time: overrides
                .tachyon_activation_time
                .or(self.overrides.tachyon_activation_time),
        };
        self
    }

    /// Blocks per legacy retarget window.
    pub fn difficulty_adjustment_interval(&self) -> i64 {
        self.pow_target_timespan / self.pow_target_spacing
    }

    /// Axion activation time after overrides.
    pub fn effective_axion_activation_time(&self) -> i64 {
        self.overrides
            .axion_activation_time
            .unwrap_or(self.axion_activation_time)
    }

    /// EMA activation time after overrides.
    pub fn effective_ema_activation_time(&self) -> i64 {
        self.overrides
            .ema_activation_time
            .unwrap_or(self.ema_activation_time)
    }

    /// Tachyon activation time after overrides.
    pub fn effective_tachyon_activation_time(&self) -> i64 {
        self.overrides
            .tachyon_activation_time
            .unwrap_or(self.tachyon_activation_time)
    }
}

fn parse_pow_limit(raw: &str) -> Result<BigUint, ChainParamsError> {
    // Hex hygiene: trim whitespace and strip optional 0x prefix
    let cleaned = raw.trim();
    let cleaned = cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
        .unwrap_or(cleaned);

    let padded = if cleaned.len() % 2 == 1 {
        format!("0{}", cleaned)
    } else {
        cleaned.to_string()
    };
    let bytes = hex::decode(&padded).map_err(|e| {
        ChainParamsError::invalid("pow_limit_hex", format!("invalid hex string '{}': {}", raw, e))
    })?;

    let pow_limit = BigUint::from_bytes_be(&bytes);
    if pow_limit.is_zero() {
        return Err(ChainParamsError::invalid("pow_limit_hex", "pow_limit cannot be zero"));
    }
    if pow_limit.bits() > 256 {
        return Err(ChainParamsError::invalid(
            "pow_limit_hex",
            "pow_limit does not fit in 256 bits",
        ));
    }
    Ok(pow_limit)
}

/// Configuration for loading ChainParams from TOML.
///
/// All fields are optional so partial configs can be validated with clear
/// errors.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChainParamsConfig {
    /// Preset network to take unspecified fields from.
    pub base: Option<String>,
    /// Proof-of-work limit as a big-endian hex string.
    pub pow_limit_hex: Option<String>,
    pub pow_target_spacing: Option<i64>,
    pub pow_target_timespan: Option<i64>,
    pub pow_allow_min_difficulty_blocks: Option<bool>,
    pub pow_no_retargeting: Option<bool>,
    pub asert_half_life: Option<i64>,
    pub asert_anchor: Option<AsertAnchor>,
    pub uahf_height: Option<u32>,
    pub daa_height: Option<u32>,
    pub magnetic_anomaly_height: Option<u32>,
    pub graviton_height: Option<u32>,
    pub phonon_height: Option<u32>,
    pub axion_activation_time: Option<i64>,
    pub ema_activation_time: Option<i64>,
    pub tachyon_activation_time: Option<i64>,
    pub overrides: Option<ActivationOverrides>,
}

impl ChainParamsConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ChainParamsError> {
        toml::from_str(s).map_err(|e| ChainParamsError::invalid("toml", e.to_string()))
    }
}
