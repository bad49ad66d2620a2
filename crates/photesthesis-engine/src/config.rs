//! Environment-driven driver configuration.
//!
//! Every knob can be set by an environment variable; values are unsigned
//! 64-bit decimals or hex with a `0x` prefix. An absent variable falls back
//! to the argument default; an unparseable one is ignored with a warning.

use tracing::warn;

pub const ENV_EXPANSION_STEPS: &str = "PHOTESTHESIS_EXPANSION_STEPS";
pub const ENV_KPATH_LENGTH: &str = "PHOTESTHESIS_KPATH_LENGTH";
pub const ENV_RANDOM_DEPTH: &str = "PHOTESTHESIS_RANDOM_DEPTH";
pub const ENV_RANDOM_SEED: &str = "PHOTESTHESIS_RANDOM_SEED";
pub const ENV_VERBOSE: &str = "PHOTESTHESIS_VERBOSE";
pub const ENV_TEST_HASH: &str = "PHOTESTHESIS_TEST_HASH";
pub const ENV_STABILITY_RETRIES: &str = "PHOTESTHESIS_STABILITY_RETRIES";

#[derive(Debug, Clone)]
pub struct Config {
    /// Number of random expansion steps after a clean corpus check.
    pub expansion_steps: u64,
    /// Upper bound (exclusive) on the k used for initial k-path coverings.
    pub k_path_length: u64,
    /// Depth limit for random value generation.
    pub random_depth: u64,
    /// Seed for the driver's generator, if pinned.
    pub random_seed: Option<u64>,
    /// Diagnostic verbosity tier.
    pub verbose: u64,
    /// Restrict corpus checking to the plan with this hash.
    pub test_hash: Option<u64>,
    /// Re-run budget when masking unstable path edges.
    pub stability_retries: u64,
}

impl Config {
    pub fn from_env(expansion_steps: u64, k_path_length: u64, random_depth: u64) -> Config {
        Config {
            expansion_steps: env_num(ENV_EXPANSION_STEPS).unwrap_or(expansion_steps),
            k_path_length: env_num(ENV_KPATH_LENGTH).unwrap_or(k_path_length),
            random_depth: env_num(ENV_RANDOM_DEPTH).unwrap_or(random_depth),
            random_seed: env_num(ENV_RANDOM_SEED),
            verbose: env_num(ENV_VERBOSE).unwrap_or(0),
            test_hash: env_num(ENV_TEST_HASH),
            stability_retries: env_num(ENV_STABILITY_RETRIES).unwrap_or(0),
        }
    }
}

fn env_num(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    let parsed = parse_num(&raw);
    if parsed.is_none() {
        warn!(var = name, value = %raw, "ignoring unparseable configuration value");
    }
    parsed
}

/// Decimal, or hex with a `0x`/`0X` prefix.
pub(crate) fn parse_num(s: &str) -> Option<u64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}
