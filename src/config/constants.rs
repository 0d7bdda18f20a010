/// Default CPU frequency floor applied while boosting, in kHz
pub const DEFAULT_BOOST_FREQ_KHZ: u64 = 1_026_000;

/// Default length of a boost window in milliseconds
pub const DEFAULT_BOOST_DURATION_MS: u64 = 500;

/// Environment variable overriding the boost frequency
pub const ENV_BOOST_FREQ_KHZ: &str = "INPUT_BOOST_FREQ_KHZ";

/// Environment variable overriding the boost window
pub const ENV_BOOST_DURATION_MS: &str = "INPUT_BOOST_DURATION_MS";
