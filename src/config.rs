//! Locker configuration
//!
//! Bounds on titles and PINs plus the defaults used when a container is
//! created from scratch.

/// Locker configuration
#[derive(Clone, Copy, Debug)]
pub struct LockerConfig {
    /// Maximum title length in bytes
    pub max_title_len: usize,
    /// Maximum master PIN length in bytes (longer stored PINs are truncated on load)
    pub max_pin_len: usize,
    /// Master PIN written into a freshly created container
    pub default_pin: &'static str,
    /// Create the container with a default header when `open` finds no file
    pub create_if_missing: bool,
}

impl LockerConfig {
    /// Standard limits (128-byte title and 32-byte PIN fields, minus terminator)
    pub const STANDARD: Self = Self {
        max_title_len: 127,
        max_pin_len: 31,
        default_pin: "admin",
        create_if_missing: true,
    };

    /// Same limits, but `open` refuses to create a missing container
    pub const EXISTING_ONLY: Self = Self {
        create_if_missing: false,
        ..Self::STANDARD
    };

    /// Create config with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the PIN used for new containers
    #[must_use]
    pub fn with_default_pin(mut self, pin: &'static str) -> Self {
        self.default_pin = pin;
        self
    }

    /// Check a title against the configured bounds
    #[must_use]
    pub fn title_is_valid(&self, title: &str) -> bool {
        !title.is_empty() && title.len() <= self.max_title_len
    }

    /// Check a PIN against the configured bounds
    #[must_use]
    pub fn pin_is_valid(&self, pin: &str) -> bool {
        !pin.is_empty() && pin.len() <= self.max_pin_len
    }
}

impl Default for LockerConfig {
    fn default() -> Self {
        Self::STANDARD
    }
}
