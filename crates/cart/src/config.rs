//! Cart configuration.

use chrono::Duration;

/// Time bounds for cart holds.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// How long a cart item's soft hold lasts; refreshed on every
    /// mutating cart operation touching the row. Applies uniformly to
    /// authenticated and anonymous carts.
    pub reservation_ttl: Duration,

    /// Absolute lifetime of an anonymous session cart.
    pub anonymous_cart_ttl: Duration,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            reservation_ttl: Duration::minutes(15),
            anonymous_cart_ttl: Duration::hours(24),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CartConfig::default();
        assert_eq!(config.reservation_ttl, Duration::minutes(15));
        assert_eq!(config.anonymous_cart_ttl, Duration::hours(24));
    }
}
