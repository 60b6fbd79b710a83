//! Hub configuration

/// Configuration for the channel hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Capacity of each connection's outbound queue
    ///
    /// A subscriber that falls this many frames behind is dropped.
    pub outbound_capacity: usize,

    /// Maximum channels one connection may subscribe to (0 = unlimited)
    pub max_subscriptions_per_connection: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
            max_subscriptions_per_connection: 0, // Unlimited
        }
    }
}

impl HubConfig {
    /// Set the outbound queue capacity
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        // mpsc::channel panics on zero
        self.outbound_capacity = capacity.max(1);
        self
    }

    /// Set the per-connection subscription limit
    pub fn max_subscriptions_per_connection(mut self, max: usize) -> Self {
        self.max_subscriptions_per_connection = max;
        self
    }
}
