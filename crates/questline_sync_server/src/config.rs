//! Server configuration.

/// When snapshot listeners are invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Listeners run on the writer's thread before `set` returns.
    #[default]
    Immediate,
    /// Notifications queue until [`DocumentServer::deliver_pending`] is called.
    ///
    /// [`DocumentServer::deliver_pending`]: crate::DocumentServer::deliver_pending
    Deferred,
}

/// Configuration for the document server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum encoded size of one document in bytes.
    pub max_document_bytes: Option<usize>,
    /// Whether to reject documents holding `null` object fields.
    pub reject_null_fields: bool,
    /// Notification delivery mode.
    pub delivery: Delivery,
}

impl ServerConfig {
    /// Creates a configuration with validation on and no size limit.
    pub fn new() -> Self {
        Self {
            max_document_bytes: None,
            reject_null_fields: true,
            delivery: Delivery::Immediate,
        }
    }

    /// Sets the maximum document size.
    pub fn with_max_document_bytes(mut self, bytes: usize) -> Self {
        self.max_document_bytes = Some(bytes);
        self
    }

    /// Accepts documents that contain `null` fields.
    pub fn allow_null_fields(mut self) -> Self {
        self.reject_null_fields = false;
        self
    }

    /// Sets the delivery mode.
    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.max_document_bytes, None);
        assert!(config.reject_null_fields);
        assert_eq!(config.delivery, Delivery::Immediate);
    }

    #[test]
    fn builder_pattern() {
        let config = ServerConfig::new()
            .with_max_document_bytes(1024)
            .allow_null_fields()
            .with_delivery(Delivery::Deferred);

        assert_eq!(config.max_document_bytes, Some(1024));
        assert!(!config.reject_null_fields);
        assert_eq!(config.delivery, Delivery::Deferred);
    }
}
