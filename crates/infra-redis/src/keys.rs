// Redis Key Layout

use processor_core::domain::DEFAULT_PREFIX;

/// Keys used by one (prefix, queue) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueKeys {
    pub wait: String,
    pub id: String,
    pub completed: String,
    pub failed: String,
}

impl QueueKeys {
    pub fn new(prefix: Option<&str>, queue: &str) -> Self {
        let base = format!("{}:{}", prefix.unwrap_or(DEFAULT_PREFIX), queue);
        Self {
            wait: format!("{}:wait", base),
            id: format!("{}:id", base),
            completed: format!("{}:completed", base),
            failed: format!("{}:failed", base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prefix() {
        let keys = QueueKeys::new(None, "emails");
        assert_eq!(keys.wait, "bull:emails:wait");
        assert_eq!(keys.id, "bull:emails:id");
        assert_eq!(keys.completed, "bull:emails:completed");
        assert_eq!(keys.failed, "bull:emails:failed");
    }

    #[test]
    fn test_custom_prefix() {
        assert_eq!(QueueKeys::new(Some("app"), "basic").wait, "app:basic:wait");
    }
}
