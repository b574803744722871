//! Client configuration: endpoints, page size and folder polling.

use std::time::Duration;

/// Base URL for Google Drive API v2.
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v2";

/// Upload URL for Google Drive API v2.
pub const UPLOAD_API_BASE: &str = "https://www.googleapis.com/upload/drive/v2";

/// Largest page the v2 files.list endpoint will return.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Settings shared by every request a `DriveClient` makes.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base: String,
    pub upload_base: String,
    pub page_size: u32,
    pub folder_poll: FolderPollPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DRIVE_API_BASE.to_string(),
            upload_base: UPLOAD_API_BASE.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            folder_poll: FolderPollPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_upload_base(mut self, base: impl Into<String>) -> Self {
        self.upload_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Clamped to at least one item per page.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_folder_poll(mut self, policy: FolderPollPolicy) -> Self {
        self.folder_poll = policy;
        self
    }
}

/// Backoff schedule used while waiting for a newly created folder to show up
/// in listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FolderPollPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for FolderPollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(16),
        }
    }
}

impl FolderPollPolicy {
    /// Delay to wait before poll `attempt` (zero-based): doubles each time,
    /// capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Sum of every delay in the schedule.
    pub fn total_budget(&self) -> Duration {
        (0..self.max_attempts).map(|a| self.delay_for(a)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints() {
        let config = ClientConfig::default();
        assert_eq!(config.api_base, DRIVE_API_BASE);
        assert_eq!(config.upload_base, UPLOAD_API_BASE);
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_base_trailing_slash_trimmed() {
        let config = ClientConfig::default()
            .with_api_base("http://127.0.0.1:1234/drive/v2/")
            .with_upload_base("http://127.0.0.1:1234/upload/");
        assert_eq!(config.api_base, "http://127.0.0.1:1234/drive/v2");
        assert_eq!(config.upload_base, "http://127.0.0.1:1234/upload");
    }

    #[test]
    fn test_page_size_never_zero() {
        assert_eq!(ClientConfig::default().with_page_size(0).page_size, 1);
    }

    #[test]
    fn test_delay_schedule() {
        let policy = FolderPollPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(4), Duration::from_secs(16));
        assert_eq!(policy.delay_for(10), Duration::from_secs(16));
        assert_eq!(policy.delay_for(40), Duration::from_secs(16));
        assert_eq!(policy.total_budget(), Duration::from_secs(31));
    }
}
