use serde::{Deserialize, Serialize};

/// Registration status as seen from a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    /// The environment cannot host a cache worker.
    NotSupported,
    /// Nothing was registered yet.
    NotRegistered,
    /// A worker is installing.
    Installing,
    /// A new worker is installed and waits for activation.
    Waiting,
    /// A worker is in control.
    Active,
    /// Registered, but no worker is installing, waiting or active.
    Unknown,
}

/// Snapshot of the offline cache for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Total stored body size in bytes.
    pub size: u64,
    /// `size` for humans, see [`format_size`].
    pub formatted_size: String,
    /// Last known network status.
    pub online: bool,
    /// Registration status.
    pub status: Status,
}

const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Formats a byte count with binary units and at most two decimals.
///
/// ```
/// use satchel_lifecycle::format_size;
///
/// assert_eq!(format_size(0), "0 B");
/// assert_eq!(format_size(1536), "1.5 KB");
/// assert_eq!(format_size(5 * 1024 * 1024), "5 MB");
/// ```
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(format_size(1), "1 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1 KB");
        assert_eq!(format_size(1234), "1.21 KB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3 GB");
        assert_eq!(format_size(5000 * 1024 * 1024 * 1024), "5000 GB");
    }

    #[test]
    fn status_names() {
        assert_eq!(
            serde_json::to_string(&Status::NotSupported).unwrap(),
            r#""not-supported""#
        );
    }
}
