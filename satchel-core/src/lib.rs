#![warn(missing_docs)]
//! # satchel-core
//!
//! Shared vocabulary for the satchel workspace.
//!
//! Two caching layers live in this workspace: the application-level request
//! client (`satchel`) and the network-intercept offline cache
//! (`satchel-worker`). They never call each other, but they sit on the same
//! network path, so they share:
//!
//! - the key types used to address cached and in-flight requests ([`CacheKey`], [`KeyPart`]);
//! - the single cacheability rule ([`is_cacheable`]);
//! - the notification seam towards the UI ([`Notifier`], [`NotificationKind`]).
//!
//! ## Feature Flags
//!
//! - `test-helpers` - Enable [`RecordingNotifier`] for assertions in tests
//!

pub mod cacheable;
pub mod key;
pub mod notify;

pub use cacheable::{is_cacheable, is_cacheable_method};
pub use key::{CacheKey, KeyPart};
#[cfg(feature = "test-helpers")]
pub use notify::{Notification, RecordingNotifier};
pub use notify::{NoopNotifier, NotificationKind, Notifier, TracingNotifier};
#[doc(hidden)]
pub use smol_str::SmolStr;
