//! Notification side effect
//!
//! The scheduler only knows the [`Notifier`] trait. Backends decide how a
//! notification is shown; a [`GatedNotifier`] checks the notification
//! permission lazily, at the moment a notification fires.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{RallyError, Result};

/// Options passed alongside the title.
///
/// Notifications sharing a `tag` replace each other instead of stacking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(specta::Type))]
pub struct NotificationOptions {
    pub body: String,
    pub tag: String,
}

impl NotificationOptions {
    pub fn new(body: impl Into<String>, tag: impl Into<String>) -> Self {
        Self { body: body.into(), tag: tag.into() }
    }
}

/// A sink for user-visible notifications.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// Show one notification.
    ///
    /// Errors are reported to the caller but the scheduler never propagates
    /// them: a failed notification degrades to no notification.
    async fn show(&self, title: &str, options: &NotificationOptions) -> Result<()>;
}

#[async_trait::async_trait]
impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    async fn show(&self, title: &str, options: &NotificationOptions) -> Result<()> {
        (**self).show(title, options).await
    }
}

/// Writes notifications to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn show(&self, title: &str, options: &NotificationOptions) -> Result<()> {
        info!(title, body = %options.body, tag = %options.tag, "Notification");
        Ok(())
    }
}

/// Native desktop notifications.
#[cfg(feature = "desktop")]
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    app_name: String,
}

#[cfg(feature = "desktop")]
impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self { app_name: app_name.into() }
    }
}

#[cfg(feature = "desktop")]
#[async_trait::async_trait]
impl Notifier for DesktopNotifier {
    async fn show(&self, title: &str, options: &NotificationOptions) -> Result<()> {
        let title = title.to_string();
        let body = options.body.clone();
        let app_name = self.app_name.clone();
        // The platform call can block on the session bus
        let shown = tokio::task::spawn_blocking(move || {
            notify_rust::Notification::new()
                .summary(&title)
                .body(&body)
                .appname(&app_name)
                .icon("alarm-clock")
                .show()
                .map(|_| ())
                .map_err(|err| RallyError::notification_failed(title, Box::new(err)))
        })
        .await
        .map_err(|err| RallyError::notification_unavailable(err.to_string()))?;
        shown
    }
}

/// State of the notification permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
    /// Not decided yet; may be requested.
    Default,
    /// The host has no notification capability.
    Unsupported,
}

/// Answers whether notifications may be shown.
pub trait PermissionGate: Send + Sync + 'static {
    fn permission(&self) -> Permission;

    /// Ask for permission when it has not been decided yet.
    fn request(&self) -> Permission {
        self.permission()
    }
}

/// A gate with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedPermission(pub Permission);

impl PermissionGate for FixedPermission {
    fn permission(&self) -> Permission {
        self.0
    }
}

/// Wraps a notifier with a permission check performed at fire time.
#[derive(Debug, Clone)]
pub struct GatedNotifier<N, G> {
    inner: N,
    gate: G,
}

impl<N, G> GatedNotifier<N, G> {
    pub fn new(inner: N, gate: G) -> Self {
        Self { inner, gate }
    }
}

#[async_trait::async_trait]
impl<N: Notifier, G: PermissionGate> Notifier for GatedNotifier<N, G> {
    async fn show(&self, title: &str, options: &NotificationOptions) -> Result<()> {
        let permission = match self.gate.permission() {
            Permission::Default => self.gate.request(),
            decided => decided,
        };
        match permission {
            Permission::Granted => self.inner.show(title, options).await,
            Permission::Denied | Permission::Default => Err(RallyError::notification_denied()),
            Permission::Unsupported => {
                Err(RallyError::notification_unavailable("host has no notification support"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingNotifier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AskOnce {
        asked: AtomicUsize,
        answer: Permission,
    }

    impl PermissionGate for AskOnce {
        fn permission(&self) -> Permission {
            if self.asked.load(Ordering::SeqCst) == 0 { Permission::Default } else { self.answer }
        }

        fn request(&self) -> Permission {
            self.asked.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }

    #[tokio::test]
    async fn granted_permission_passes_through() {
        let recorder = RecordingNotifier::new();
        let gated = GatedNotifier::new(recorder.clone(), FixedPermission(Permission::Granted));
        gated.show("5 minutes left", &NotificationOptions::new("arrive at PKC2", "rally")).await.unwrap();
        assert_eq!(recorder.titles(), vec!["5 minutes left".to_string()]);
    }

    #[tokio::test]
    async fn denied_and_unsupported_do_not_reach_the_backend() {
        let recorder = RecordingNotifier::new();
        let denied = GatedNotifier::new(recorder.clone(), FixedPermission(Permission::Denied));
        let err = denied.show("t", &NotificationOptions::new("b", "tag")).await.unwrap_err();
        assert!(matches!(err, RallyError::NotificationDenied));

        let unsupported = GatedNotifier::new(recorder.clone(), FixedPermission(Permission::Unsupported));
        let err = unsupported.show("t", &NotificationOptions::new("b", "tag")).await.unwrap_err();
        assert!(matches!(err, RallyError::NotificationUnavailable { .. }));
        assert!(recorder.is_empty());
    }

    #[tokio::test]
    async fn undecided_permission_is_requested_lazily() {
        let recorder = RecordingNotifier::new();
        let gate = AskOnce { asked: AtomicUsize::new(0), answer: Permission::Granted };
        let gated = GatedNotifier::new(recorder.clone(), gate);
        gated.show("1 minute left", &NotificationOptions::new("b", "tag")).await.unwrap();
        gated.show("1 minute left", &NotificationOptions::new("b", "tag")).await.unwrap();
        assert_eq!(gated.gate.asked.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.len(), 2);
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        LogNotifier.show("Test", &NotificationOptions::new("body", "tag")).await.unwrap();
    }
}
