// =============================================================================
// Notification collaborator - fire-and-forget user-facing events
// =============================================================================

use tracing::{info, warn};

/// Category of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    TradeOpened,
    TradeClosed,
    BalanceReset,
    Error,
}

impl std::fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TradeOpened => write!(f, "TradeOpened"),
            Self::TradeClosed => write!(f, "TradeClosed"),
            Self::BalanceReset => write!(f, "BalanceReset"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Delivery sink for notifications. Fire-and-forget: implementations must
/// swallow their own failures; the engine never checks an outcome.
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NoticeKind, message: &str);
}

/// Routes notifications to the log stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        match kind {
            NoticeKind::Error => warn!(kind = %kind, "{message}"),
            _ => info!(kind = %kind, "{message}"),
        }
    }
}

/// Discards every notification. Useful in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _kind: NoticeKind, _message: &str) {}
}
