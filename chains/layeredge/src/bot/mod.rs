pub mod notification;
pub mod session;

pub use notification::{
    FanoutNotifier, LogNotifier, Notifier, RunEvent, StepKind, TelegramConfig, TelegramNotifier,
};
pub use session::{Language, SessionContext, Storage};
