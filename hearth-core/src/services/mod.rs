//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

pub mod activity;
pub mod credentials;
pub mod encryption;
pub mod logging;
pub mod plugin;
pub mod settings;

pub use activity::{ActivityControl, NoActivity, ShellActivity, SuspendGuard};
pub use credentials::{CredentialController, KeysChanged, ReencryptAllError, ReencryptReport};
pub use encryption::EncryptionService;
pub use logging::{
    EntryPoint, LogEntry, LogEvent, LogFilter, LogLevel, LogLine, LogStats, LoggingService, ShellLog,
    SHELL_WARNING_EVENT,
};
pub use plugin::{Plugin, PluginFactory, PluginHandle, PluginHost, PluginInfo};
pub use settings::{PageFactory, PageId, PageInfo, SettingsPage, SettingsRegistry, StaticPage};
