//! Log panel - summary of the shell log as a settings page

use crate::services::logging::{LogLevel, ShellLog};
use crate::services::{Plugin, PluginHandle, SettingsPage, StaticPage};

pub const NAME: &str = "log-panel";

const PAGE_PRIORITY: i32 = 30;

#[derive(Default)]
pub struct LogPanel {
    handle: Option<PluginHandle>,
}

fn summary(log: &ShellLog) -> Vec<(String, String)> {
    let lines = log.lines();
    let warnings: Vec<_> = lines.iter().filter(|l| l.level == LogLevel::Warn).collect();

    let mut fields = vec![
        ("Lines".to_string(), lines.len().to_string()),
        ("Warnings".to_string(), warnings.len().to_string()),
    ];
    if let Some(last) = warnings.last() {
        fields.push((
            "Last warning".to_string(),
            format!("[{}] {}", last.source, last.message),
        ));
    }
    fields
}

impl Plugin for LogPanel {
    fn name(&self) -> &str {
        NAME
    }

    fn initialize(&mut self, handle: PluginHandle) -> anyhow::Result<()> {
        let log = handle.shell_log();
        handle.add_settings_page(PAGE_PRIORITY, "Log", move || {
            Box::new(StaticPage::new("Log", summary(&log))) as Box<dyn SettingsPage>
        });
        handle.debug("log panel ready");
        self.handle = Some(handle);
        Ok(())
    }

    fn finalize(&mut self) -> anyhow::Result<()> {
        if let Some(handle) = self.handle.take() {
            handle.debug("log panel closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{PluginHost, SettingsRegistry, ShellLog};
    use std::sync::Arc;

    #[test]
    fn test_page_reflects_log_at_open_time() {
        let settings = Arc::new(SettingsRegistry::new());
        let log = Arc::new(ShellLog::default());
        let host = PluginHost::new(Arc::clone(&settings), Arc::clone(&log));
        host.load::<LogPanel>().unwrap();

        log.warn("shell", "disk almost full");
        let (category, page) = settings.pages().next().unwrap();
        assert_eq!(category, "Log");
        let fields = page.fields();
        assert!(fields.contains(&("Warnings".to_string(), "1".to_string())));
        assert!(fields
            .iter()
            .any(|(k, v)| k == "Last warning" && v.contains("disk almost full")));

        host.unload(NAME).unwrap();
        assert!(settings.is_empty());
    }

    #[test]
    fn test_page_factory_does_not_hold_the_registry() {
        let settings = Arc::new(SettingsRegistry::new());
        let host = PluginHost::new(Arc::clone(&settings), Arc::new(ShellLog::default()));
        let before = Arc::strong_count(&settings);

        host.load::<LogPanel>().unwrap();
        // Only the plugin's own handle refers back to the registry
        assert_eq!(Arc::strong_count(&settings), before + 1);

        drop(host);
        assert_eq!(Arc::strong_count(&settings), before - 1);
    }
}
