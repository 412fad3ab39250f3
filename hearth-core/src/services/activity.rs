//! Global stop/resume of the shell's background activity
//!
//! `all_stop` suspends plugins, mining and networking before a blocking
//! password prompt; `carry_on` restores whatever was running before. Both are
//! idempotent.

use std::sync::{Arc, Mutex};

use crate::ports::NodeClient;
use crate::services::logging::ShellLog;
use crate::services::plugin::PluginHost;

pub trait ActivityControl: Send + Sync {
    fn all_stop(&self);
    fn carry_on(&self);
    fn is_stopped(&self) -> bool;
}

/// Keeps the shell stopped for as long as it lives
///
/// Stops on creation unless something already stopped the shell, and in that
/// case leaves resuming to whoever did.
pub struct SuspendGuard<'a> {
    control: &'a dyn ActivityControl,
    resume_on_drop: bool,
}

impl<'a> SuspendGuard<'a> {
    pub fn new(control: &'a dyn ActivityControl) -> Self {
        let resume_on_drop = !control.is_stopped();
        if resume_on_drop {
            control.all_stop();
        }
        Self {
            control,
            resume_on_drop,
        }
    }
}

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        if self.resume_on_drop {
            self.control.carry_on();
        }
    }
}

/// Activity control for contexts with nothing running in the background
#[derive(Debug, Default)]
pub struct NoActivity;

impl ActivityControl for NoActivity {
    fn all_stop(&self) {}

    fn carry_on(&self) {}

    fn is_stopped(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
struct StopState {
    stopped: bool,
    resume_network: bool,
    resume_mining: bool,
}

/// Stops plugins and node activity together
pub struct ShellActivity {
    plugins: Arc<PluginHost>,
    node: Arc<dyn NodeClient>,
    log: Arc<ShellLog>,
    state: Mutex<StopState>,
}

impl ShellActivity {
    pub fn new(plugins: Arc<PluginHost>, node: Arc<dyn NodeClient>, log: Arc<ShellLog>) -> Self {
        Self {
            plugins,
            node,
            log,
            state: Mutex::new(StopState::default()),
        }
    }
}

impl ActivityControl for ShellActivity {
    fn all_stop(&self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if state.stopped {
            return;
        }

        state.resume_mining = self.node.is_mining();
        state.resume_network = self.node.is_networking();
        if state.resume_mining {
            self.node.stop_mining();
        }
        if state.resume_network {
            self.node.stop_network();
        }
        self.plugins.all_stop();
        state.stopped = true;
        self.log.debug("shell", "all stop");
    }

    fn carry_on(&self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if !state.stopped {
            return;
        }

        self.plugins.carry_on();
        if state.resume_network {
            if let Err(e) = self.node.start_network() {
                self.log.warn("shell", format!("could not restart network: {}", e));
            }
        }
        if state.resume_mining {
            if let Err(e) = self.node.start_mining() {
                self.log.warn("shell", format!("could not restart mining: {}", e));
            }
        }
        *state = StopState::default();
        self.log.debug("shell", "carry on");
    }

    fn is_stopped(&self) -> bool {
        self.state.lock().map(|s| s.stopped).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::DemoNode;
    use crate::services::settings::SettingsRegistry;

    fn shell(node: &Arc<DemoNode>) -> ShellActivity {
        let log = Arc::new(ShellLog::default());
        let plugins = Arc::new(PluginHost::new(
            Arc::new(SettingsRegistry::new()),
            Arc::clone(&log),
        ));
        ShellActivity::new(plugins, Arc::clone(node) as Arc<dyn NodeClient>, log)
    }

    #[test]
    fn test_restores_only_what_was_running() {
        let node = Arc::new(DemoNode::new());
        node.start_network().unwrap();
        let activity = shell(&node);

        activity.all_stop();
        activity.all_stop();
        assert!(!node.is_networking());
        assert!(activity.is_stopped());

        activity.carry_on();
        activity.carry_on();
        assert!(node.is_networking());
        assert!(!node.is_mining());
        assert_eq!(
            node.calls(),
            vec!["start_network", "stop_network", "start_network"]
        );
    }

    #[test]
    fn test_carry_on_without_stop_is_noop() {
        let node = Arc::new(DemoNode::new());
        let activity = shell(&node);
        activity.carry_on();
        assert!(node.calls().is_empty());
    }

    #[test]
    fn test_nested_guards_resume_once() {
        let node = Arc::new(DemoNode::new());
        node.start_mining().unwrap();
        let activity = shell(&node);

        {
            let _outer = SuspendGuard::new(&activity);
            {
                let _inner = SuspendGuard::new(&activity);
                assert!(!node.is_mining());
            }
            assert!(activity.is_stopped());
        }
        assert!(!activity.is_stopped());
        assert!(node.is_mining());
        assert_eq!(node.calls(), vec!["start_mining", "stop_mining", "start_mining"]);
    }
}
