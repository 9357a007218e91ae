//! Host application collaborators

use async_trait::async_trait;
use rg_core::SettingsDocument;

use crate::actions::Action;

/// Dialogs owned by the host page
#[async_trait]
pub trait DialogHost: Send + Sync {
    /// Ask the user to confirm a destructive step
    async fn confirm(&self, message: &str) -> bool;

    /// Start the one-time setup flow of an unconfigured view
    fn open_view_setup(&self, view_id: &str);

    /// Generic failure notification
    fn notify_failure(&self, message: &str);
}

/// Menus and toolbars owned by the host page
pub trait ActionHost: Send + Sync {
    fn set_enabled(&self, action: Action, enabled: bool);

    fn set_visible(&self, _action: Action, _visible: bool) {}

    /// Re-render the summary of active report settings
    fn render_settings_summary(&self, document: &SettingsDocument);
}
