use crate::settings::SettingsRecord;
use crate::viewer::Viewer;

/// Where the page being rendered lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Front,
    Admin,
}

/// Decide whether the install code is emitted for this request.
pub fn should_render(viewer: &Viewer, settings: &SettingsRecord, surface: Surface) -> bool {
    if viewer.hidden_from_tracking {
        return false;
    }
    if !viewer.is_authenticated() {
        return false;
    }
    if !settings.is_configured() {
        return false;
    }
    if surface == Surface::Admin && !settings.show_in_admin {
        return false;
    }
    true
}
