//! Transient view state shared with the presentation layer.
//!
//! Only `medic_view_mode` outlives the process; everything else resets to
//! its default on startup.

use crate::ViewMode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// View flags read by the presentation layer
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UiState {
    pub edit_mode: bool,
    pub show_modal: bool,
    /// Shot whose time is being corrected, if any
    pub shot_to_edit: Option<Uuid>,
    pub medic_view_mode: ViewMode,
}

/// Keys to merge into [`UiState`]; `None` leaves a key untouched
///
/// `shot_to_edit` is doubly optional so a patch can clear it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UiPatch {
    pub edit_mode: Option<bool>,
    pub show_modal: Option<bool>,
    pub shot_to_edit: Option<Option<Uuid>>,
    pub medic_view_mode: Option<ViewMode>,
}

impl UiPatch {
    pub fn edit_mode(mut self, value: bool) -> Self {
        self.edit_mode = Some(value);
        self
    }

    pub fn show_modal(mut self, value: bool) -> Self {
        self.show_modal = Some(value);
        self
    }

    pub fn shot_to_edit(mut self, value: Option<Uuid>) -> Self {
        self.shot_to_edit = Some(value);
        self
    }

    pub fn medic_view_mode(mut self, value: ViewMode) -> Self {
        self.medic_view_mode = Some(value);
        self
    }

    /// Whether applying this patch can change a durable key
    pub fn touches_durable(&self) -> bool {
        self.medic_view_mode.is_some()
    }
}

impl UiState {
    /// Fresh state for a new process, keeping the durable preference
    pub fn with_view_mode(medic_view_mode: ViewMode) -> Self {
        Self {
            medic_view_mode,
            ..Self::default()
        }
    }

    /// Shallow merge: every key present in `patch` overwrites the current value
    pub fn set(&mut self, patch: UiPatch) {
        if let Some(edit_mode) = patch.edit_mode {
            self.edit_mode = edit_mode;
        }
        if let Some(show_modal) = patch.show_modal {
            self.show_modal = show_modal;
        }
        if let Some(shot_to_edit) = patch.shot_to_edit {
            self.shot_to_edit = shot_to_edit;
        }
        if let Some(medic_view_mode) = patch.medic_view_mode {
            self.medic_view_mode = medic_view_mode;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ui = UiState::default();
        assert!(!ui.edit_mode);
        assert!(!ui.show_modal);
        assert_eq!(ui.shot_to_edit, None);
        assert_eq!(ui.medic_view_mode, ViewMode::List);
    }

    #[test]
    fn test_set_merges_only_given_keys() {
        let mut ui = UiState::default();
        ui.set(UiPatch::default().edit_mode(true).show_modal(true));

        ui.set(UiPatch::default().show_modal(false));

        assert!(ui.edit_mode, "untouched key must survive the merge");
        assert!(!ui.show_modal);
    }

    #[test]
    fn test_shot_to_edit_can_be_cleared() {
        let mut ui = UiState::default();
        let id = Uuid::new_v4();

        ui.set(UiPatch::default().shot_to_edit(Some(id)));
        assert_eq!(ui.shot_to_edit, Some(id));

        ui.set(UiPatch::default().edit_mode(true));
        assert_eq!(ui.shot_to_edit, Some(id));

        ui.set(UiPatch::default().shot_to_edit(None));
        assert_eq!(ui.shot_to_edit, None);
    }

    #[test]
    fn test_with_view_mode_resets_ephemeral_flags() {
        let ui = UiState::with_view_mode(ViewMode::Button);
        assert_eq!(ui.medic_view_mode, ViewMode::Button);
        assert!(!ui.edit_mode);
        assert_eq!(ui.shot_to_edit, None);
    }

    #[test]
    fn test_touches_durable() {
        assert!(!UiPatch::default().show_modal(true).touches_durable());
        assert!(UiPatch::default()
            .medic_view_mode(ViewMode::Button)
            .touches_durable());
    }
}
