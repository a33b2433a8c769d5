// Display-state module
// Normal / zoomed / fullscreen transitions and write-back of the window geometry

use crate::config::ConfigStore;
use crate::geometry::{Geometry, WmState};
use crate::image_loader::ImageData;
use crate::shortcuts::{default_shortcuts, Action, KeyStroke, ShortcutDispatcher};
use crate::viewport::ImageViewport;
use anyhow::Result;
use log::{debug, info};
use std::ops::ControlFlow;

pub const DEFAULT_TITLE: &str = "Image Viewer";

/// Commands and queries the controller needs from the live window
pub trait WindowSystem {
    fn geometry(&self) -> Geometry;
    fn set_geometry(&mut self, geometry: &Geometry);
    fn state(&self) -> WmState;
    fn set_state(&mut self, state: WmState);
    fn is_fullscreen(&self) -> bool;
    fn set_fullscreen(&mut self, fullscreen: bool);
    fn set_title(&mut self, title: &str);
}

/// How the window is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayState {
    Normal,
    Zoomed,
    Fullscreen,
}

impl From<WmState> for DisplayState {
    fn from(state: WmState) -> Self {
        match state {
            WmState::Normal => DisplayState::Normal,
            WmState::Zoomed => DisplayState::Zoomed,
        }
    }
}

/// The last report of the window manager about the window, see [`Controller::on_window_report`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowReport {
    pub state: WmState,
    pub fullscreen: bool,
    pub geometry: Geometry,
}

/// Owns the display state of the main window and mirrors it into the config store.
///
/// Leaving fullscreen through the zoomed state makes the window manager report
/// a bogus geometry with its first "normal" notification. A resize seen while
/// fullscreen arms `bugfix`; the next normal report is then discarded and the
/// last persisted geometry is put back on the window.
pub struct Controller<W: WindowSystem> {
    window: W,
    config: ConfigStore,
    display_state: DisplayState,
    bugfix: bool,
    shortcuts: ShortcutDispatcher,
    viewport: Option<ImageViewport>,
}

impl<W: WindowSystem> Controller<W> {
    pub fn new(mut window: W, config: ConfigStore) -> Self {
        info!("Open window");
        let geometry = config.geometry();
        let state = config.state();
        window.set_title(DEFAULT_TITLE);
        window.set_geometry(&geometry);
        window.set_state(state);

        let shortcuts = ShortcutDispatcher::new(default_shortcuts(), config.control_chord());
        Self {
            window,
            config,
            display_state: state.into(),
            bugfix: false,
            shortcuts,
            viewport: None,
        }
    }

    pub fn display_state(&self) -> DisplayState {
        self.display_state
    }

    pub fn is_fullscreen(&self) -> bool {
        self.display_state == DisplayState::Fullscreen
    }

    #[cfg(test)]
    pub fn bugfix_pending(&self) -> bool {
        self.bugfix
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut W {
        &mut self.window
    }

    #[cfg(test)]
    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn viewport(&self) -> Option<&ImageViewport> {
        self.viewport.as_ref()
    }

    /// Enter or leave fullscreen; `None` flips the current mode
    pub fn toggle_fullscreen(&mut self, explicit: Option<bool>) {
        let fullscreen = explicit.unwrap_or(!self.is_fullscreen());
        if fullscreen == self.is_fullscreen() {
            return;
        }
        debug!("Window fullscreen {} -> {}", self.window.is_fullscreen(), fullscreen);
        self.window.set_fullscreen(fullscreen);
        self.display_state = if fullscreen {
            DisplayState::Fullscreen
        } else {
            self.window.state().into()
        };
        info!("Fullscreen {}", if fullscreen { "on" } else { "off" });
    }

    /// Adopt a fullscreen change the compositor made on its own
    pub fn sync_fullscreen(&mut self, fullscreen: bool) {
        if fullscreen == self.is_fullscreen() {
            return;
        }
        debug!("Compositor switched fullscreen to {}", fullscreen);
        self.display_state = if fullscreen {
            DisplayState::Fullscreen
        } else {
            self.window.state().into()
        };
    }

    /// Back to the default state and geometry
    pub fn reset_to_default(&mut self) {
        self.toggle_fullscreen(Some(false));
        let state = self.config.default_state();
        let geometry = self.config.default_geometry();
        self.window.set_state(state);
        self.display_state = state.into();
        self.config.set_geometry(&geometry);
        self.window.set_geometry(&geometry);
        info!("Window reset to {} ({})", geometry, state);
    }

    /// Persist a resize/move report, unless it comes from fullscreen or is the
    /// known-bad first report after leaving it
    pub fn on_resize_or_move(&mut self, reported_state: WmState, reported_geometry: Geometry) {
        if self.is_fullscreen() {
            self.bugfix = true;
            return;
        }
        if reported_state == WmState::Normal {
            if self.bugfix {
                self.bugfix = false;
                let geometry = self.config.geometry();
                debug!("Ignoring {} after fullscreen, restoring {}", reported_geometry, geometry);
                self.window.set_geometry(&geometry);
                return;
            }
            self.config.set_geometry(&reported_geometry);
        }
        self.config.set_state(reported_state);
        self.display_state = reported_state.into();
    }

    /// Handle the last window report of a burst
    pub fn on_window_report(&mut self, report: WindowReport) {
        self.sync_fullscreen(report.fullscreen);
        self.on_resize_or_move(report.state, report.geometry);
    }

    /// Handle the last keystroke of a burst
    pub fn on_keystroke(&mut self, stroke: KeyStroke) -> ControlFlow<()> {
        match self.shortcuts.dispatch(stroke) {
            Some(action) => self.perform(action),
            None => ControlFlow::Continue(()),
        }
    }

    pub fn perform(&mut self, action: Action) -> ControlFlow<()> {
        match action {
            Action::ToggleFullscreen => self.toggle_fullscreen(None),
            Action::ExitFullscreen => self.toggle_fullscreen(Some(false)),
            Action::ResetGeometry => self.reset_to_default(),
            Action::CloseImage => self.close_image(),
            Action::Quit => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    /// Show `image`, replacing the current one
    pub fn open_image(&mut self, image: ImageData) {
        self.close_image();
        let title = format!("{}: {}", DEFAULT_TITLE, image.label);
        self.viewport = Some(ImageViewport::create(image, self.config.roi_size()));
        self.window.set_title(&title);
    }

    pub fn close_image(&mut self) {
        if let Some(viewport) = self.viewport.take() {
            viewport.destroy();
            self.window.set_title(DEFAULT_TITLE);
        }
    }

    /// Release the image and write the config; the store flushes again on drop
    pub fn close(&mut self) -> Result<()> {
        self.close_image();
        let flushed = self.config.flush();
        info!("Close window");
        flushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{WindowConfig, CONFIG_FILE_NAME};
    use crate::debounce::Debouncer;
    use crate::shortcuts::CONTROL_MASK;

    /// Records what the controller does to the window
    #[derive(Debug, Default)]
    struct FakeWindow {
        geometry: Option<Geometry>,
        state: WmState,
        fullscreen: bool,
        title: String,
        geometry_calls: usize,
        fullscreen_calls: usize,
    }

    impl WindowSystem for FakeWindow {
        fn geometry(&self) -> Geometry {
            self.geometry.unwrap_or(Geometry::new(1, 1, 0, 0))
        }
        fn set_geometry(&mut self, geometry: &Geometry) {
            self.geometry = Some(*geometry);
            self.geometry_calls += 1;
        }
        fn state(&self) -> WmState {
            self.state
        }
        fn set_state(&mut self, state: WmState) {
            self.state = state;
        }
        fn is_fullscreen(&self) -> bool {
            self.fullscreen
        }
        fn set_fullscreen(&mut self, fullscreen: bool) {
            self.fullscreen = fullscreen;
            self.fullscreen_calls += 1;
        }
        fn set_title(&mut self, title: &str) {
            self.title = title.to_string();
        }
    }

    fn geom(s: &str) -> Geometry {
        s.parse().expect("geometry")
    }

    fn controller(geometry: &str, state: &str) -> Controller<FakeWindow> {
        let config = WindowConfig {
            geometry: geometry.to_string(),
            state: state.to_string(),
            default_geometry: "640x480+0+0".to_string(),
            default_state: "normal".to_string(),
            ..WindowConfig::default()
        };
        Controller::new(FakeWindow::default(), ConfigStore::in_memory(config))
    }

    #[test]
    fn construction_applies_persisted_geometry() {
        let c = controller("800x600+0+0", "normal");
        assert_eq!(c.window().geometry, Some(geom("800x600+0+0")));
        assert_eq!(c.window().state, WmState::Normal);
        assert_eq!(c.window().title, DEFAULT_TITLE);
        assert_eq!(c.display_state(), DisplayState::Normal);
    }

    #[test]
    fn zoomed_state_is_restored() {
        let c = controller("800x600+0+0", "zoomed");
        assert_eq!(c.window().state, WmState::Zoomed);
        assert_eq!(c.display_state(), DisplayState::Zoomed);
    }

    #[test]
    fn invalid_state_starts_normal() {
        let c = controller("800x600+0+0", "withdrawn");
        assert_eq!(c.display_state(), DisplayState::Normal);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut c = controller("800x600+0+0", "normal");
        c.toggle_fullscreen(Some(true));
        c.reset_to_default();

        assert_eq!(c.config().geometry(), geom("640x480+0+0"));
        assert_eq!(c.window().geometry, Some(geom("640x480+0+0")));
        assert!(!c.window().fullscreen);
        assert_eq!(c.display_state(), DisplayState::Normal);
    }

    #[test]
    fn repeated_report_is_idempotent() {
        let mut c = controller("800x600+0+0", "normal");
        c.on_resize_or_move(WmState::Normal, geom("900x700+10+10"));
        let once = c.config().config().clone();
        c.on_resize_or_move(WmState::Normal, geom("900x700+10+10"));

        assert_eq!(c.config().config(), &once);
        assert_eq!(once.geometry, "900x700+10+10");
        assert_eq!(once.state, "normal");
    }

    #[test]
    fn fullscreen_reports_are_never_persisted() {
        let mut c = controller("800x600+0+0", "normal");
        let before = c.config().config().clone();
        c.toggle_fullscreen(None);
        assert_eq!(c.display_state(), DisplayState::Fullscreen);

        c.on_resize_or_move(WmState::Normal, geom("1920x1080+0+0"));
        c.on_resize_or_move(WmState::Zoomed, geom("1920x1080+0+0"));

        assert_eq!(c.config().config(), &before);
        assert!(c.bugfix_pending());
    }

    #[test]
    fn first_normal_report_after_fullscreen_is_corrected() {
        let mut c = controller("800x600+0+0", "normal");
        c.toggle_fullscreen(Some(true));
        c.on_resize_or_move(WmState::Zoomed, geom("1920x1080+0+0"));
        c.toggle_fullscreen(Some(false));
        let calls = c.window().geometry_calls;

        c.on_resize_or_move(WmState::Normal, geom("1920x1053+0+27"));

        assert_eq!(c.config().geometry(), geom("800x600+0+0"));
        assert_eq!(c.window().geometry, Some(geom("800x600+0+0")));
        assert_eq!(c.window().geometry_calls, calls + 1);
        assert!(!c.bugfix_pending());

        // Later reports are trusted again
        c.on_resize_or_move(WmState::Normal, geom("820x600+0+0"));
        assert_eq!(c.config().geometry(), geom("820x600+0+0"));
    }

    #[test]
    fn zoomed_report_after_fullscreen_keeps_bugfix_armed() {
        let mut c = controller("800x600+0+0", "normal");
        c.toggle_fullscreen(Some(true));
        c.on_resize_or_move(WmState::Normal, geom("1920x1080+0+0"));
        c.toggle_fullscreen(Some(false));

        c.on_resize_or_move(WmState::Zoomed, geom("1920x1053+0+27"));
        assert!(c.bugfix_pending());
        assert_eq!(c.config().state(), WmState::Zoomed);
        assert_eq!(c.config().geometry(), geom("800x600+0+0"));
        assert_eq!(c.display_state(), DisplayState::Zoomed);

        c.on_resize_or_move(WmState::Normal, geom("1920x1053+0+27"));
        assert!(!c.bugfix_pending());
        assert_eq!(c.config().geometry(), geom("800x600+0+0"));
    }

    #[test]
    fn burst_of_reports_is_handled_once_with_last_data() {
        let mut c = controller("800x600+0+0", "normal");
        let mut reports = Debouncer::new("resize");
        for g in ["801x600+0+0", "802x600+0+0", "803x600+0+0"] {
            reports.push(WindowReport {
                state: WmState::Normal,
                fullscreen: false,
                geometry: geom(g),
            });
        }

        let mut passes = 0;
        while let Some(report) = reports.take() {
            c.on_window_report(report);
            passes += 1;
        }

        assert_eq!(passes, 1);
        assert_eq!(c.config().geometry(), geom("803x600+0+0"));
    }

    #[test]
    fn compositor_leaving_fullscreen_is_adopted() {
        let mut c = controller("800x600+0+0", "normal");
        c.toggle_fullscreen(Some(true));
        c.on_window_report(WindowReport {
            state: WmState::Normal,
            fullscreen: true,
            geometry: geom("1920x1080+0+0"),
        });
        c.on_window_report(WindowReport {
            state: WmState::Normal,
            fullscreen: false,
            geometry: geom("1920x1080+0+0"),
        });

        assert_eq!(c.display_state(), DisplayState::Normal);
        assert_eq!(c.window().geometry, Some(geom("800x600+0+0")));
        assert_eq!(c.config().geometry(), geom("800x600+0+0"));
    }

    #[test]
    fn chord_shortcuts_drive_actions() {
        let mut c = controller("800x600+0+0", "normal");
        let ctrl_f = KeyStroke {
            keycode: 33,
            modifiers: CONTROL_MASK,
        };
        assert_eq!(c.on_keystroke(ctrl_f), ControlFlow::Continue(()));
        assert!(c.is_fullscreen());

        let plain_q = KeyStroke {
            keycode: 16,
            modifiers: 0,
        };
        assert_eq!(c.on_keystroke(plain_q), ControlFlow::Continue(()));

        let ctrl_q = KeyStroke {
            keycode: 16,
            modifiers: CONTROL_MASK,
        };
        assert_eq!(c.on_keystroke(ctrl_q), ControlFlow::Break(()));
    }

    #[test]
    fn opening_and_closing_image_updates_title() {
        let mut c = controller("800x600+0+0", "normal");
        c.open_image(ImageData::from_rgba("cat.png", 1, 1, vec![0, 0, 0, 255]));
        assert!(c.viewport().is_some());
        assert_eq!(c.window().title, "Image Viewer: cat.png");

        c.open_image(ImageData::from_rgba("dog.png", 1, 1, vec![0, 0, 0, 255]));
        assert_eq!(c.viewport().map(|v| v.image().label.as_str()), Some("dog.png"));

        assert_eq!(c.perform(Action::CloseImage), ControlFlow::Continue(()));
        assert!(c.viewport().is_none());
        assert_eq!(c.window().title, DEFAULT_TITLE);
        assert!(c.close().is_ok());
    }

    #[test]
    fn leaving_fullscreen_when_not_fullscreen_does_nothing() {
        let mut c = controller("800x600+0+0", "normal");
        assert_eq!(c.perform(Action::ExitFullscreen), ControlFlow::Continue(()));
        c.toggle_fullscreen(Some(false));
        assert_eq!(c.window().fullscreen_calls, 0);

        c.toggle_fullscreen(Some(true));
        c.toggle_fullscreen(Some(true));
        assert_eq!(c.window().fullscreen_calls, 1);
        assert!(c.is_fullscreen());
    }

    #[test]
    fn close_writes_reported_state_to_disk() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(CONFIG_FILE_NAME);

        let mut c = Controller::new(FakeWindow::default(), ConfigStore::load(&path));
        c.on_resize_or_move(WmState::Normal, geom("900x700+5+5"));
        c.on_resize_or_move(WmState::Zoomed, geom("1920x1053+0+27"));
        c.close().expect("close");

        let reloaded = ConfigStore::load(&path);
        assert_eq!(reloaded.geometry(), geom("900x700+5+5"));
        assert_eq!(reloaded.state(), WmState::Zoomed);
    }
}
