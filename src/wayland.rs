// Wayland integration module
// Drives the xdg-shell window through smithay-client-toolkit and feeds the display controller

use crate::config::ConfigStore;
use crate::debounce::Debouncer;
use crate::display::{Controller, WindowReport, WindowSystem};
use crate::geometry::{Geometry, WmState};
use crate::image_loader::ImageData;
use crate::shortcuts::{modifier_mask, Action, KeyStroke};
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use smithay_client_toolkit::{
    compositor::{CompositorHandler, CompositorState},
    delegate_compositor, delegate_keyboard, delegate_output, delegate_registry, delegate_seat,
    delegate_shm, delegate_xdg_shell, delegate_xdg_window,
    output::{OutputHandler, OutputState},
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    seat::{
        keyboard::{KeyEvent, KeyboardHandler, Keysym, Modifiers},
        Capability, SeatHandler, SeatState,
    },
    shell::{
        xdg::{
            window::{Window, WindowConfigure, WindowDecorations, WindowHandler},
            XdgShell,
        },
        WaylandSurface,
    },
    shm::{
        slot::{Buffer, SlotPool},
        Shm, ShmHandler,
    },
};
use wayland_client::{
    globals::registry_queue_init,
    protocol::{wl_keyboard, wl_output, wl_seat, wl_shm, wl_surface},
    Connection, QueueHandle,
};

/// Minimum window size
const MIN_SIZE: u32 = 50;

/// Maximum window size to prevent buffer allocation failures
const MAX_SIZE: u32 = 8192;

const APP_ID: &str = "stillview";

/// Startup switches coming from the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct StartOptions {
    pub fullscreen: bool,
    pub reset_window: bool,
}

/// Current buffer size plus the last size the window had while floating.
///
/// A configure without a size asks the client to choose; after leaving the
/// maximized or fullscreen state that choice is the remembered floating size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct WindowSize {
    current: (u32, u32),
    normal: (u32, u32),
}

impl WindowSize {
    fn configure(&mut self, new_size: Option<(u32, u32)>, floating: bool) {
        match new_size {
            Some(size) => {
                self.current = size;
                if floating {
                    self.normal = size;
                }
            }
            None if floating => self.current = self.normal,
            None => {}
        }
    }

    /// Size requested by the client itself
    fn set(&mut self, size: (u32, u32)) {
        self.current = size;
        self.normal = size;
    }
}

/// The xdg toplevel as seen by the display controller.
///
/// Wayland leaves placement to the compositor, so the position half of a
/// geometry is remembered and reported back but never enforced.
pub struct XdgWindow {
    window: Window,
    size: WindowSize,
    position: (i32, i32),
    maximized: bool,
    fullscreen: bool,
    configured: bool,
    needs_redraw: bool,
}

impl XdgWindow {
    fn new(window: Window) -> Self {
        Self {
            window,
            size: WindowSize::default(),
            position: (0, 0),
            maximized: false,
            fullscreen: false,
            configured: false,
            needs_redraw: false,
        }
    }

    /// Record what the compositor told us in a configure event
    fn apply_configure(&mut self, configure: &WindowConfigure) {
        self.maximized = configure.is_maximized();
        self.fullscreen = configure.is_fullscreen();
        let new_size = match configure.new_size {
            (Some(w), Some(h)) => Some((w.get(), h.get())),
            _ => None,
        };
        self.size.configure(new_size, !self.maximized && !self.fullscreen);
        self.configured = true;
        self.needs_redraw = true;
    }

    fn report(&self) -> WindowReport {
        WindowReport {
            state: self.state(),
            fullscreen: self.fullscreen,
            geometry: self.geometry(),
        }
    }

    fn buffer_size(&self) -> (u32, u32) {
        let (width, height) = self.size.current;
        (
            width.clamp(MIN_SIZE, MAX_SIZE),
            height.clamp(MIN_SIZE, MAX_SIZE),
        )
    }
}

impl WindowSystem for XdgWindow {
    fn geometry(&self) -> Geometry {
        let (width, height) = self.buffer_size();
        Geometry::new(width, height, self.position.0, self.position.1)
    }

    fn set_geometry(&mut self, geometry: &Geometry) {
        // Takes effect with the next buffer we attach
        self.size.set((geometry.width, geometry.height));
        self.position = (geometry.x, geometry.y);
        self.needs_redraw = true;
    }

    fn state(&self) -> WmState {
        if self.maximized {
            WmState::Zoomed
        } else {
            WmState::Normal
        }
    }

    fn set_state(&mut self, state: WmState) {
        match state {
            WmState::Zoomed => self.window.set_maximized(),
            WmState::Normal => self.window.unset_maximized(),
        }
    }

    fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    fn set_fullscreen(&mut self, fullscreen: bool) {
        if fullscreen {
            self.window.set_fullscreen(None);
        } else {
            self.window.unset_fullscreen();
        }
        self.fullscreen = fullscreen;
    }

    fn set_title(&mut self, title: &str) {
        self.window.set_title(title);
    }
}

/// Main Wayland application state
struct WaylandApp {
    registry_state: RegistryState,
    seat_state: SeatState,
    output_state: OutputState,
    shm: Shm,
    // Globals the window was created from, kept alive with it
    _compositor_state: CompositorState,
    _xdg_shell: XdgShell,

    controller: Controller<XdgWindow>,

    // Raw events waiting for the next idle pass
    reports: Debouncer<WindowReport>,
    keys: Debouncer<KeyStroke>,
    // Modifier mask from the latest modifiers event
    modifiers: u32,
    keyboard: Option<wl_keyboard::WlKeyboard>,

    pool: Option<SlotPool>,
    buffer: Option<Buffer>,

    should_exit: bool,
}

impl WaylandApp {
    /// Apply an action bound to a plain key
    fn perform(&mut self, action: Action) {
        if self.controller.perform(action).is_break() {
            self.should_exit = true;
        }
    }

    /// Handle what piled up while the queue was being dispatched
    fn run_idle(&mut self) {
        if let Some(report) = self.reports.take() {
            debug!("Window report: {:?}", report);
            self.controller.on_window_report(report);
            debug!("Display state: {:?}", self.controller.display_state());
        }
        if let Some(stroke) = self.keys.take() {
            if self.controller.on_keystroke(stroke).is_break() {
                info!("Exit shortcut pressed");
                self.should_exit = true;
            }
        }
        let window = self.controller.window();
        if window.configured && window.needs_redraw {
            self.draw();
        }
    }

    /// Draw the viewport into a shared memory buffer and commit it
    fn draw(&mut self) {
        let (width, height) = self.controller.window().buffer_size();
        let stride = width as i32 * 4;
        let buffer_size = stride as usize * height as usize;

        if self.pool.is_none() {
            match SlotPool::new(buffer_size, &self.shm) {
                Ok(pool) => self.pool = Some(pool),
                Err(e) => {
                    error!("Failed to create slot pool: {}. Buffer size: {} bytes", e, buffer_size);
                    return;
                }
            }
        }
        let Some(pool) = self.pool.as_mut() else {
            return;
        };
        if pool.len() < buffer_size {
            if let Err(e) = pool.resize(buffer_size) {
                error!("Failed to resize pool to {} bytes: {}", buffer_size, e);
                self.pool = None;
                return;
            }
        }

        let (buffer, canvas) =
            match pool.create_buffer(width as i32, height as i32, stride, wl_shm::Format::Argb8888) {
                Ok(buf) => buf,
                Err(e) => {
                    error!("Failed to create buffer {}x{}: {}", width, height, e);
                    return;
                }
            };

        match self.controller.viewport() {
            Some(viewport) => viewport.render(canvas, width, height),
            None => canvas.fill(0),
        }

        let surface = self.controller.window().window.wl_surface();
        if let Err(e) = buffer.attach_to(surface) {
            error!("Failed to attach buffer: {:?}", e);
            return;
        }
        surface.damage_buffer(0, 0, width as i32, height as i32);
        surface.commit();

        self.buffer = Some(buffer);
        self.controller.window_mut().needs_redraw = false;
    }
}

impl CompositorHandler for WaylandApp {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_factor: i32,
    ) {
        debug!("Scale factor changed");
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {
        debug!("Transform changed");
    }

    fn frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _time: u32,
    ) {
    }

    fn surface_enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }

    fn surface_leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }
}

impl OutputHandler for WaylandApp {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, output: wl_output::WlOutput) {
        if let Some(info) = self.output_state.info(&output) {
            debug!("New output: {:?}", info.name);
        }
    }

    fn update_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
    }

    fn output_destroyed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("Output destroyed");
    }
}

impl WindowHandler for WaylandApp {
    fn request_close(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _window: &Window) {
        info!("Close requested");
        self.should_exit = true;
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _window: &Window,
        configure: WindowConfigure,
        _serial: u32,
    ) {
        debug!("Window configured: {:?}", configure);
        let window = self.controller.window_mut();
        window.apply_configure(&configure);
        self.reports.push(window.report());
    }
}

impl SeatHandler for WaylandApp {
    fn seat_state(&mut self) -> &mut SeatState {
        &mut self.seat_state
    }

    fn new_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {
        debug!("New seat");
    }

    fn new_capability(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        seat: wl_seat::WlSeat,
        capability: Capability,
    ) {
        if capability == Capability::Keyboard && self.keyboard.is_none() {
            match self.seat_state.get_keyboard(qh, &seat, None) {
                Ok(keyboard) => self.keyboard = Some(keyboard),
                Err(e) => error!("Failed to get keyboard: {}", e),
            }
        }
    }

    fn remove_capability(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _seat: wl_seat::WlSeat,
        capability: Capability,
    ) {
        if capability == Capability::Keyboard {
            if let Some(keyboard) = self.keyboard.take() {
                keyboard.release();
            }
        }
    }

    fn remove_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {
        debug!("Seat removed");
    }
}

impl KeyboardHandler for WaylandApp {
    fn enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _surface: &wl_surface::WlSurface,
        _serial: u32,
        _raw: &[u32],
        _keysyms: &[Keysym],
    ) {
        debug!("Keyboard entered surface");
    }

    fn leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _surface: &wl_surface::WlSurface,
        _serial: u32,
    ) {
        debug!("Keyboard left surface");
    }

    fn press_key(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        event: KeyEvent,
    ) {
        debug!("Key pressed: {:?} (code {})", event.keysym, event.raw_code);

        match event.keysym {
            Keysym::F11 => self.perform(Action::ToggleFullscreen),
            Keysym::Escape => self.perform(Action::ExitFullscreen),
            Keysym::F5 => self.perform(Action::ResetGeometry),
            _ => {}
        }

        self.keys.push(KeyStroke {
            keycode: event.raw_code,
            modifiers: self.modifiers,
        });
    }

    fn release_key(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        _event: KeyEvent,
    ) {
    }

    fn update_modifiers(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        modifiers: Modifiers,
        _layout: u32,
    ) {
        self.modifiers = modifier_mask(
            modifiers.shift,
            modifiers.caps_lock,
            modifiers.ctrl,
            modifiers.alt,
            modifiers.num_lock,
            modifiers.logo,
        );
    }
}

impl ShmHandler for WaylandApp {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.shm
    }
}

impl ProvidesRegistryState for WaylandApp {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }

    registry_handlers![OutputState, SeatState];
}

// Delegate macros
delegate_compositor!(WaylandApp);
delegate_output!(WaylandApp);
delegate_seat!(WaylandApp);
delegate_keyboard!(WaylandApp);
delegate_shm!(WaylandApp);
delegate_xdg_shell!(WaylandApp);
delegate_xdg_window!(WaylandApp);
delegate_registry!(WaylandApp);

/// Open the viewer window and run until it is closed
pub fn run(image: ImageData, config: ConfigStore, options: StartOptions) -> Result<()> {
    info!("Connecting to Wayland display");

    let conn = Connection::connect_to_env().context("Failed to connect to Wayland display")?;
    let (globals, mut event_queue) =
        registry_queue_init(&conn).context("Failed to initialize registry")?;
    let qh = event_queue.handle();

    let compositor_state =
        CompositorState::bind(&globals, &qh).context("Failed to bind compositor")?;
    let xdg_shell = XdgShell::bind(&globals, &qh).context("Failed to bind xdg shell")?;
    let shm = Shm::bind(&globals, &qh).context("Failed to bind shm")?;

    let surface = compositor_state.create_surface(&qh);
    let window = xdg_shell.create_window(surface, WindowDecorations::RequestServer, &qh);
    window.set_app_id(APP_ID);
    window.set_min_size(Some((MIN_SIZE, MIN_SIZE)));

    let mut controller = Controller::new(XdgWindow::new(window), config);
    if options.reset_window {
        controller.reset_to_default();
    }
    if options.fullscreen {
        controller.toggle_fullscreen(Some(true));
    }
    controller.open_image(image);

    // The initial commit without a buffer asks for the first configure
    controller.window().window.commit();

    let mut app = WaylandApp {
        registry_state: RegistryState::new(&globals),
        seat_state: SeatState::new(&globals, &qh),
        output_state: OutputState::new(&globals, &qh),
        shm,
        _compositor_state: compositor_state,
        _xdg_shell: xdg_shell,
        controller,
        reports: Debouncer::new("window report"),
        keys: Debouncer::new("keystroke"),
        modifiers: 0,
        keyboard: None,
        pool: None,
        buffer: None,
        should_exit: false,
    };

    info!("Starting event loop");
    info!("Keys: F11 fullscreen, Esc leave fullscreen, F5 reset window, Ctrl+W close image, Ctrl+Q quit");

    loop {
        event_queue.blocking_dispatch(&mut app)?;
        app.run_idle();

        if app.should_exit {
            info!("Exiting application");
            break;
        }
    }

    if let Err(e) = app.controller.close() {
        warn!("Failed to save window config: {:#}", e);
    }
    Ok(())
}
