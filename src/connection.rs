//! X11 connection - the [`DisplayServer`] backed by x11rb
//!
//! Owns the protocol session, screen info, atom cache, XInput2 opcode,
//! keyboard map and the native id -> window number table. Server reads only
//! happen on the main thread in [`Connection::service_events`]; the polling
//! thread just watches the socket.

use std::os::unix::io::AsRawFd;
use std::time::Instant;

use tracing::{debug, error, info, warn};
use x11rb::connection::{Connection as _, RequestConnection as _};
use x11rb::protocol::xinput::{self, ConnectionExt as _, XIEventMask};
use x11rb::protocol::xproto::{
    AtomEnum, ConnectionExt as _, CreateWindowAux, EventMask, Gravity, Mapping, PropMode,
    WindowClass, GE_GENERIC_EVENT,
};
use x11rb::protocol::Event as X11Event;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use crate::atom::{AtomTable, KnownAtom};
use crate::config::DisplayConfig;
use crate::display::{DisplayServer, NativeWindow};
use crate::error::{error_code_name, DisplayError};
use crate::event::WindowNumber;
use crate::geometry::Rect;
use crate::input::Keymap;
use crate::queue::EventQueue;
use crate::raw::{CoreEvent, GenericEventCookie, RawEvent};
use crate::registry::WindowRegistry;
use crate::runloop::RunLoop;
use crate::source::RawEventSource;
use crate::translator::{EventTranslator, ProtocolAtoms, TranslationContext};

const XI_MAJOR: u16 = 2;
const XI_MINOR: u16 = 2;
const ALL_DEVICES: u16 = 0;
const ALL_MASTER_DEVICES: u16 = 1;

/// Ask compositors not to redirect our windows (_NET_WM_BYPASS_COMPOSITOR).
const BYPASS_COMPOSITOR_NO: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Pointer,
    Keyboard,
}

/// An XInput2 device we select events from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDevice {
    pub id: u16,
    pub name: String,
    pub kind: DeviceKind,
}

pub struct Connection {
    conn: RustConnection,
    screen_num: usize,
    root: u32,
    black_pixel: u32,
    xinput_opcode: u8,
    atoms: AtomTable,
    protocol_atoms: ProtocolAtoms,
    windows: WindowRegistry,
    keymap: Option<Keymap>,
    devices: Vec<InputDevice>,
    scale: f64,
    application_name: String,
    source: Option<RawEventSource>,
}

impl Connection {
    /// Connect to the configured display and set up XInput2.
    ///
    /// Every failure here is a startup failure; there is no degraded mode
    /// without the server or the extension.
    pub fn open(config: &DisplayConfig) -> Result<Self, DisplayError> {
        let display = config.display_name();
        let (conn, screen_num) = x11rb::connect(Some(&display))
            .map_err(|err| DisplayError::CouldNotOpenDisplay(display.clone(), err))?;

        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;
        let black_pixel = screen.black_pixel;

        conn.get_window_attributes(root)?
            .reply()
            .map_err(|_| DisplayError::BadWindowAttributes(root))?;

        let xinput_opcode = conn
            .extension_information(xinput::X11_EXTENSION_NAME)?
            .ok_or_else(|| DisplayError::MissingExtension(xinput::X11_EXTENSION_NAME.to_string()))?
            .major_opcode;

        let version = conn.xinput_xi_query_version(XI_MAJOR, XI_MINOR)?.reply()?;
        if version.major_version < XI_MAJOR {
            return Err(DisplayError::MissingExtension(format!(
                "{} {}.{} (server has {}.{})",
                xinput::X11_EXTENSION_NAME,
                XI_MAJOR,
                XI_MINOR,
                version.major_version,
                version.minor_version
            )));
        }

        let mut connection = Self {
            conn,
            screen_num,
            root,
            black_pixel,
            xinput_opcode,
            atoms: AtomTable::new(),
            protocol_atoms: ProtocolAtoms::default(),
            windows: WindowRegistry::default(),
            keymap: None,
            devices: Vec::new(),
            scale: config.scale(),
            application_name: config.application_name.clone(),
            source: None,
        };

        for atom in KnownAtom::ALL {
            connection.intern(atom.name())?;
        }
        connection.protocol_atoms = ProtocolAtoms {
            delete_window: connection.atoms.known(KnownAtom::WmDeleteWindow),
            sync_request: connection.atoms.known(KnownAtom::NetWmSyncRequest),
        };

        connection.refresh_keymap();
        connection.devices = connection.query_devices().unwrap_or_else(|err| {
            warn!(%err, "XIQueryDevice failed, selecting on master devices");
            Vec::new()
        });

        let display_name = &display;
        info!(
            display = %display_name,
            screen = screen_num,
            xinput_opcode,
            xi_version = %format!("{}.{}", version.major_version, version.minor_version),
            scale = connection.scale,
            devices = connection.devices.len(),
            "connected to X server"
        );
        Ok(connection)
    }

    fn intern(&mut self, name: &str) -> Result<u32, DisplayError> {
        let conn = &self.conn;
        self.atoms.intern_with(name, |name| {
            Ok::<_, DisplayError>(conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
        })
    }

    pub fn xinput_opcode(&self) -> u8 {
        self.xinput_opcode
    }

    pub fn devices(&self) -> &[InputDevice] {
        &self.devices
    }

    /// Reload the keycode table. Without one, key events carry no text.
    pub fn refresh_keymap(&mut self) {
        let setup = self.conn.setup();
        let (min, max) = (setup.min_keycode, setup.max_keycode);
        let count = max.saturating_sub(min).saturating_add(1);
        let reply = self
            .conn
            .get_keyboard_mapping(min, count)
            .map_err(DisplayError::from)
            .and_then(|cookie| cookie.reply().map_err(DisplayError::from));
        match reply {
            Ok(reply) => {
                debug!(min, max, per_keycode = reply.keysyms_per_keycode, "keyboard map loaded");
                self.keymap = Some(Keymap::new(min, reply.keysyms_per_keycode, reply.keysyms));
            }
            Err(err) => {
                warn!(%err, "keyboard map unavailable, key events will carry no characters");
                self.keymap = None;
            }
        }
    }

    /// Slave pointers and master keyboards.
    fn query_devices(&self) -> Result<Vec<InputDevice>, DisplayError> {
        let reply = self.conn.xinput_xi_query_device(ALL_DEVICES)?.reply()?;
        let devices = reply
            .infos
            .into_iter()
            .filter(|info| info.enabled)
            .filter_map(|info| {
                let kind = if info.type_ == xinput::DeviceType::SLAVE_POINTER {
                    DeviceKind::Pointer
                } else if info.type_ == xinput::DeviceType::MASTER_KEYBOARD {
                    DeviceKind::Keyboard
                } else {
                    return None;
                };
                let name = String::from_utf8_lossy(&info.name).into_owned();
                debug!(id = info.deviceid, %name, ?kind, "input device");
                Some(InputDevice {
                    id: info.deviceid,
                    name,
                    kind,
                })
            })
            .collect();
        Ok(devices)
    }

    fn select_input(&self, window: u32) -> Result<(), DisplayError> {
        let pointer = XIEventMask::BUTTON_PRESS
            | XIEventMask::BUTTON_RELEASE
            | XIEventMask::MOTION
            | XIEventMask::ENTER
            | XIEventMask::LEAVE
            | XIEventMask::FOCUS_IN
            | XIEventMask::FOCUS_OUT;
        let keyboard = XIEventMask::KEY_PRESS | XIEventMask::KEY_RELEASE;

        let masks: Vec<xinput::EventMask> = if self.devices.is_empty() {
            vec![xinput::EventMask {
                deviceid: ALL_MASTER_DEVICES,
                mask: vec![pointer | keyboard],
            }]
        } else {
            self.devices
                .iter()
                .map(|device| xinput::EventMask {
                    deviceid: device.id,
                    mask: vec![match device.kind {
                        DeviceKind::Pointer => pointer,
                        DeviceKind::Keyboard => keyboard,
                    }],
                })
                .collect()
        };
        self.conn.xinput_xi_select_events(window, &masks)?;
        Ok(())
    }

    fn write_title(&self, window: u32, title: &str) -> Result<(), DisplayError> {
        self.conn.change_property8(
            PropMode::REPLACE,
            window,
            AtomEnum::WM_NAME,
            AtomEnum::STRING,
            title.as_bytes(),
        )?;
        self.conn.change_property8(
            PropMode::REPLACE,
            window,
            self.atoms.known(KnownAtom::NetWmName),
            self.atoms.known(KnownAtom::Utf8String),
            title.as_bytes(),
        )?;
        Ok(())
    }

    /// Sort one packet from the socket into a raw event.
    fn classify(&self, packet: Vec<u8>) -> Result<RawEvent, DisplayError> {
        let response_type = packet.first().copied().unwrap_or(0) & 0x7f;
        if response_type == 0 {
            return Err(protocol_error(&packet));
        }
        if response_type == GE_GENERIC_EVENT {
            if let Some(cookie) = GenericEventCookie::from_wire(packet) {
                return Ok(RawEvent::Generic(cookie));
            }
            return Ok(RawEvent::Core(CoreEvent::Other {
                response_type,
                window: None,
            }));
        }
        match self.conn.parse_event(&packet) {
            Ok(event) => Ok(RawEvent::Core(core_event(response_type, event))),
            Err(err) => {
                debug!(%err, response_type, "unparseable core event");
                Ok(RawEvent::Core(CoreEvent::Other {
                    response_type,
                    window: None,
                }))
            }
        }
    }
}

fn core_event(response_type: u8, event: X11Event) -> CoreEvent {
    match event {
        X11Event::Expose(e) => CoreEvent::Expose {
            window: e.window,
            count: e.count,
        },
        X11Event::ConfigureNotify(e) => CoreEvent::Configure {
            window: e.window,
            x: e.x,
            y: e.y,
            width: e.width,
            height: e.height,
        },
        X11Event::ClientMessage(e) => CoreEvent::ClientMessage {
            window: e.window,
            message_type: e.type_,
            format: e.format,
            data: e.data.as_data32(),
        },
        X11Event::MapNotify(e) => CoreEvent::Map { window: e.window },
        X11Event::UnmapNotify(e) => CoreEvent::Unmap { window: e.window },
        X11Event::MappingNotify(e) => CoreEvent::MappingNotify {
            keyboard: e.request == Mapping::KEYBOARD,
        },
        _ => CoreEvent::Other {
            response_type,
            window: None,
        },
    }
}

fn protocol_error(packet: &[u8]) -> DisplayError {
    let byte = |i: usize| packet.get(i).copied().unwrap_or(0);
    let code = byte(1);
    DisplayError::Protocol {
        code,
        name: error_code_name(code),
        major_opcode: byte(10),
        bad_value: u32::from_ne_bytes([byte(4), byte(5), byte(6), byte(7)]),
    }
}

impl DisplayServer for Connection {
    fn attach(&mut self, run_loop: &RunLoop) -> Result<(), DisplayError> {
        if self.source.is_some() {
            return Ok(());
        }
        let fd = self.conn.stream().as_raw_fd();
        self.source = Some(RawEventSource::spawn(fd, run_loop.waker())?);
        Ok(())
    }

    fn detach(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.cancel();
        }
    }

    fn create_native_window(
        &mut self,
        rect: Rect,
        title: &str,
    ) -> Result<NativeWindow, DisplayError> {
        let frame = rect.scaled(self.scale);
        let id = self.conn.generate_id()?;

        let aux = CreateWindowAux::new()
            .background_pixel(self.black_pixel)
            .bit_gravity(Gravity::NORTH_WEST)
            .event_mask(EventMask::EXPOSURE | EventMask::STRUCTURE_NOTIFY);
        self.conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            id,
            self.root,
            frame.origin.x.round() as i16,
            frame.origin.y.round() as i16,
            frame.size.width.round().max(1.0) as u16,
            frame.size.height.round().max(1.0) as u16,
            0,
            WindowClass::INPUT_OUTPUT,
            x11rb::COPY_FROM_PARENT,
            &aux,
        )?;

        self.write_title(id, title)?;

        let class = format!("{0}\0{0}\0", self.application_name);
        self.conn.change_property8(
            PropMode::REPLACE,
            id,
            AtomEnum::WM_CLASS,
            AtomEnum::STRING,
            class.as_bytes(),
        )?;

        let protocols = [
            self.atoms.known(KnownAtom::WmDeleteWindow),
            self.atoms.known(KnownAtom::WmTakeFocus),
            self.atoms.known(KnownAtom::NetWmSyncRequest),
        ];
        self.conn.change_property32(
            PropMode::REPLACE,
            id,
            self.atoms.known(KnownAtom::WmProtocols),
            AtomEnum::ATOM,
            &protocols,
        )?;
        self.conn.change_property32(
            PropMode::REPLACE,
            id,
            self.atoms.known(KnownAtom::NetWmBypassCompositor),
            AtomEnum::CARDINAL,
            &[BYPASS_COMPOSITOR_NO],
        )?;
        self.conn.change_property32(
            PropMode::REPLACE,
            id,
            self.atoms.known(KnownAtom::NetWmPid),
            AtomEnum::CARDINAL,
            &[std::process::id()],
        )?;

        self.select_input(id)?;
        self.conn.map_window(id)?;
        self.conn.flush()?;

        debug!(window = id, ?frame, title, "native window created");
        Ok(NativeWindow {
            id,
            screen: self.screen_num,
            scale: self.scale,
            is_root: false,
        })
    }

    fn destroy_native_window(&mut self, window: &NativeWindow) -> Result<(), DisplayError> {
        // late events for this id now resolve to a foreign window
        self.windows.remove(window.id);
        if window.is_root {
            return Ok(());
        }
        self.conn.destroy_window(window.id)?;
        self.conn.flush()?;
        debug!(window = window.id, "native window destroyed");
        Ok(())
    }

    fn register_window(&mut self, window: &NativeWindow, number: WindowNumber) {
        self.windows.insert(window.id, number);
    }

    fn set_accepts_mouse_moved_events(&mut self, window: &NativeWindow, accepts: bool) {
        self.windows.set_accepts_mouse_moved_events(window.id, accepts);
    }

    fn window_frame(&self, window: &NativeWindow) -> Result<Rect, DisplayError> {
        let geometry = self.conn.get_geometry(window.id)?.reply()?;
        let origin = self
            .conn
            .translate_coordinates(window.id, self.root, 0, 0)?
            .reply()?;
        let physical = Rect::new(
            origin.dst_x as f64,
            origin.dst_y as f64,
            geometry.width as f64,
            geometry.height as f64,
        );
        Ok(physical.scaled(1.0 / window.scale))
    }

    fn set_title(&mut self, window: &NativeWindow, title: &str) -> Result<(), DisplayError> {
        self.write_title(window.id, title)?;
        self.conn.flush()?;
        Ok(())
    }

    fn service_events(
        &mut self,
        translator: &mut EventTranslator,
        queue: &mut EventQueue,
        start: Instant,
    ) -> Result<(), DisplayError> {
        while let Some(packet) = self.conn.poll_for_raw_event()? {
            let timestamp = start.elapsed();
            let raw = match self.classify(packet) {
                Ok(raw) => raw,
                Err(err) => {
                    error!(%err, "X server reported an error");
                    return Err(err);
                }
            };

            if raw == RawEvent::Core(CoreEvent::MappingNotify { keyboard: true }) {
                self.refresh_keymap();
            }

            let cx = TranslationContext {
                windows: &self.windows,
                scale: self.scale,
                xinput_opcode: self.xinput_opcode,
                atoms: self.protocol_atoms,
                keymap: self.keymap.as_ref(),
            };
            queue.post(translator.translate_or_ignore(&raw, &cx, timestamp), false);
        }
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // the polling thread must not outlive the socket
        self.detach();
        if !self.windows.is_empty() {
            debug!(windows = self.windows.len(), "closing connection with live windows");
        }
    }
}
