//! The X11 lock surface

use std::collections::VecDeque;

use sxlock_core::{
    EmergencyRestore, EventSource, Frame, GrabTarget, Indicator, InputEvent, LockDisplay,
    PowerControl, PowerSnapshot, PowerTimings, Renderer, ResourceKind, AUTH_FAILED_BANNER,
};
use tracing::{debug, info};
use x11rb::connection::{Connection, RequestConnection};
use x11rb::protocol::dpms::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{
    ChangeGCAux, Char2b, ConfigureWindowAux, ConnectionExt as _, CreateGCAux, CreateWindowAux,
    Cursor, EventMask, Font, Gcontext, GrabMode, GrabStatus, Pixmap, Rectangle, Segment,
    StackMode, Window, WindowClass,
};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

use crate::error::{Result, X11Error};
use crate::geometry;
use crate::keymap::Keymap;
use crate::layout::{encode_latin1, TextLayout};
use crate::rescue::DpmsRescue;

/// Size of the blank cursor pixmap
const CURSOR_SIZE: u16 = 8;

/// Pixel values used for drawing
#[derive(Debug, Clone, Copy)]
struct Palette {
    black: u32,
    white: u32,
    red: u32,
}

/// An open lock surface on one X display
pub struct X11Display {
    conn: RustConnection,
    window: Window,
    gc: Gcontext,
    font: Font,
    cursor: Cursor,
    cursor_pixmap: Pixmap,
    palette: Palette,
    layout: TextLayout,
    keymap: Keymap,
    pending: VecDeque<Event>,
}

impl X11Display {
    /// Connects to `$DISPLAY`, loads `font_name` and maps a black
    /// override-redirect window over the whole screen
    pub fn open(font_name: &str) -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None)?;
        let screen = conn
            .setup()
            .roots
            .get(screen_num)
            .ok_or(X11Error::NoScreen(screen_num))?
            .clone();

        let output = geometry::query_output(&conn, &screen)?;

        let red = conn
            .alloc_color(screen.default_colormap, 0xffff, 0, 0)?
            .reply()?
            .pixel;
        let palette = Palette {
            black: screen.black_pixel,
            white: screen.white_pixel,
            red,
        };

        let font = conn.generate_id()?;
        conn.open_font(font, font_name.as_bytes())?
            .check()
            .map_err(|_| X11Error::Font(font_name.to_string()))?;
        let ascent = conn.query_font(font)?.reply()?.font_ascent;

        let window = conn.generate_id()?;
        conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            window,
            screen.root,
            0,
            0,
            screen.width_in_pixels,
            screen.height_in_pixels,
            0,
            WindowClass::INPUT_OUTPUT,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new()
                .background_pixel(palette.black)
                .override_redirect(1)
                .event_mask(EventMask::EXPOSURE | EventMask::VISIBILITY_CHANGE),
        )?;

        let (cursor, cursor_pixmap) = invisible_cursor(&conn, window)?;

        let gc = conn.generate_id()?;
        conn.create_gc(
            gc,
            window,
            &CreateGCAux::new()
                .foreground(palette.white)
                .background(palette.black)
                .font(font),
        )?;

        conn.map_window(window)?;
        conn.configure_window(window, &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE))?;
        conn.flush()?;

        let keymap = Keymap::load(&conn)?;
        info!(?output, "lock surface mapped");

        Ok(Self {
            conn,
            window,
            gc,
            font,
            cursor,
            cursor_pixmap,
            palette,
            layout: TextLayout::new(output, ascent),
            keymap,
            pending: VecDeque::new(),
        })
    }

    fn text_width(&self, text: &[u8]) -> Result<i32> {
        if text.is_empty() {
            return Ok(0);
        }
        let chars: Vec<Char2b> = text
            .iter()
            .map(|&byte2| Char2b { byte1: 0, byte2 })
            .collect();
        Ok(self
            .conn
            .query_text_extents(self.font, &chars)?
            .reply()?
            .overall_width)
    }

    fn draw(&self, frame: &Frame<'_>) -> Result<()> {
        self.conn.clear_area(false, self.window, 0, 0, 0, 0)?;
        self.set_foreground(self.palette.white)?;

        let username = encode_latin1(frame.username);
        let (x, y) = self.layout.username_origin(self.text_width(&username)?);
        self.conn.image_text8(self.window, self.gc, x, y, &username)?;

        let ((x1, y1), (x2, y2)) = self.layout.rule();
        self.conn.poly_segment(
            self.window,
            self.gc,
            &[Segment { x1, y1, x2, y2 }],
        )?;

        let indicator = match frame.indicator {
            Indicator::Masked(mask) => encode_latin1(mask),
            Indicator::AuthFailed => {
                self.set_foreground(self.palette.red)?;
                AUTH_FAILED_BANNER.as_bytes().to_vec()
            }
        };
        if !indicator.is_empty() {
            let (x, y) = self.layout.indicator_origin(self.text_width(&indicator)?);
            // image_text8 carries at most 255 bytes
            let end = indicator.len().min(255);
            self.conn
                .image_text8(self.window, self.gc, x, y, &indicator[..end])?;
        }

        self.conn.flush()?;
        Ok(())
    }

    fn set_foreground(&self, pixel: u32) -> Result<()> {
        self.conn
            .change_gc(self.gc, &ChangeGCAux::new().foreground(pixel))?;
        Ok(())
    }

    fn grab(&self, kind: ResourceKind) -> Result<bool> {
        let status = match kind {
            ResourceKind::Pointer => {
                self.conn
                    .grab_pointer(
                        false,
                        self.window,
                        EventMask::BUTTON_PRESS
                            | EventMask::BUTTON_RELEASE
                            | EventMask::POINTER_MOTION,
                        GrabMode::ASYNC,
                        GrabMode::ASYNC,
                        x11rb::NONE,
                        self.cursor,
                        x11rb::CURRENT_TIME,
                    )?
                    .reply()?
                    .status
            }
            ResourceKind::Keyboard => {
                self.conn
                    .grab_keyboard(
                        true,
                        self.window,
                        x11rb::CURRENT_TIME,
                        GrabMode::ASYNC,
                        GrabMode::ASYNC,
                    )?
                    .reply()?
                    .status
            }
        };
        Ok(status == GrabStatus::SUCCESS)
    }

    fn translate(&self, event: &Event) -> InputEvent {
        match event {
            Event::KeyPress(press) => {
                InputEvent::Key(self.keymap.translate(press.detail, press.state))
            }
            Event::MotionNotify(_) => InputEvent::PointerMotion,
            _ => InputEvent::Other,
        }
    }

    fn teardown(&self) -> Result<()> {
        self.conn.ungrab_pointer(x11rb::CURRENT_TIME)?;
        self.conn.ungrab_keyboard(x11rb::CURRENT_TIME)?;
        self.conn.free_gc(self.gc)?;
        self.conn.close_font(self.font)?;
        self.conn.free_cursor(self.cursor)?;
        self.conn.free_pixmap(self.cursor_pixmap)?;
        self.conn.destroy_window(self.window)?;
        self.conn.flush()?;
        Ok(())
    }
}

/// Creates a cursor from an all-zero 1-bit pixmap
fn invisible_cursor(conn: &RustConnection, window: Window) -> Result<(Cursor, Pixmap)> {
    let pixmap = conn.generate_id()?;
    conn.create_pixmap(1, pixmap, window, CURSOR_SIZE, CURSOR_SIZE)?;

    let gc = conn.generate_id()?;
    conn.create_gc(gc, pixmap, &CreateGCAux::new().foreground(0))?;
    conn.poly_fill_rectangle(
        pixmap,
        gc,
        &[Rectangle {
            x: 0,
            y: 0,
            width: CURSOR_SIZE,
            height: CURSOR_SIZE,
        }],
    )?;
    conn.free_gc(gc)?;

    let cursor = conn.generate_id()?;
    conn.create_cursor(cursor, pixmap, pixmap, 0, 0, 0, 0, 0, 0, 0, 0)?;
    Ok((cursor, pixmap))
}

impl EventSource for X11Display {
    fn next_event(&mut self) -> sxlock_core::Result<InputEvent> {
        let event = match self.pending.pop_front() {
            Some(event) => event,
            None => self.conn.wait_for_event().map_err(X11Error::from)?,
        };
        Ok(self.translate(&event))
    }

    fn has_pending(&mut self) -> sxlock_core::Result<bool> {
        if !self.pending.is_empty() {
            return Ok(true);
        }
        match self.conn.poll_for_event().map_err(X11Error::from)? {
            Some(event) => {
                self.pending.push_back(event);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Renderer for X11Display {
    fn render(&mut self, frame: &Frame<'_>) -> sxlock_core::Result<()> {
        Ok(self.draw(frame)?)
    }
}

impl GrabTarget for X11Display {
    fn try_grab(&mut self, kind: ResourceKind) -> sxlock_core::Result<bool> {
        Ok(self.grab(kind)?)
    }
}

impl PowerControl for X11Display {
    fn power_capable(&mut self) -> sxlock_core::Result<bool> {
        let present = self
            .conn
            .extension_information(dpms::X11_EXTENSION_NAME)
            .map_err(X11Error::from)?
            .is_some();
        if !present {
            return Ok(false);
        }
        let capable = self
            .conn
            .dpms_capable()
            .map_err(X11Error::from)?
            .reply()
            .map_err(X11Error::from)?
            .capable;
        Ok(capable)
    }

    fn power_timings(&mut self) -> sxlock_core::Result<PowerTimings> {
        let reply = self
            .conn
            .dpms_get_timeouts()
            .map_err(X11Error::from)?
            .reply()
            .map_err(X11Error::from)?;
        Ok(PowerTimings {
            standby: reply.standby_timeout,
            suspend: reply.suspend_timeout,
            off: reply.off_timeout,
        })
    }

    fn power_state(&mut self) -> sxlock_core::Result<(u16, bool)> {
        let reply = self
            .conn
            .dpms_info()
            .map_err(X11Error::from)?
            .reply()
            .map_err(X11Error::from)?;
        Ok((u16::from(reply.power_level), reply.state))
    }

    fn set_power_timings(&mut self, timings: PowerTimings) -> sxlock_core::Result<()> {
        self.conn
            .dpms_set_timeouts(timings.standby, timings.suspend, timings.off)
            .map_err(X11Error::from)?;
        self.conn.flush().map_err(X11Error::from)?;
        Ok(())
    }

    fn set_power_enabled(&mut self, enabled: bool) -> sxlock_core::Result<()> {
        if enabled {
            self.conn.dpms_enable().map_err(X11Error::from)?;
        } else {
            self.conn.dpms_disable().map_err(X11Error::from)?;
        }
        self.conn.flush().map_err(X11Error::from)?;
        Ok(())
    }

    fn force_power_off(&mut self) -> sxlock_core::Result<()> {
        self.conn
            .dpms_force_level(dpms::DPMSMode::OFF)
            .map_err(X11Error::from)?;
        self.conn.flush().map_err(X11Error::from)?;
        debug!("display forced off");
        Ok(())
    }
}

impl LockDisplay for X11Display {
    fn emergency_restore(
        &mut self,
        snapshot: &PowerSnapshot,
    ) -> sxlock_core::Result<Box<dyn EmergencyRestore>> {
        Ok(Box::new(DpmsRescue::connect(snapshot)?))
    }

    fn release(&mut self) -> sxlock_core::Result<()> {
        self.teardown()?;
        info!("lock surface released");
        Ok(())
    }
}

impl std::fmt::Debug for X11Display {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X11Display")
            .field("window", &self.window)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}
