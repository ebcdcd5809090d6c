//! Output selection
//!
//! The prompt is centred on one monitor: the RandR primary output when it is
//! connected and driven by a CRTC, otherwise the first connected output that
//! is.

use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::protocol::randr::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{Screen, Window};

use crate::error::{Result, X11Error};

/// Position and size of one output in root window coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputGeometry {
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
}

impl OutputGeometry {
    /// The whole screen
    pub fn of_screen(screen: &Screen) -> Self {
        Self {
            x: 0,
            y: 0,
            width: screen.width_in_pixels,
            height: screen.height_in_pixels,
        }
    }
}

/// One output as reported by RandR
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputCandidate {
    pub name: String,
    pub connected: bool,
    /// Geometry of the driving CRTC, `None` when the output is not active
    pub geometry: Option<OutputGeometry>,
}

impl OutputCandidate {
    fn usable(&self) -> Option<OutputGeometry> {
        if self.connected {
            self.geometry
        } else {
            None
        }
    }
}

/// Picks the output the prompt is drawn on
pub fn select_output(
    primary: Option<usize>,
    candidates: &[OutputCandidate],
) -> Result<OutputGeometry> {
    if let Some(geometry) = primary
        .and_then(|index| candidates.get(index))
        .and_then(OutputCandidate::usable)
    {
        return Ok(geometry);
    }

    for candidate in candidates {
        if let Some(geometry) = candidate.usable() {
            warn!(output = %candidate.name, "no primary output detected, trying {}", candidate.name);
            return Ok(geometry);
        }
    }

    Err(X11Error::NoOutput)
}

/// Queries RandR and selects an output, falling back to the whole screen when
/// the extension is missing
pub fn query_output<C: Connection>(conn: &C, screen: &Screen) -> Result<OutputGeometry> {
    if conn
        .extension_information(randr::X11_EXTENSION_NAME)?
        .is_none()
    {
        warn!("RandR not available, centring on the whole screen");
        return Ok(OutputGeometry::of_screen(screen));
    }

    let (primary, candidates) = query_candidates(conn, screen.root)?;
    let geometry = select_output(primary, &candidates)?;
    debug!(?geometry, "output selected");
    Ok(geometry)
}

fn query_candidates<C: Connection>(
    conn: &C,
    root: Window,
) -> Result<(Option<usize>, Vec<OutputCandidate>)> {
    let resources = conn.randr_get_screen_resources(root)?.reply()?;
    let primary = conn.randr_get_output_primary(root)?.reply()?.output;

    let mut primary_index = None;
    let mut candidates = Vec::with_capacity(resources.outputs.len());
    for (index, &output) in resources.outputs.iter().enumerate() {
        if output == primary {
            primary_index = Some(index);
        }

        let info = conn
            .randr_get_output_info(output, resources.config_timestamp)?
            .reply()?;
        let connected = info.connection == randr::Connection::CONNECTED;
        let geometry = if connected && info.crtc != x11rb::NONE {
            let crtc = conn
                .randr_get_crtc_info(info.crtc, resources.config_timestamp)?
                .reply()?;
            Some(OutputGeometry {
                x: crtc.x,
                y: crtc.y,
                width: crtc.width,
                height: crtc.height,
            })
        } else {
            None
        };

        candidates.push(OutputCandidate {
            name: String::from_utf8_lossy(&info.name).into_owned(),
            connected,
            geometry,
        });
    }

    Ok((primary_index, candidates))
}
