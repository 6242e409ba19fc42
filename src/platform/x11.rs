use anyhow::{Result, anyhow};
use tracing::instrument;
use xcb::{Connection, Xid, screensaver, x};

use super::{ActivityDriver, AwakeRequest, PointerPosition};

pub struct X11ActivityDriver {
    connection: Connection,
    preferred_screen: i32,
}

impl X11ActivityDriver {
    pub fn new() -> Result<Self> {
        let (connection, preferred_screen) = Connection::connect(None)?;
        Ok(Self {
            connection,
            preferred_screen,
        })
    }

    fn root(&self) -> Result<x::Window> {
        let setup = self.connection.get_setup();
        setup
            .roots()
            .nth(self.preferred_screen.max(0) as usize)
            .map(|screen| screen.root())
            .ok_or_else(|| anyhow!("No x11 screen with index {}", self.preferred_screen))
    }

    fn suspend_screensaver(&self, suspend: bool) -> Result<()> {
        // MIT-SCREEN-SAVER treats any nonzero value as "inhibit".
        self.connection
            .send_and_check_request(&screensaver::Suspend {
                suspend: suspend as u32,
            })?;
        Ok(())
    }
}

impl ActivityDriver for X11ActivityDriver {
    #[instrument(skip(self))]
    fn assert_awake(&mut self, _request: AwakeRequest) -> Result<()> {
        // X11 has no display/system split, the screensaver suspension covers
        // both. The suspension stays in effect until reset.
        self.suspend_screensaver(true)
    }

    #[instrument(skip(self))]
    fn reset_awake(&mut self) -> Result<()> {
        self.suspend_screensaver(false)
    }

    #[instrument(skip(self))]
    fn pointer_position(&mut self) -> Result<PointerPosition> {
        let root = self.root()?;
        let reply = self
            .connection
            .wait_for_reply(self.connection.send_request(&x::QueryPointer { window: root }))?;
        Ok(PointerPosition {
            x: reply.root_x() as i32,
            y: reply.root_y() as i32,
        })
    }

    #[instrument(skip(self))]
    fn set_pointer_position(&mut self, position: PointerPosition) -> Result<()> {
        let root = self.root()?;
        self.connection.send_and_check_request(&x::WarpPointer {
            src_window: x::Window::none(),
            dst_window: root,
            src_x: 0,
            src_y: 0,
            src_width: 0,
            src_height: 0,
            dst_x: position.x as i16,
            dst_y: position.y as i16,
        })?;
        Ok(())
    }
}
