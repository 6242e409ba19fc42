//! Contains the platform calls used to keep the machine awake on different
//! environments. [GenericActivityDriver] is the main artifact of this module
//! that abstracts the operations.

#[cfg(feature = "win")]
pub mod win;
#[cfg(feature = "x11")]
pub mod x11;

#[cfg(feature = "win")]
extern crate windows;

#[cfg(feature = "x11")]
extern crate xcb;

use anyhow::Result;

/// Screen-space pointer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerPosition {
    pub x: i32,
    pub y: i32,
}

/// Flags for a stay-awake assertion. `continuous` keeps the assertion in
/// effect until [ActivityDriver::reset_awake] is called.
#[derive(Debug, Clone, Copy)]
pub struct AwakeRequest {
    pub continuous: bool,
    pub display_required: bool,
    pub system_required: bool,
}

impl AwakeRequest {
    /// The full request issued on every active tick: keep the system and
    /// display awake until explicitly reset.
    pub fn keep_awake() -> Self {
        Self {
            continuous: true,
            display_required: true,
            system_required: true,
        }
    }
}

/// Intended to serve as a contract windows and linux systems must implement.
#[cfg_attr(test, mockall::automock)]
pub trait ActivityDriver: Send {
    /// Asserts system activity. Idempotent, safe to re-issue every tick.
    fn assert_awake(&mut self, request: AwakeRequest) -> Result<()>;

    /// Clears any previously asserted continuous stay-awake state.
    fn reset_awake(&mut self) -> Result<()>;

    fn pointer_position(&mut self) -> Result<PointerPosition>;

    fn set_pointer_position(&mut self, position: PointerPosition) -> Result<()>;
}

/// Serves as a cross-compatible ActivityDriver implementation.
pub struct GenericActivityDriver {
    inner: Box<dyn ActivityDriver>,
}

impl GenericActivityDriver {
    pub fn new() -> Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "win")] {
                use win::WindowsActivityDriver;
                Ok(Self {
                    inner: Box::new(WindowsActivityDriver::new()),
                })
            }
            else if #[cfg(feature = "x11")] {
                use x11::X11ActivityDriver;
                Ok(Self {
                    inner: Box::new(X11ActivityDriver::new()?),
                })
            }
            else {
                // This runtime error is needed to allow the project to be compiled for during testing.
                unimplemented!("No activity driver was specified")
            }
        }
    }
}

impl ActivityDriver for GenericActivityDriver {
    fn assert_awake(&mut self, request: AwakeRequest) -> Result<()> {
        self.inner.assert_awake(request)
    }

    fn reset_awake(&mut self) -> Result<()> {
        self.inner.reset_awake()
    }

    fn pointer_position(&mut self) -> Result<PointerPosition> {
        self.inner.pointer_position()
    }

    fn set_pointer_position(&mut self, position: PointerPosition) -> Result<()> {
        self.inner.set_pointer_position(position)
    }
}
