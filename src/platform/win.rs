use anyhow::{Result, anyhow};
use tracing::error;
use windows::Win32::{
    Foundation::POINT,
    System::Power::{
        ES_CONTINUOUS, ES_DISPLAY_REQUIRED, ES_SYSTEM_REQUIRED, EXECUTION_STATE,
        SetThreadExecutionState,
    },
    UI::WindowsAndMessaging::{GetCursorPos, SetCursorPos},
};

use super::{ActivityDriver, AwakeRequest, PointerPosition};

fn execution_flags(request: AwakeRequest) -> EXECUTION_STATE {
    let mut flags = EXECUTION_STATE(0);
    if request.continuous {
        flags |= ES_CONTINUOUS;
    }
    if request.display_required {
        flags |= ES_DISPLAY_REQUIRED;
    }
    if request.system_required {
        flags |= ES_SYSTEM_REQUIRED;
    }
    flags
}

fn set_execution_state(flags: EXECUTION_STATE) -> Result<()> {
    // A zero return means the request was rejected; the previous state is
    // returned otherwise.
    let previous = unsafe { SetThreadExecutionState(flags) };
    if previous == EXECUTION_STATE(0) {
        error!("SetThreadExecutionState rejected flags {:#x}", flags.0);
        return Err(anyhow!("Failed to set thread execution state"));
    }
    Ok(())
}

pub struct WindowsActivityDriver {}

impl WindowsActivityDriver {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for WindowsActivityDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityDriver for WindowsActivityDriver {
    fn assert_awake(&mut self, request: AwakeRequest) -> Result<()> {
        set_execution_state(execution_flags(request))
            .inspect_err(|e| error!("Failed to assert stay-awake state {e:?}"))
    }

    fn reset_awake(&mut self) -> Result<()> {
        // ES_CONTINUOUS alone clears previously asserted requirements.
        set_execution_state(ES_CONTINUOUS)
            .inspect_err(|e| error!("Failed to reset stay-awake state {e:?}"))
    }

    fn pointer_position(&mut self) -> Result<PointerPosition> {
        let mut point = POINT::default();
        unsafe { GetCursorPos(&mut point) }
            .inspect_err(|e| error!("Failed to read cursor position {e:?}"))?;
        Ok(PointerPosition {
            x: point.x,
            y: point.y,
        })
    }

    fn set_pointer_position(&mut self, position: PointerPosition) -> Result<()> {
        unsafe { SetCursorPos(position.x, position.y) }
            .inspect_err(|e| error!("Failed to move cursor {e:?}"))?;
        Ok(())
    }
}
