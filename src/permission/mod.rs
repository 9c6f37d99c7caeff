//! Permission module gating microphone use

mod gate;

pub use gate::{
    Access, CaptureConstraints, CaptureDevice, CaptureHandle, DeviceKind, PermissionGate,
    PermissionQuery, PermissionState,
};
