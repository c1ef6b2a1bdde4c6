//! Role bindings and device selection.

use std::collections::HashMap;

use broadcast_config::CameraPosition;
use broadcast_ipc::{DeviceDescriptor, DeviceKind, DevicePosition, DeviceRole, RoleBinding};

use crate::error::BroadcastError;
use crate::BroadcastResult;

/// Tracks which device is bound to each role and which roles have a device
/// operation in flight. Owned by the controller state, so every mutation
/// happens under the controller lock.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    bindings: HashMap<DeviceRole, DeviceDescriptor>,
    /// Role → session generation of the in-flight operation.
    in_flight: HashMap<DeviceRole, u64>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn binding(&self, role: DeviceRole) -> RoleBinding {
        RoleBinding {
            role,
            device: self.bindings.get(&role).cloned(),
        }
    }

    pub fn bound(&self, role: DeviceRole) -> Option<&DeviceDescriptor> {
        self.bindings.get(&role)
    }

    pub(crate) fn bind(&mut self, role: DeviceRole, device: DeviceDescriptor) -> RoleBinding {
        self.bindings.insert(role, device);
        self.binding(role)
    }

    /// Unbind every role and forget in-flight operations.
    pub(crate) fn reset(&mut self) {
        self.bindings.clear();
        self.in_flight.clear();
    }

    /// Claim `role` for a device operation of session `generation`.
    pub(crate) fn begin(&mut self, role: DeviceRole, generation: u64) -> BroadcastResult<()> {
        if self.in_flight.contains_key(&role) {
            return Err(BroadcastError::OperationInProgress(role));
        }
        self.in_flight.insert(role, generation);
        Ok(())
    }

    /// Release the claim taken by `begin`, unless a reset already did.
    pub(crate) fn finish(&mut self, role: DeviceRole, generation: u64) {
        if self.in_flight.get(&role) == Some(&generation) {
            self.in_flight.remove(&role);
        }
    }

    pub fn is_in_flight(&self, role: DeviceRole) -> bool {
        self.in_flight.contains_key(&role)
    }
}

/// Devices a new session starts with: the first camera at the requested
/// position (else the first camera) and the first microphone.
pub fn initial_devices(
    cameras: &[DeviceDescriptor],
    microphones: &[DeviceDescriptor],
    position: Option<CameraPosition>,
) -> Vec<DeviceDescriptor> {
    let wanted = position.map(|position| match position {
        CameraPosition::Front => DevicePosition::Front,
        CameraPosition::Back => DevicePosition::Back,
    });

    let camera = wanted
        .and_then(|wanted| cameras.iter().find(|camera| camera.position == wanted))
        .or_else(|| cameras.first());

    camera
        .into_iter()
        .chain(microphones.first())
        .cloned()
        .collect()
}

/// Index of the device after `current` in a fresh listing, wrapping around.
/// A current device that vanished from the listing counts as index 0.
pub fn next_index(
    devices: &[DeviceDescriptor],
    current: Option<&DeviceDescriptor>,
    kind: DeviceKind,
) -> BroadcastResult<usize> {
    if devices.len() < 2 {
        return Err(BroadcastError::InsufficientDevices {
            kind,
            available: devices.len(),
        });
    }

    let index = current
        .and_then(|current| devices.iter().position(|device| device.id == current.id))
        .unwrap_or(0);

    Ok((index + 1) % devices.len())
}

/// Look a device up by id in a fresh listing.
pub fn find_device<'a>(devices: &'a [DeviceDescriptor], id: &str) -> Option<&'a DeviceDescriptor> {
    devices.iter().find(|device| device.id == id)
}
