use super::{
    control_plane_init_data, control_plane_join_data, worker_join_data, ControlPlaneInitInput,
    ControlPlaneJoinInput, WorkerJoinInput,
};
use crate::error::Result;
use crate::provisioner::{Format, Provisioner};

/// Generates cloud-init data.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloudInitProvisioner;

impl CloudInitProvisioner {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Provisioner for CloudInitProvisioner {
    type ControlPlaneInit = ControlPlaneInitInput;
    type ControlPlaneJoin = ControlPlaneJoinInput;
    type WorkerJoin = WorkerJoinInput;

    fn format(&self) -> Format {
        Format::CloudConfig
    }

    fn control_plane_init_data(&self, input: ControlPlaneInitInput) -> Result<Vec<u8>> {
        control_plane_init_data(input)
    }

    fn control_plane_join_data(&self, input: ControlPlaneJoinInput) -> Result<Vec<u8>> {
        control_plane_join_data(input)
    }

    fn worker_join_data(&self, input: WorkerJoinInput) -> Result<Vec<u8>> {
        worker_join_data(input)
    }
}
