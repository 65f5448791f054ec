use super::{
    control_plane_init_data, control_plane_join_data, worker_join_data, ControlPlaneInitInput,
    ControlPlaneJoinInput, IgnitionTranspiler, Transpiler, WorkerJoinInput,
};
use crate::error::Result;
use crate::provisioner::{Format, Provisioner};

/// Generates Ignition data through a [`Transpiler`].
#[derive(Debug, Clone, Default)]
pub struct IgnitionProvisioner<T = IgnitionTranspiler> {
    transpiler: T,
}

impl IgnitionProvisioner {
    /// Provisioner backed by the built-in transpiler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Transpiler> IgnitionProvisioner<T> {
    #[must_use]
    pub fn with_transpiler(transpiler: T) -> Self {
        Self { transpiler }
    }
}

impl<T: Transpiler> Provisioner for IgnitionProvisioner<T> {
    type ControlPlaneInit = ControlPlaneInitInput;
    type ControlPlaneJoin = ControlPlaneJoinInput;
    type WorkerJoin = WorkerJoinInput;

    fn format(&self) -> Format {
        Format::Ignition
    }

    fn control_plane_init_data(&self, input: ControlPlaneInitInput) -> Result<Vec<u8>> {
        Ok(control_plane_init_data(Some(input), &self.transpiler)?.data)
    }

    fn control_plane_join_data(&self, input: ControlPlaneJoinInput) -> Result<Vec<u8>> {
        Ok(control_plane_join_data(Some(input), &self.transpiler)?.data)
    }

    fn worker_join_data(&self, input: WorkerJoinInput) -> Result<Vec<u8>> {
        Ok(worker_join_data(Some(input), &self.transpiler)?.data)
    }
}
