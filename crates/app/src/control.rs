//! Control handle — the only mutations the presentation port may request.
//!
//! Commands travel over a bounded channel and are applied by the orchestrator
//! at the start of its next tick, so every device mutation happens on the
//! control loop task.

use tokio::sync::{mpsc, oneshot};

use dusthub_domain::error::DustHubError;
use dusthub_domain::id::{GateId, SourceId};

pub type Reply = oneshot::Sender<Result<(), DustHubError>>;

#[derive(Debug)]
pub enum ControlCommand {
    /// Forget a sensor's calibration.
    ResetSensor { id: SourceId, reply: Reply },
    /// Sweep a gate so it can be located.
    IdentifyGate { id: GateId, reply: Reply },
}

#[derive(Clone, Debug)]
pub struct ControlHandle {
    sender: mpsc::Sender<ControlCommand>,
}

impl ControlHandle {
    /// Create a handle and the receiver the orchestrator drains.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ControlCommand>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    /// # Errors
    ///
    /// Returns [`DustHubError::NotFound`] for an unknown sensor, or
    /// [`DustHubError::Unavailable`] once the control loop has stopped.
    pub async fn reset_sensor(&self, id: SourceId) -> Result<(), DustHubError> {
        self.request(|reply| ControlCommand::ResetSensor { id, reply })
            .await
    }

    /// # Errors
    ///
    /// Returns [`DustHubError::NotFound`] for an unknown gate, or
    /// [`DustHubError::Unavailable`] once the control loop has stopped.
    pub async fn identify_gate(&self, id: GateId) -> Result<(), DustHubError> {
        self.request(|reply| ControlCommand::IdentifyGate { id, reply })
            .await
    }

    async fn request(
        &self,
        command: impl FnOnce(Reply) -> ControlCommand,
    ) -> Result<(), DustHubError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(command(reply))
            .await
            .map_err(|_| DustHubError::Unavailable)?;
        response.await.map_err(|_| DustHubError::Unavailable)?
    }
}
