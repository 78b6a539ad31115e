use tracing::info;

use crate::internals::core::ports::LocationSource;

use super::{
    axis::{AxisController, AxisError},
    gate::AlternationGate,
};

/// How one axis should be driven by the rig.
pub struct AxisRun<S> {
    pub forward: bool,
    pub source: S,
}

/// The pan and tilt axes of one rig, started, stopped and joined together
/// so an alternating pair can never be left with one side waiting on a
/// peer that is gone.
pub struct PanTiltRig {
    pan: AxisController,
    tilt: AxisController,
}

impl PanTiltRig {
    /// Both axes must agree on alternation.
    pub fn new(pan: AxisController, tilt: AxisController) -> Result<Self, AxisError> {
        if pan.is_alternating() != tilt.is_alternating() {
            let odd_one = if pan.is_alternating() { &tilt } else { &pan };
            return Err(AxisError::MismatchedAlternation(odd_one.name().to_string()));
        }
        Ok(Self { pan, tilt })
    }

    pub fn pan(&self) -> &AxisController {
        &self.pan
    }

    pub fn tilt(&self) -> &AxisController {
        &self.tilt
    }

    pub fn is_alternating(&self) -> bool {
        self.pan.is_alternating()
    }

    /// Start both axes on their own threads. When alternating, pan gets the
    /// first turn.
    pub fn start<P, T>(&self, pan: AxisRun<P>, tilt: AxisRun<T>) -> Result<(), AxisError>
    where
        P: LocationSource + 'static,
        T: LocationSource + 'static,
    {
        let (pan_peer, tilt_peer) = if self.is_alternating() {
            let (pan_peer, tilt_peer) = AlternationGate::link(&self.pan, &self.tilt);
            (Some(pan_peer), Some(tilt_peer))
        } else {
            (None, None)
        };

        self.pan.start(pan.forward, pan.source, pan_peer)?;
        if let Err(e) = self.tilt.start(tilt.forward, tilt.source, tilt_peer) {
            self.pan.stop();
            return Err(e);
        }

        if self.is_alternating() {
            info!("Giving the first turn to '{}'.", self.pan.name());
            self.pan.gate().release();
        }
        Ok(())
    }

    pub fn stop(&self) {
        self.pan.stop();
        self.tilt.stop();
    }

    /// Join both axis threads, reporting the first failure.
    pub fn join(&self) -> Result<(), AxisError> {
        let pan = self.pan.join();
        let tilt = self.tilt.join();
        pan.and(tilt)
    }
}
