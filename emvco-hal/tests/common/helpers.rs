// helpers.rs: engine rigs wired to the scripted controller

use std::sync::Arc;
use std::time::Duration;

use emvco_hal::prelude::*;
use emvco_hal::test_support::{
    RecordingCallbacks, RecordingSubsystem, SimConfig, SimController, SimLog,
};

pub const WAIT: Duration = Duration::from_millis(2000);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Short timeouts so failure paths finish quickly.
pub fn fast_config() -> HalConfig {
    HalConfig {
        read_poll_ms: 10,
        window_timeout_ms: 1000,
        response_timeout_ms: 300,
        notification_timeout_ms: 300,
        transceive_timeout_ms: 1000,
        power_cycle_delay_ms: 1,
        write_retry_delay_ms: 1,
        ..HalConfig::default()
    }
}

pub struct Rig {
    pub engine: Engine,
    pub link: Arc<MockLink>,
    pub sim: SimLog,
    pub callbacks: Arc<RecordingCallbacks>,
    pub subsystem: Arc<RecordingSubsystem>,
}

impl Rig {
    /// Open the channel with the recording callbacks.
    pub fn open(&self) -> Result<()> {
        self.engine.open(self.callbacks.clone())
    }
}

pub fn rig_with(config: HalConfig, sim: SimConfig) -> anyhow::Result<Rig> {
    init_logging();
    let link = Arc::new(MockLink::new());
    let sim = SimController::new(sim).install(&link);
    let subsystem = RecordingSubsystem::new(link.clone());
    let engine = Engine::new(config, link.clone(), subsystem.clone())?;
    let callbacks = RecordingCallbacks::new();
    engine.set_callbacks(callbacks.clone());
    Ok(Rig {
        engine,
        link,
        sim,
        callbacks,
        subsystem,
    })
}

pub fn rig(sim: SimConfig) -> anyhow::Result<Rig> {
    rig_with(fast_config(), sim)
}

/// Rig with the channel already open.
pub fn opened(sim: SimConfig) -> anyhow::Result<Rig> {
    let r = rig(sim)?;
    r.open()?;
    Ok(r)
}
