use std::fmt::Display;

/// The stages of the pipeline, in the order they have to be run.
///
/// Each stage has a distinct result code, reported in its summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    BuildEvents,
    RawHistograms,
    Calibrate,
    View,
}

impl Stage {
    pub fn code(&self) -> i32 {
        match self {
            Self::BuildEvents => 1,
            Self::RawHistograms => 2,
            Self::Calibrate => 3,
            Self::View => 4,
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BuildEvents => write!(f, "Building events"),
            Self::RawHistograms => write!(f, "Filling raw histograms"),
            Self::Calibrate => write!(f, "Calibrating"),
            Self::View => write!(f, "Viewing"),
        }
    }
}

/// Progress message sent from the processing thread to the UI
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub stage: Stage,
}

impl WorkerStatus {
    pub fn new(progress: f32, stage: Stage) -> Self {
        Self { progress, stage }
    }
}
