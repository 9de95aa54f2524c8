//! Events driving the front-end loop

/// Front-end events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// A line typed by the user
    Input(String),
    /// Standard input reached end of file
    InputClosed,
    /// Periodic check of the rate-limit cooldown
    CooldownTick,
    /// Periodic poll of the tracked upload job
    UploadPollTick,
}
