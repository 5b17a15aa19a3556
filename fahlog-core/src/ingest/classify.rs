//! Line classification
//!
//! Assigns a [`LineKind`] to a raw line using an ordered table of
//! substring rules. The first matching rule wins, so more specific phrases
//! must come before more general ones. Several client dialects map to the
//! same kind here; payload extraction resolves the differences.

use crate::types::LineKind;

/// How a rule inspects a line.
#[derive(Debug, Clone, Copy)]
pub enum Matcher {
    Contains(&'static str),
    StartsWith(&'static str),
}

impl Matcher {
    fn matches(&self, line: &str) -> bool {
        match self {
            Matcher::Contains(needle) => line.contains(needle),
            Matcher::StartsWith(prefix) => line.starts_with(prefix),
        }
    }
}

/// A single classification rule.
#[derive(Debug, Clone, Copy)]
pub struct LineRule {
    pub matcher: Matcher,
    pub kind: LineKind,
}

const fn contains(needle: &'static str, kind: LineKind) -> LineRule {
    LineRule {
        matcher: Matcher::Contains(needle),
        kind,
    }
}

/// Ordered classification table.
pub static LINE_RULES: &[LineRule] = &[
    LineRule {
        matcher: Matcher::StartsWith("--- Opening Log file"),
        kind: LineKind::LogOpen,
    },
    contains(
        "###############################################################################",
        LineKind::LogHeader,
    ),
    contains("Folding@Home Client Version", LineKind::ClientVersion),
    contains("] - Autosending finished units", LineKind::ClientAutosendStart),
    contains("] - Autosend completed", LineKind::ClientAutosendComplete),
    contains("] + Attempting to send results", LineKind::ClientSendStart),
    contains("] + Results successfully sent", LineKind::ClientSendComplete),
    contains("] - Error: Could not transmit unit", LineKind::ClientSendFailed),
    contains("] + Could not connect to Work Server (results)", LineKind::ClientSendFailed),
    LineRule {
        matcher: Matcher::StartsWith("Arguments:"),
        kind: LineKind::ClientArguments,
    },
    contains("] - User name:", LineKind::ClientUserNameTeam),
    contains("Received User ID =", LineKind::ClientReceivedUserId),
    contains("] - User ID:", LineKind::ClientUserId),
    contains("] - Machine ID:", LineKind::ClientMachineId),
    contains("] + Attempting to get work packet", LineKind::ClientAttemptGetWorkPacket),
    contains("] + Processing work unit", LineKind::WorkUnitProcessing),
    contains("] + Downloading new core", LineKind::WorkUnitCoreDownload),
    contains("] Working on queue slot", LineKind::WorkUnitQueueIndex),
    contains("] + Working ...", LineKind::WorkUnitWorking),
    contains("] *------------------------------*", LineKind::WorkUnitStart),
    // "now running" signals differ by core family
    contains("] Preparing to commence simulation", LineKind::WorkUnitRunning),
    contains("] Starting from initial work packet", LineKind::WorkUnitRunning),
    contains("] Resuming from checkpoint", LineKind::WorkUnitRunning),
    contains("] Entering M.D.", LineKind::WorkUnitRunning),
    contains("] Starting GUI Server", LineKind::WorkUnitRunning),
    contains("] Version ", LineKind::WorkUnitCoreVersion),
    contains("]   Version: ", LineKind::WorkUnitCoreVersion),
    contains("] Protein:", LineKind::WorkUnitProtein),
    contains("] Project:", LineKind::WorkUnitProject),
    contains("] Completed ", LineKind::WorkUnitFrame),
    contains("] + Paused", LineKind::WorkUnitPaused),
    contains("] + Unpaused", LineKind::WorkUnitResumed),
    contains("] + Off battery, restarting core", LineKind::WorkUnitResumed),
    contains("] Folding@home Core Shutdown:", LineKind::WorkUnitCoreShutdown),
    contains("] CoreStatus = ", LineKind::WorkUnitCoreReturn),
    contains("] + Number of Units Completed:", LineKind::ClientNumberOfUnitsCompleted),
    contains(
        "] This is a sign of more serious problems, shutting down.",
        LineKind::ClientCoreCommunicationsErrorShutdown,
    ),
    contains("] EUE limit exceeded. Pausing 24 hours.", LineKind::ClientEuePause),
    contains("Folding@Home will go to sleep for 1 day", LineKind::ClientEuePause),
    contains("Folding@Home Client Shutdown", LineKind::ClientShutdown),
];

/// Classify one raw line against [`LINE_RULES`].
pub fn classify(line: &str) -> LineKind {
    classify_with(LINE_RULES, line)
}

/// Classify one raw line against a caller-supplied rule table.
pub fn classify_with(rules: &[LineRule], line: &str) -> LineKind {
    rules
        .iter()
        .find(|rule| rule.matcher.matches(line))
        .map(|rule| rule.kind)
        .unwrap_or(LineKind::Unknown)
}
