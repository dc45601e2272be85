// Inbound surface: the operations the CLI (or any other front end) calls.
// Every failure leaves here as a `SchedulingFailure`; details stay in the log.

pub mod people;
pub mod scheduling;

use crate::error::{FailureKind, SchedulingError, SchedulingFailure};

pub use scheduling::{AppointmentSummary, ScheduleSuccess, SchedulingService};

/// Log an error at a level matching its kind and turn it into the public shape.
pub(crate) fn to_failure(context: &str, err: &SchedulingError) -> SchedulingFailure {
    if err.requires_user_action() {
        log::error!("{} needs setup: {} ({})", context, err, err.recovery_suggestion());
        return SchedulingFailure::from(err);
    }
    match err.kind() {
        FailureKind::UpstreamFailure | FailureKind::InternalError => {
            log::error!("{} failed: {}", context, err)
        }
        _ => log::warn!("{} rejected: {}", context, err),
    }
    SchedulingFailure::from(err)
}
