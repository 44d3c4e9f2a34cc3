//! Queue error to HTTP error conversion.

use super::http_error::{Error as HttpError, ErrorKind};
use crate::TRACING_TARGET_HANDLER;

impl From<relay_queue::Error> for HttpError<'static> {
    fn from(error: relay_queue::Error) -> Self {
        match error {
            relay_queue::Error::Dispatch(error) => error.into(),

            relay_queue::Error::QueueClosed { queue } => ErrorKind::ServiceUnavailable
                .with_message("Job queue is closed")
                .with_resource(queue),

            other => {
                tracing::error!(
                    target: TRACING_TARGET_HANDLER,
                    error = %other,
                    "Failed to submit forward job"
                );
                ErrorKind::InternalServerError.with_message("Failed to enqueue the request")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use relay_queue::Error;

    use super::*;

    #[test]
    fn queue_closed_is_503() {
        let error = HttpError::from(Error::queue_closed("webhooks"));

        assert_eq!(error.kind(), ErrorKind::ServiceUnavailable);
        assert_eq!(error.resource(), Some("webhooks"));
    }

    #[test]
    fn dispatch_errors_keep_their_mapping() {
        let error = HttpError::from(Error::Dispatch(relay_webhook::Error::group_not_found(
            "ghost",
        )));

        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn operation_errors_are_500() {
        let error = HttpError::from(Error::operation("job_publish", "no responders"));

        assert_eq!(error.kind(), ErrorKind::InternalServerError);
    }
}
