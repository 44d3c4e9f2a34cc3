//! Dispatch error to HTTP error conversion.

use super::http_error::{Error as HttpError, ErrorKind};
use crate::TRACING_TARGET_HANDLER;

/// Resource name reported for group errors.
const WEBHOOK_GROUP: &str = "webhook_group";

impl From<relay_webhook::Error> for HttpError<'static> {
    fn from(error: relay_webhook::Error) -> Self {
        let message = error.to_string();

        match error {
            relay_webhook::Error::GroupNotFound { group } => ErrorKind::NotFound
                .with_message(message)
                .with_resource(WEBHOOK_GROUP)
                .with_context(group),

            relay_webhook::Error::InvalidGroupShape { group }
            | relay_webhook::Error::EmptyTargetList { group } => ErrorKind::UnprocessableEntity
                .with_message(message)
                .with_resource(WEBHOOK_GROUP)
                .with_context(group),

            // Target-level errors never leave the dispatcher.
            other => {
                tracing::error!(
                    target: TRACING_TARGET_HANDLER,
                    kind = %other.kind(),
                    error = %other,
                    "Unexpected dispatch error"
                );
                ErrorKind::InternalServerError.into_error()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use relay_webhook::Error;

    use super::*;

    #[test]
    fn group_not_found_is_404() {
        let error = HttpError::from(Error::group_not_found("ghost"));

        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert_eq!(error.resource(), Some("webhook_group"));
        assert_eq!(error.context(), Some("ghost"));
        assert_eq!(error.message(), Some("Webhook group 'ghost' is not defined"));
    }

    #[test]
    fn misconfigured_groups_are_422() {
        let shape = HttpError::from(Error::invalid_group_shape("ops"));
        let empty = HttpError::from(Error::empty_target_list("ops"));

        assert_eq!(shape.kind(), ErrorKind::UnprocessableEntity);
        assert_eq!(empty.kind(), ErrorKind::UnprocessableEntity);
    }

    #[test]
    fn target_errors_are_500() {
        let error = HttpError::from(Error::invalid_target("bad url"));

        assert_eq!(error.kind(), ErrorKind::InternalServerError);
        assert_eq!(error.message(), None);
    }
}
