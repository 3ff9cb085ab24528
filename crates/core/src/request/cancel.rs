use std::future::Future;

use tokenflow_domain::{AuthError, Result};
use tokio_util::sync::CancellationToken;

/// Race `operation` against `cancel`.
///
/// The losing future is dropped, which releases whatever it held.
pub(crate) async fn with_cancellation<T, F>(
    cancel: &CancellationToken,
    operation: &'static str,
    future: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(AuthError::cancelled(operation));
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(AuthError::cancelled(operation)),
        result = future => result,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn already_cancelled_short_circuits() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<()> = with_cancellation(&cancel, "token_exchange", async { Ok(()) }).await;
        assert_eq!(result.unwrap_err(), AuthError::cancelled("token_exchange"));
    }

    #[tokio::test]
    async fn cancellation_interrupts_pending_work() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result: Result<()> = with_cancellation(&cancel, "web_ui", async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(AuthError::Cancelled { .. })));
    }
}
