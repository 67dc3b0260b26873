use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaceOutcome<T> {
    Success(T),
    Timeout,
    Error(String),
}

/// Run `future` on its own task and wait at most `duration` for it.
///
/// A future that loses the race keeps running detached; whatever it
/// eventually resolves to is dropped, errors included.
pub async fn race_with_timeout<F, T, E>(future: F, duration: Duration) -> RaceOutcome<T>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
{
    let handle = tokio::spawn(future);

    match tokio::time::timeout(duration, handle).await {
        Ok(Ok(Ok(value))) => RaceOutcome::Success(value),
        Ok(Ok(Err(err))) => RaceOutcome::Error(err.to_string()),
        Ok(Err(join_err)) => RaceOutcome::Error(format!("task aborted: {join_err}")),
        Err(_) => {
            debug!(target: "app::bootstrap", timeout_ms = duration.as_millis() as u64, "race lost to timer");
            RaceOutcome::Timeout
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_before_deadline() {
        let outcome = race_with_timeout(async { Ok::<_, String>(7) }, Duration::from_millis(200)).await;
        assert_eq!(outcome, RaceOutcome::Success(7));
    }

    #[tokio::test]
    async fn error_is_reported_as_text() {
        let outcome =
            race_with_timeout(async { Err::<(), _>("boom".to_string()) }, Duration::from_millis(200))
                .await;
        assert_eq!(outcome, RaceOutcome::Error("boom".to_string()));
    }

    #[tokio::test]
    async fn stalled_future_times_out() {
        let outcome = race_with_timeout(
            futures::future::pending::<Result<(), String>>(),
            Duration::from_millis(20),
        )
        .await;
        assert_eq!(outcome, RaceOutcome::Timeout);
    }

    #[tokio::test]
    async fn late_failure_after_timeout_is_ignored() {
        let outcome = race_with_timeout(
            async {
                tokio::time::sleep(Duration::from_millis(40)).await;
                Err::<(), _>("late".to_string())
            },
            Duration::from_millis(5),
        )
        .await;
        assert_eq!(outcome, RaceOutcome::Timeout);
        tokio::time::sleep(Duration::from_millis(60)).await;
    }
}
