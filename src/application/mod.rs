//! Application layer - the publish and sync workflows.
//!
//! Actions combine the file selector, the archive codec and a remote
//! repository. They classify every failure into a [`PmError`] kind; the CLI
//! layer only decides how to print them.

mod publish;
mod sync;

pub use publish::{PublishAction, PublishResult};
pub use sync::{DependencyOutcome, DependencyReport, SyncAction, SyncReport};

use std::future::Future;
use std::time::Duration;

use crate::error::{PmError, Result};

/// Await a remote call, giving up after `timeout`. Both a failed call and an
/// expired deadline are reported as [`PmError::RemoteUnavailable`].
pub(crate) async fn with_deadline<T, F>(
    timeout: Duration,
    operation: &'static str,
    target: &str,
    call: F,
) -> Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(PmError::remote(operation, target, e)),
        Err(_) => Err(PmError::remote(
            operation,
            target,
            anyhow::anyhow!("no response within {}s", timeout.as_secs_f64()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_deadline_passes_value_through() {
        let value = with_deadline(Duration::from_secs(1), "list", "/packages", async {
            Ok::<_, anyhow::Error>(7)
        })
        .await
        .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_with_deadline_classifies_errors() {
        let err = with_deadline(Duration::from_secs(1), "download", "/a.zip", async {
            Err::<(), _>(anyhow::anyhow!("connection refused"))
        })
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            PmError::RemoteUnavailable {
                operation: "download",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_with_deadline_expires() {
        let err = with_deadline(Duration::from_millis(20), "upload", "/a.zip", async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, anyhow::Error>(())
        })
        .await
        .unwrap_err();

        assert!(matches!(err, PmError::RemoteUnavailable { .. }));
        assert!(format!("{:#}", anyhow::Error::from(err)).contains("no response"));
    }
}
