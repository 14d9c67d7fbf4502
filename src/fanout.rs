use std::future::Future;

use adk_rust::futures::future::join_all;
use anyhow::Result;

/// Outcome of a fan-out, split by branch result. Both lists keep the order the
/// branches were given in.
#[derive(Debug)]
pub struct FanOut<T> {
    pub succeeded: Vec<(String, T)>,
    pub failed: Vec<(String, anyhow::Error)>,
}

impl<T> FanOut<T> {
    pub fn all_failed(&self) -> bool {
        self.succeeded.is_empty() && !self.failed.is_empty()
    }
}

/// Polls every labelled branch concurrently and waits for all of them. A
/// failed branch is logged and set aside; it never cancels its siblings.
pub async fn fan_out<T, F>(branches: Vec<(String, F)>) -> FanOut<T>
where
    F: Future<Output = Result<T>>,
{
    let (labels, futures): (Vec<String>, Vec<F>) = branches.into_iter().unzip();
    let results = join_all(futures).await;

    let mut outcome = FanOut {
        succeeded: Vec::new(),
        failed: Vec::new(),
    };
    for (label, result) in labels.into_iter().zip(results) {
        match result {
            Ok(value) => outcome.succeeded.push((label, value)),
            Err(err) => {
                tracing::warn!(branch = %label, error = %format!("{err:#}"), "fan-out branch failed");
                outcome.failed.push((label, err));
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn failing_branch_does_not_cancel_siblings() {
        let finished = Arc::new(AtomicUsize::new(0));
        let branch = |label: &str, delay_ms: u64, fail: bool| {
            let finished = finished.clone();
            let label = label.to_string();
            let future = async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                if fail {
                    anyhow::bail!("branch blew up");
                }
                Ok(delay_ms)
            };
            (label, future)
        };

        let outcome = fan_out(vec![
            branch("traffic", 20, false),
            branch("energy", 1, true),
            branch("events", 10, false),
        ])
        .await;

        assert_eq!(finished.load(Ordering::SeqCst), 3);
        assert_eq!(
            outcome
                .succeeded
                .iter()
                .map(|(label, _)| label.as_str())
                .collect::<Vec<_>>(),
            vec!["traffic", "events"]
        );
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, "energy");
        assert!(!outcome.all_failed());
    }

    #[tokio::test]
    async fn empty_fan_out_is_not_a_failure() {
        let outcome = fan_out(Vec::<(String, std::future::Ready<Result<()>>)>::new()).await;
        assert!(outcome.succeeded.is_empty());
        assert!(!outcome.all_failed());
    }
}
