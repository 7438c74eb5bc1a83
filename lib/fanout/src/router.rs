//! The fan-out router.

use crate::branch::{Branch, BranchResult};
use std::fmt;
use std::future::Future;

/// Executes one function against N independent branches concurrently.
pub struct FanOutRouter;

impl FanOutRouter {
    /// Runs `run` against every branch concurrently, or against only the
    /// branch named by `target_branch` when one is given.
    ///
    /// Each branch's error is caught individually: a failing branch is
    /// logged at `warn` and omitted from the result list, so one unhealthy
    /// branch never prevents the others from returning. Results carry no
    /// ordering guarantee across branches; callers that need a total order
    /// (e.g. most-recent-first) sort the merged list themselves.
    pub async fn query_all<T, R, E, F, Fut>(
        branches: Vec<Branch<T>>,
        target_branch: Option<&str>,
        run: F,
    ) -> Vec<BranchResult<R>>
    where
        E: fmt::Display,
        F: Fn(Branch<T>) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let selected: Vec<Branch<T>> = match target_branch {
            Some(label) => branches.into_iter().filter(|b| b.label == label).collect(),
            None => branches,
        };

        let tasks = selected.into_iter().map(|branch| {
            let label = branch.label.clone();
            let fut = run(branch);
            async move { (label, fut.await) }
        });

        futures::future::join_all(tasks)
            .await
            .into_iter()
            .filter_map(|(label, outcome)| match outcome {
                Ok(value) => Some(BranchResult {
                    branch: label,
                    value,
                }),
                Err(error) => {
                    tracing::warn!(branch = %label, %error, "fan-out branch failed");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn branches() -> Vec<Branch<u32>> {
        vec![
            Branch::new("one", 1),
            Branch::new("two", 2),
            Branch::new("three", 3),
        ]
    }

    #[tokio::test]
    async fn all_branches_run_concurrently() {
        let results = FanOutRouter::query_all(branches(), None, |branch| async move {
            Ok::<u32, String>(branch.target * 10)
        })
        .await;

        assert_eq!(results.len(), 3);
        let mut values: Vec<u32> = results.iter().map(|r| r.value).collect();
        values.sort_unstable();
        assert_eq!(values, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn failing_branch_is_isolated() {
        let results = FanOutRouter::query_all(branches(), None, |branch| async move {
            if branch.label == "two" {
                Err("simulated outage".to_string())
            } else {
                Ok(branch.target)
            }
        })
        .await;

        // Branch "two" leaves no trace: no partial entry, no error entry.
        assert_eq!(results.len(), 2);
        let labels: Vec<&str> = results.iter().map(|r| r.branch.as_str()).collect();
        assert!(labels.contains(&"one"));
        assert!(labels.contains(&"three"));
        assert!(!labels.contains(&"two"));
    }

    #[tokio::test]
    async fn every_result_is_tagged_with_its_branch() {
        let results = FanOutRouter::query_all(branches(), None, |branch| async move {
            Ok::<u32, String>(branch.target)
        })
        .await;

        for result in &results {
            let expected = match result.branch.as_str() {
                "one" => 1,
                "two" => 2,
                "three" => 3,
                other => panic!("unexpected branch {other}"),
            };
            assert_eq!(result.value, expected);
        }
    }

    #[tokio::test]
    async fn target_branch_runs_alone() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();

        let results = FanOutRouter::query_all(branches(), Some("two"), move |branch| {
            let calls = counted.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, String>(branch.target)
            }
        })
        .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].branch, "two");
        assert_eq!(results[0].value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_target_branch_yields_nothing() {
        let results = FanOutRouter::query_all(branches(), Some("absent"), |branch| async move {
            Ok::<u32, String>(branch.target)
        })
        .await;

        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn all_branches_failing_yields_empty_not_error() {
        let results: Vec<BranchResult<u32>> =
            FanOutRouter::query_all(branches(), None, |_branch| async move {
                Err::<u32, String>("down".to_string())
            })
            .await;

        assert!(results.is_empty());
    }
}
