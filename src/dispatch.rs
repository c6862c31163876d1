use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use log::{error, info};

use crate::api::Forum;
use crate::liker::{process_account, AccountReport};
use crate::types::*;

#[derive(Debug, thiserror::Error)]
pub(crate) enum TaskFault {
    #[error("task panicked: {0}")]
    Panicked(String),
}

#[derive(Debug)]
pub(crate) struct TaskOutcome {
    pub username: String,
    pub result: Result<AccountReport, TaskFault>,
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn run_task<F: Forum + ?Sized>(forum: &F, account: &Account, topics: &[TopicId]) -> TaskOutcome {
    let result = catch_unwind(AssertUnwindSafe(|| process_account(forum, account, topics)))
        .map_err(|p| TaskFault::Panicked(panic_message(p)));
    match &result {
        Ok(report) => info!(
            "Finished processing with account {}: {} liked, {} skipped, {} failed",
            report.username, report.liked, report.skipped, report.failed
        ),
        Err(e) => error!("Account {} aborted: {e}", account.username),
    }
    TaskOutcome {
        username: account.username.clone(),
        result,
    }
}

/// Runs one task per account with at most `workers` running at once.
///
/// Returns once every task has finished, with outcomes in account order.
pub(crate) fn dispatch<F: Forum + ?Sized>(
    forum: &F,
    accounts: &[Account],
    topics: &[TopicId],
    workers: usize,
) -> Vec<TaskOutcome> {
    let workers = workers.clamp(1, accounts.len().max(1));
    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel();
    thread::scope(|s| {
        for _ in 0..workers {
            let tx = tx.clone();
            let next = &next;
            s.spawn(move || loop {
                let i = next.fetch_add(1, Ordering::SeqCst);
                let Some(account) = accounts.get(i) else {
                    break;
                };
                // receiver outlives the scope
                let _ = tx.send((i, run_task(forum, account, topics)));
            });
        }
    });
    drop(tx);
    let mut outcomes: Vec<(usize, TaskOutcome)> = rx.into_iter().collect();
    outcomes.sort_by_key(|(i, _)| *i);
    outcomes.into_iter().map(|(_, o)| o).collect()
}
