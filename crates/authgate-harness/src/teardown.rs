//! Guaranteed, reverse-order release of scenario resources.
//!
//! Every resource is registered right after it is acquired. Actions run
//! last-in first-out, either through [`Teardown::run`] or, if the owner
//! unwinds or returns early, from `Drop`. A failing action never stops the
//! ones after it.

use authgate_common::error::{HarnessError, Result};

type Action = Box<dyn FnOnce() -> Result<()> + Send>;

/// LIFO stack of cleanup actions.
#[derive(Default)]
pub struct Teardown {
    actions: Vec<(String, Action)>,
}

impl Teardown {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `action` to run during teardown.
    pub fn defer<F>(&mut self, label: impl Into<String>, action: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let label = label.into();
        tracing::trace!(label = %label, "deferred cleanup");
        self.actions.push((label, Box::new(action)));
    }

    /// Number of pending actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether no actions are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Labels of pending actions in the order they will run.
    #[must_use]
    pub fn pending(&self) -> Vec<&str> {
        self.actions.iter().rev().map(|(l, _)| l.as_str()).collect()
    }

    /// Runs every pending action, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Cleanup`] carrying every failure, after all
    /// actions have been attempted.
    pub fn run(&mut self) -> Result<()> {
        let failures = self.drain();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(HarnessError::Cleanup { failures })
        }
    }

    fn drain(&mut self) -> Vec<HarnessError> {
        let mut failures = Vec::new();
        while let Some((label, action)) = self.actions.pop() {
            match action() {
                Ok(()) => tracing::debug!(label = %label, "cleanup done"),
                Err(e) => {
                    tracing::warn!(label = %label, error = %e, "cleanup failed");
                    failures.push(e);
                }
            }
        }
        failures
    }
}

impl std::fmt::Debug for Teardown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Teardown")
            .field("pending", &self.pending())
            .finish()
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        if !self.actions.is_empty() {
            tracing::debug!(pending = self.actions.len(), "running teardown from drop");
            let _ = self.drain();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Action) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |name: &'static str| -> Action {
            let sink = Arc::clone(&sink);
            Box::new(move || {
                sink.lock().unwrap().push(name);
                Ok(())
            })
        };
        (log, make)
    }

    #[test]
    fn runs_in_reverse_order() {
        let (log, make) = recorder();
        let mut teardown = Teardown::new();
        teardown.defer("fixture", make("fixture"));
        teardown.defer("registry", make("registry"));
        teardown.defer("image", make("image"));
        assert_eq!(teardown.pending(), vec!["image", "registry", "fixture"]);

        teardown.run().unwrap();
        assert!(teardown.is_empty());
        assert_eq!(*log.lock().unwrap(), vec!["image", "registry", "fixture"]);
    }

    #[test]
    fn failures_do_not_stop_later_actions() {
        let (log, make) = recorder();
        let mut teardown = Teardown::new();
        teardown.defer("first", make("first"));
        teardown.defer("broken", || {
            Err(HarnessError::Config {
                message: "boom".into(),
            })
        });
        teardown.defer("last", make("last"));

        let err = teardown.run().unwrap_err();
        assert!(matches!(&err, HarnessError::Cleanup { failures } if failures.len() == 1));
        assert_eq!(*log.lock().unwrap(), vec!["last", "first"]);
    }

    #[test]
    fn drop_runs_pending_actions() {
        let (log, make) = recorder();
        {
            let mut teardown = Teardown::new();
            teardown.defer("a", make("a"));
            teardown.defer("b", make("b"));
        }
        assert_eq!(*log.lock().unwrap(), vec!["b", "a"]);
    }

    #[test]
    fn panic_still_releases_resources() {
        let (log, make) = recorder();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut teardown = Teardown::new();
            teardown.defer("registry", make("registry"));
            panic!("step failed");
        }));
        assert!(result.is_err());
        assert_eq!(*log.lock().unwrap(), vec!["registry"]);
    }

    #[test]
    fn run_twice_is_a_no_op() {
        let (log, make) = recorder();
        let mut teardown = Teardown::new();
        teardown.defer("once", make("once"));
        teardown.run().unwrap();
        teardown.run().unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
    }
}
