//! Deferred post-read validation callbacks.

use std::rc::Rc;

use crate::error::Error;

/// Consistency check run after the outermost read completes.
pub type ValidationFn = Rc<dyn Fn() -> Result<(), Error>>;

/// Priority-ordered callbacks, drained once per outermost read.
///
/// Higher priorities fire first; callbacks with equal priority fire in
/// registration order.
#[derive(Default)]
pub(crate) struct ValidationQueue {
    entries: Vec<(i32, ValidationFn)>,
}

impl ValidationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, callback: ValidationFn, priority: i32) {
        // insert after equal priorities to keep ties in insertion order
        let pos = self
            .entries
            .iter()
            .position(|(p, _)| *p < priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, (priority, callback));
    }

    /// Invokes every callback in order. The first failure aborts the
    /// drain; the queue is consumed either way.
    pub fn run(self) -> Result<(), Error> {
        for (_, callback) in self.entries {
            callback()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[test]
    fn priority_order_with_stable_ties() {
        let fired = Rc::new(RefCell::new(Vec::new()));
        let mut queue = ValidationQueue::new();

        for (label, priority) in [("a", 3), ("b", 1), ("c", 3), ("d", 2)] {
            let fired = fired.clone();
            queue.register(
                Rc::new(move || {
                    fired.borrow_mut().push(label);
                    Ok(())
                }),
                priority,
            );
        }

        queue.run().expect("callbacks must succeed");
        assert_eq!(
            *fired.borrow(),
            vec!["a", "c", "d", "b"],
            "higher priority first, ties in registration order"
        );
    }

    #[test]
    fn failure_aborts_the_drain() {
        let fired = Rc::new(RefCell::new(0u32));
        let mut queue = ValidationQueue::new();

        {
            let fired = fired.clone();
            queue.register(
                Rc::new(move || {
                    *fired.borrow_mut() += 1;
                    Err(Error::InvalidObject("broken".to_owned()))
                }),
                2,
            );
        }
        {
            let fired = fired.clone();
            queue.register(
                Rc::new(move || {
                    *fired.borrow_mut() += 1;
                    Ok(())
                }),
                1,
            );
        }

        assert!(queue.run().is_err());
        assert_eq!(*fired.borrow(), 1, "later callbacks must not run");
    }
}
