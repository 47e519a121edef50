//! Per-frame callbacks.

use scene::Scene;
use tracing::warn;

/// Handle returned by [`TickScheduler::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickId(u64);

/// Tick callback. Receives the scene and the milliseconds since the previous
/// frame.
pub type TickFn = dyn FnMut(&mut Scene, f64) -> anyhow::Result<()>;

/// Tick callbacks in registration order.
#[derive(Default)]
pub struct TickScheduler {
    next_id: u64,
    ticks: Vec<(TickId, Box<TickFn>)>,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&mut self, tick: F) -> TickId
    where
        F: FnMut(&mut Scene, f64) -> anyhow::Result<()> + 'static,
    {
        self.next_id += 1;
        let id = TickId(self.next_id);
        self.ticks.push((id, Box::new(tick)));
        id
    }

    /// Idempotent; returns whether the tick was registered.
    pub fn remove(&mut self, id: TickId) -> bool {
        let before = self.ticks.len();
        self.ticks.retain(|(t, _)| *t != id);
        self.ticks.len() != before
    }

    /// Run every tick once. A failing tick is logged and the rest still run.
    /// Returns the number of failures.
    pub fn run(&mut self, scene: &mut Scene, delta_ms: f64) -> usize {
        let mut failed = 0;
        for (id, tick) in &mut self.ticks {
            if let Err(e) = tick(scene, delta_ms) {
                failed += 1;
                warn!(tick = ?id, error = %e, "tick failed");
            }
        }
        failed
    }

    pub fn clear(&mut self) {
        self.ticks.clear();
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }
}

impl std::fmt::Debug for TickScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickScheduler").field("ticks", &self.ticks.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use text::TextSystem;

    #[test]
    fn test_failing_tick_does_not_stop_others() {
        let mut scene = Scene::new(Rc::new(TextSystem::monospace()));
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut ticks = TickScheduler::new();

        let l = log.clone();
        ticks.add(move |_, _| {
            l.borrow_mut().push("first");
            anyhow::bail!("broken tick")
        });
        let l = log.clone();
        ticks.add(move |scene, dt| {
            l.borrow_mut().push("second");
            assert_eq!(dt, 16.0);
            scene.create_container("from tick");
            Ok(())
        });

        assert_eq!(ticks.run(&mut scene, 16.0), 1);
        assert_eq!(*log.borrow(), vec!["first", "second"]);
        assert_eq!(scene.len(), 2);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut ticks = TickScheduler::new();
        let id = ticks.add(|_, _| Ok(()));
        assert!(ticks.remove(id));
        assert!(!ticks.remove(id));
        assert!(ticks.is_empty());
    }
}
