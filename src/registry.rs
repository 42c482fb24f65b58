use std::collections::HashMap;
use std::sync::Arc;

/// A task callable: takes its JSON payload, reports success or failure.
pub type TaskFn = dyn Fn(serde_json::Value) -> anyhow::Result<()> + Send + Sync;

/// Maps task names to callables.
///
/// Stored job payloads reference their callable by name. A payload whose
/// task name is no longer registered cannot be deserialized into a runnable
/// job, which is how stale payloads surface after a task is renamed or
/// removed.
#[derive(Default, Clone)]
pub struct TaskRegistry {
    tasks: HashMap<String, Arc<TaskFn>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, task: F)
    where
        F: Fn(serde_json::Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.tasks.insert(name.to_string(), Arc::new(task));
    }

    pub fn get(&self, name: &str) -> Option<Arc<TaskFn>> {
        self.tasks.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn task_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tasks.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn registered_tasks_are_resolvable_and_callable() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut registry = TaskRegistry::new();
        registry.register("ping", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(registry.contains("ping"));
        assert!(!registry.contains("pong"));

        let task = registry.get("ping").expect("task should resolve");
        task(serde_json::json!({})).expect("task should succeed");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn task_names_are_sorted() {
        let mut registry = TaskRegistry::new();
        registry.register("b_task", |_| Ok(()));
        registry.register("a_task", |_| Ok(()));

        assert_eq!(registry.task_names(), vec!["a_task", "b_task"]);
    }
}
