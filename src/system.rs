//! System trait and capability descriptors

use crate::error::Result;
use crate::World;

/// Execute capability: how often and in which priority bucket a system runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteSpec {
    /// Run on ticks where the per-system counter is a multiple of this.
    /// Must be positive; zero is treated as one.
    pub frequency: u32,

    /// Bucket ordering; lower runs first
    pub priority: i32,
}

/// Capabilities a system declares, at most one of each kind
#[derive(Debug, Clone)]
pub struct SystemDescriptor {
    pub name: &'static str,
    pub init: bool,
    pub execute: Option<ExecuteSpec>,
    pub end: bool,
}

impl SystemDescriptor {
    /// Descriptor with no capabilities
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            init: false,
            execute: None,
            end: false,
        }
    }

    pub fn with_init(mut self) -> Self {
        self.init = true;
        self
    }

    pub fn with_execute(mut self, frequency: u32, priority: i32) -> Self {
        self.execute = Some(ExecuteSpec {
            frequency,
            priority,
        });
        self
    }

    pub fn with_end(mut self) -> Self {
        self.end = true;
        self
    }

    /// Bucket ordering key; systems without an execute capability sort at 0.
    pub(crate) fn priority(&self) -> i32 {
        self.execute.map_or(0, |spec| spec.priority)
    }
}

/// A unit of work driven by the scheduler.
///
/// Bodies run with a shared `&World`; structural mutation goes through the
/// world's interior locking. A returned error is delivered to the error sink
/// and never cancels sibling systems.
pub trait System: Send + Sync + 'static {
    /// Declared capabilities
    fn descriptor(&self) -> SystemDescriptor;

    /// Runs once, before the first tick
    fn init(&mut self, world: &World) -> Result<()> {
        let _ = world;
        Ok(())
    }

    /// Runs on ticks selected by the execute frequency
    fn execute(&mut self, world: &World) -> Result<()> {
        let _ = world;
        Ok(())
    }

    /// Runs once, at dispose
    fn end(&mut self, world: &World) -> Result<()> {
        let _ = world;
        Ok(())
    }
}

/// Boxed system
pub type BoxedSystem = Box<dyn System>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_builder() {
        let desc = SystemDescriptor::new("movement")
            .with_init()
            .with_execute(5, -1);
        assert!(desc.init);
        assert!(!desc.end);
        assert_eq!(
            desc.execute,
            Some(ExecuteSpec {
                frequency: 5,
                priority: -1
            })
        );
        assert_eq!(desc.priority(), -1);
    }

    #[test]
    fn test_priority_defaults_to_zero_without_execute() {
        let desc = SystemDescriptor::new("startup").with_init();
        assert_eq!(desc.priority(), 0);
    }
}
