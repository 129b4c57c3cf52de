//! Fan a single change stream out to several processors.

use async_trait::async_trait;

use crate::change::Change;
use crate::error::IngestError;
use crate::processor::ChangeProcessor;

/// Runs a set of processors over the same change stream, in registration
/// order. Each processor owns disjoint tables, so no coordination is needed
/// between them.
pub struct ProcessorGroup {
    processors: Vec<Box<dyn ChangeProcessor>>,
}

impl ProcessorGroup {
    pub fn new() -> Self {
        Self { processors: vec![] }
    }

    /// Register a processor.
    pub fn push(&mut self, processor: Box<dyn ChangeProcessor>) {
        self.processors.push(processor);
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

impl Default for ProcessorGroup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChangeProcessor for ProcessorGroup {
    fn name(&self) -> &'static str {
        "processors.ProcessorGroup"
    }

    async fn process_change(&mut self, change: Change) -> Result<(), IngestError> {
        for processor in &mut self.processors {
            processor.process_change(change.clone()).await?;
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), IngestError> {
        for processor in &mut self.processors {
            let name = processor.name();
            processor.commit().await.map_err(|e| IngestError::Commit {
                processor: name,
                source: Box::new(e),
            })?;
        }
        Ok(())
    }
}
