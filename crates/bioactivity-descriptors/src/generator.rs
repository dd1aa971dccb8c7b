//! Descriptor generator capability.

use async_trait::async_trait;
use bioactivity_common::{DescriptorTable, MoleculeRecord, Result};

/// Common interface for anything that turns molecules into descriptors.
///
/// Implementations must return exactly one row per record, in record order.
/// The column set is not fixed: it is whatever the generator produced.
#[async_trait]
pub trait DescriptorGenerator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Compute descriptors for the whole batch in one invocation.
    async fn generate(&self, records: &[MoleculeRecord]) -> Result<DescriptorTable>;
}
