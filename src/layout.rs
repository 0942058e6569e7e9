//! Replica layout and deterministic stream distribution.
//!
//! Each replica process owns one sequential reader over the full record
//! stream and keeps only the positions assigned to it. Assignment is a pure
//! function of stream position, so a restarted replica re-selects the exact
//! same subsequence.

use crate::errors::PipelineError;

/// Descriptor of how many replicas exist and which one this process is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    replica_index: usize,
    num_replicas: usize,
}

impl Layout {
    /// Validate and build a layout.
    ///
    /// Fails with `InvalidLayout` when `num_replicas` is zero or
    /// `replica_index` is not in `[0, num_replicas)`.
    pub fn new(replica_index: usize, num_replicas: usize) -> Result<Self, PipelineError> {
        if num_replicas == 0 || replica_index >= num_replicas {
            return Err(PipelineError::InvalidLayout {
                replica_index,
                num_replicas,
            });
        }
        Ok(Self {
            replica_index,
            num_replicas,
        })
    }

    /// Index of this replica within the layout.
    pub fn replica_index(&self) -> usize {
        self.replica_index
    }

    /// Total number of replicas in the layout.
    pub fn num_replicas(&self) -> usize {
        self.num_replicas
    }

    /// True when global stream position `position` belongs to this replica.
    pub fn owns(&self, position: usize) -> bool {
        position % self.num_replicas == self.replica_index
    }
}

/// Lazily restrict `iter` to the positions owned by `layout`.
///
/// Element `i` of the input is emitted iff `i % num_replicas ==
/// replica_index`, so the per-replica subsequences of a layout partition the
/// input index set with no overlap and no gap. Works on unbounded streams and
/// never buffers.
pub fn distribute<I>(iter: I, layout: Layout) -> Distribute<I::IntoIter>
where
    I: IntoIterator,
{
    Distribute {
        inner: iter.into_iter(),
        layout,
        position: 0,
    }
}

/// Iterator adapter produced by [`distribute`].
#[derive(Debug)]
pub struct Distribute<I> {
    inner: I,
    layout: Layout,
    position: usize,
}

impl<I: Iterator> Iterator for Distribute<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        loop {
            let item = self.inner.next()?;
            let position = self.position;
            self.position += 1;
            if self.layout.owns(position) {
                return Some(item);
            }
        }
    }
}
