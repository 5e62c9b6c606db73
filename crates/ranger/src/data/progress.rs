/// Snapshot of an ordered fetch, reported after every committed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    /// Bytes written to the sink so far, in plan order.
    pub bytes_committed: u64,

    /// Sum of every chunk length in the plan.
    pub total_bytes: u64,

    /// Chunks written to the sink so far.
    pub chunks_committed: usize,

    /// Number of chunks in the plan.
    pub total_chunks: usize,
}

impl Progress {
    /// Completion percentage in `0.0..=100.0`; an empty plan counts as complete.
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        (self.bytes_committed as f64 / self.total_bytes as f64) * 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.chunks_committed == self.total_chunks
    }
}
