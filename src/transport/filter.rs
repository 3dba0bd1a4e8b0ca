//! Bidirectional byte transformer interposed between a Transport's socket
//! and its buffers.

/// Result of a filter transform step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStatus {
    Ok,
    NeedMore,
    Error,
}

/// A bidirectional byte transformer. Transformers may short-read, in which
/// case callers fall back to a pass-through that consumes the rest of the
/// chunk, up to `usize::MAX` bytes.
pub trait Filter {
    fn transform_input(&mut self, input: &[u8], output: &mut Vec<u8>) -> FilterStatus;
    fn transform_output(&mut self, input: &[u8], output: &mut Vec<u8>) -> FilterStatus;
}

/// Identity filter: used where a layer (e.g. plain TCP) needs a `Filter`
/// implementation but performs no transformation.
pub struct PassThrough;

impl Filter for PassThrough {
    fn transform_input(&mut self, input: &[u8], output: &mut Vec<u8>) -> FilterStatus {
        output.extend_from_slice(&input[..input.len().min(usize::MAX)]);
        FilterStatus::Ok
    }

    fn transform_output(&mut self, input: &[u8], output: &mut Vec<u8>) -> FilterStatus {
        output.extend_from_slice(input);
        FilterStatus::Ok
    }
}
