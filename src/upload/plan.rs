use thiserror::Error;

use crate::models::Clipping;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("chunk size must be a positive integer")]
    ZeroChunkSize,
}

/// Contiguous run of clippings sent in one request. `index` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadBatch<'a> {
    pub index: usize,
    pub clippings: &'a [Clipping],
}

/// Partition `clippings` into batches of exactly `chunk_size`, the last one
/// possibly shorter.
pub fn plan(clippings: &[Clipping], chunk_size: usize) -> Result<Vec<UploadBatch<'_>>, PlanError> {
    if chunk_size == 0 {
        return Err(PlanError::ZeroChunkSize);
    }
    Ok(clippings
        .chunks(chunk_size)
        .enumerate()
        .map(|(i, chunk)| UploadBatch {
            index: i + 1,
            clippings: chunk,
        })
        .collect())
}
