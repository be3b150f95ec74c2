/*!
 * Core Types
 * Common types used across the render manager
 */

/// Render job identifier, allocated from a monotonic counter and never reused
pub type JobId = u64;

/// Size type for memory accounting (bytes)
pub type Size = usize;
