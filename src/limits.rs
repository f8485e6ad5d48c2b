/// Default worker count for CPU-bound batches: one per CPU.
pub fn cpu_workers() -> usize {
    num_cpus::get().max(1)
}

/// Default worker count for I/O-bound batches.
/// - x64 the number of CPUs; workers mostly wait on the network
/// - cap is 4096
pub fn io_workers() -> usize {
    num_cpus::get().saturating_mul(64).clamp(1, 4096)
}

const MIN_RESULT_BUFFER: usize = 256;
const MAX_RESULT_BUFFER: usize = 16_384;

/// Result channel capacity: room for four completions per worker slot.
pub fn compute_channel_size(slots: usize) -> usize {
    slots
        .saturating_mul(4)
        .clamp(MIN_RESULT_BUFFER, MAX_RESULT_BUFFER)
}
