/// Observer for reporting incremental progress while pair batches are processed.
///
/// Callbacks run on the orchestrating thread between batches, never from rayon workers.
pub trait ScreenProgressObserver {
    fn on_start(&mut self, total_batches: usize) {
        let _ = total_batches;
    }
    fn on_batch_finished(&mut self, completed_batches: usize, records_kept: usize) {
        let _ = (completed_batches, records_kept);
    }
    fn on_finish(&mut self) {}
}

#[derive(Default)]
pub struct NoopScreenProgress;

impl ScreenProgressObserver for NoopScreenProgress {}
