//! Coroutine-side entry: starting and continuing a coroutine processor

use tracing::debug;

use super::{LoopExit, Processor};
use crate::diagnostics::PerformanceCounter;
use crate::error::{Result, ScriptError};
use crate::value::{normalize_args, Value};

impl Processor {
    /// Start or continue this coroutine's execution
    ///
    /// The first resume calls the coroutine's function with `args`. Later
    /// resumes push `args` where the pending yield expects its result and
    /// continue at the saved instruction pointer. When the function returns or
    /// fails, the stacks are emptied; the caller marks the coroutine dead.
    pub(crate) fn resume(&mut self, args: &[Value]) -> Result<LoopExit> {
        self.enter_processor()?;
        let stopwatch = self.shared.stats.start_stopwatch(PerformanceCounter::Resume);

        let result = self.resume_from_saved_point(args);
        match &result {
            Ok(LoopExit::Yielded { resume_at, .. }) => self.saved_ip = Some(*resume_at),
            Ok(LoopExit::Returned(_)) | Err(_) => {
                self.value_stack.clear();
                self.execution_stack.clear();
                self.saved_ip = None;
            }
        }

        drop(stopwatch);
        self.leave_processor();

        result
    }

    fn resume_from_saved_point(&mut self, args: &[Value]) -> Result<LoopExit> {
        let entry = match self.saved_ip.take() {
            Some(ip) => {
                debug!(processor = %self.id, ip, "continue coroutine");
                self.push(Value::from_values(normalize_args(args)))?;
                ip
            }
            None => {
                let function = self.entry.take().ok_or(ScriptError::CoroutineDead)?;
                debug!(processor = %self.id, function = function.function, "start coroutine");
                self.push_host_frame(Some(&Value::Closure(function)), args)?
            }
        };

        self.processing_loop(entry)
    }
}
