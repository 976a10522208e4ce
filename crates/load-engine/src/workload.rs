//! Generator and loader contracts implemented by workloads.

use std::fmt;

use crate::error::WorkloadResult;
use crate::metrics::MetricRegistry;
use crate::props::Properties;

/// Produces a finite or infinite sequence of tasks.
///
/// A generator is owned by exactly one producer thread. `init` is called
/// before the first `generate`, `close` once after the last.
pub trait Generator<T>: Send {
    fn init(&mut self, _props: &Properties, _registry: &MetricRegistry) -> WorkloadResult<()> {
        Ok(())
    }

    /// Next task, or `None` once the generator is exhausted.
    fn generate(&mut self) -> WorkloadResult<Option<T>>;

    fn close(&mut self) -> WorkloadResult<()> {
        Ok(())
    }
}

/// Executes tasks. Each loader is bound to one consumer thread for the run.
pub trait Loader<T>: Send {
    fn init(&mut self, _props: &Properties, _registry: &MetricRegistry) -> WorkloadResult<()> {
        Ok(())
    }

    fn run(&mut self, task: T) -> WorkloadResult<()>;

    fn close(&mut self) -> WorkloadResult<()> {
        Ok(())
    }
}

pub type BoxGenerator<T> = Box<dyn Generator<T>>;
pub type BoxLoader<T> = Box<dyn Loader<T>>;

/// Generator backed by a supplier closure.
pub struct FnGenerator<F> {
    supplier: F,
}

impl<F> fmt::Debug for FnGenerator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnGenerator")
    }
}

impl<T, F> Generator<T> for FnGenerator<F>
where
    F: FnMut() -> WorkloadResult<Option<T>> + Send,
{
    fn generate(&mut self) -> WorkloadResult<Option<T>> {
        (self.supplier)()
    }
}

/// Loader backed by a consumer closure.
pub struct FnLoader<F> {
    consumer: F,
}

impl<F> fmt::Debug for FnLoader<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnLoader")
    }
}

impl<T, F> Loader<T> for FnLoader<F>
where
    F: FnMut(T) -> WorkloadResult<()> + Send,
{
    fn run(&mut self, task: T) -> WorkloadResult<()> {
        (self.consumer)(task)
    }
}

/// Wrap a supplier closure as a boxed generator.
pub fn generator_fn<T, F>(supplier: F) -> BoxGenerator<T>
where
    T: 'static,
    F: FnMut() -> WorkloadResult<Option<T>> + Send + 'static,
{
    Box::new(FnGenerator { supplier })
}

/// Wrap a consumer closure as a boxed loader.
pub fn loader_fn<T, F>(consumer: F) -> BoxLoader<T>
where
    T: 'static,
    F: FnMut(T) -> WorkloadResult<()> + Send + 'static,
{
    Box::new(FnLoader { consumer })
}

/// Build `n` workload instances, passing each its index.
pub fn many<W>(n: usize, factory: impl FnMut(usize) -> W) -> Vec<W> {
    (0..n).map(factory).collect()
}
