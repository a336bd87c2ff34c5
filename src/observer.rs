use crate::context::Context;
use crate::Result;

pub(crate) type Handler<V> = Box<dyn FnOnce(Result<V>) + Send + 'static>;

/// A handler paired with the context it must run on.
pub(crate) struct Observer<V> {
    handler: Handler<V>,
    context: Context,
}

impl<V: Send + 'static> Observer<V> {
    pub(crate) fn new(context: Context, handler: Handler<V>) -> Self {
        Self { handler, context }
    }

    /// Submits the handler, with `result`, to the observer's context.
    pub(crate) fn report(self, result: Result<V>) {
        let handler = self.handler;
        self.context.execute(Box::new(move || handler(result)));
    }
}
