// Job Modules
// A named loader whose only required effect is registering queues/workers.

use crate::application::registry::Registry;
use crate::error::Result;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type Loader = Box<dyn FnOnce(Arc<Registry>) -> BoxFuture<'static, Result<()>> + Send>;

/// A job-definition module, loaded once during start-up
pub struct JobModule {
    name: String,
    loader: Loader,
}

impl JobModule {
    /// Module with an async loader
    pub fn new<F, Fut>(name: impl Into<String>, loader: F) -> Self
    where
        F: FnOnce(Arc<Registry>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            loader: Box::new(move |registry| loader(registry).boxed()),
        }
    }

    /// Module whose registration is fully synchronous
    pub fn from_fn<F>(name: impl Into<String>, register: F) -> Self
    where
        F: FnOnce(&Registry) -> Result<()> + Send + 'static,
    {
        Self::new(name, move |registry: Arc<Registry>| async move { register(&registry) })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the loader against `registry`
    pub async fn load(self, registry: Arc<Registry>) -> Result<()> {
        (self.loader)(registry).await
    }
}

impl fmt::Debug for JobModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobModule").field("name", &self.name).finish()
    }
}
