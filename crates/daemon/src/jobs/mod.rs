// Bundled job modules
// Loaded in this order at startup; each one only registers handles.

mod queues;
mod workers;

use processor_core::application::JobModule;

pub fn modules() -> Vec<JobModule> {
    vec![
        queues::hello(),
        queues::basic(),
        workers::hello(),
        workers::basic(),
    ]
}
