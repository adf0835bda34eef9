// Processor Infrastructure - Redis Broker Adapter
// Implements: Broker, QueueHandle, WorkerHandle over Redis lists
//
// Keys per queue (`{prefix}:{name}:...`):
//   wait      - LPUSH by producers, BRPOP by workers
//   id        - INCR job id counter
//   completed - INCR completed counter
//   failed    - LPUSH of jobs that exhausted their attempts

mod broker;
mod connection;
mod keys;
mod queue;
mod worker;

pub use broker::RedisBroker;
pub use connection::{connection_info, verify_connection};
pub use keys::QueueKeys;
pub use queue::RedisQueue;
pub use worker::RedisWorker;
