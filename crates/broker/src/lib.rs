//! Topic-routed message broker: exchange, connection handle, and the
//! command/notification publish contract.
//!
//! The routing-key contract is asymmetric by design and must stay that
//! way: status notifications are per-file addressable
//! (`{file_id}.{event}`, matched broker-side with `{file_id}.*`), while
//! control commands use a small set of fixed keys and leave per-file
//! filtering to the consumer via the in-payload `file_id`. One queue
//! serves all files on the command side; many observers per file on the
//! notification side.

pub mod connection;
pub mod exchange;
pub mod messages;
pub mod publisher;
pub mod routing;

pub use connection::{Broker, BrokerError, Connect, Local, Unreachable};
pub use exchange::{Delivery, Exchange, Subscription};
pub use messages::{Command, Notification, Progression, COMMAND_KEYS};
pub use publisher::{OnFailure, TaskPublisher};
