pub mod discord;
pub mod memory;
pub mod transport;

pub use discord::DiscordClient;
pub use memory::{MemoryTransport, SentRecord};
pub use transport::{ChannelSender, DirectSender, TransportError};
