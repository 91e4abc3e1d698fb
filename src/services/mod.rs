pub mod signer;
mod wordpress;

pub use wordpress::{DraftPayload, DraftReceipt, RemoteSite, WpClient};
