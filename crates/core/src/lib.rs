pub mod audit;
pub mod auth;
pub mod challenge;
pub mod error;
pub mod ip_pool;
pub mod password;
pub mod peer_client;
pub mod releaser;
pub mod revoker;
pub mod session;
pub mod token;
pub mod totp;
pub mod user;

pub use auth::AuthService;
pub use error::{CoreError, CoreResult};
pub use peer_client::PeerClient;
pub use session::SessionService;
pub use token::JwtManager;
