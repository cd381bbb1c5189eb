pub mod archive;
pub mod error;
pub mod intake;
pub mod middleware;
pub mod opponents;
pub mod publish;
pub mod review;
pub mod routes;
pub mod state;
pub mod submissions;

pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, AppStateInner};
