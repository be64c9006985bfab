pub mod config;
pub mod dispatcher;
pub mod intake;
pub mod logging;
pub mod routes;
pub mod state;

pub use dispatcher::spawn_dispatcher;
pub use intake::{IntakeError, IntakeService, Submission};
pub use routes::router;
pub use state::AppState;
