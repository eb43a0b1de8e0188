pub mod request;
pub mod response;
pub mod server;

pub use request::{FormValue, Request};
pub use response::Response;
pub use server::Server;
