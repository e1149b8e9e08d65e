mod flow;
mod server;

pub use flow::*;
pub use server::*;
