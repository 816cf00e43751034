pub mod carrier;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod labels;
pub mod middleware;
pub mod pre_postings;
pub mod print_queue;
pub mod routes;

pub use routes::create_router;
