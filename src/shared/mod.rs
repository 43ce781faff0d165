pub mod ids;
pub mod models;
pub mod retry;
pub mod state;
