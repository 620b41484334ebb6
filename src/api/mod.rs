pub mod extract;
pub mod models;
pub mod response;
pub mod routes;
