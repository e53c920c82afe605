pub mod auth;
pub mod config;
pub mod extractors;
pub mod lex;
pub mod logging;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod seed;
pub mod state;
pub mod store;
pub mod workers;
