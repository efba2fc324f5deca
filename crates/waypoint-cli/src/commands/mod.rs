pub mod interpolate;
pub mod resolve;
pub mod routes;
