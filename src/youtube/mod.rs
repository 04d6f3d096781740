pub mod auth;
pub mod errors;
pub mod innertube;
pub mod transport;
