pub mod classifier;
pub mod errors;
pub mod events;
pub mod messenger;
pub mod normalize;
pub mod order;
pub mod ports;
pub mod verification;
