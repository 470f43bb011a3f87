pub mod collector;
pub mod record;
pub mod stats;
pub mod sync;
