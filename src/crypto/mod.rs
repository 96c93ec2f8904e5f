pub mod mac;
pub mod signatures;

pub use signatures::{DocumentKeypair, SignatureManager};
