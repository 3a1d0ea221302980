//! 공통 타입 정의.

pub mod level;

pub use level::Level;
