pub mod clock;
pub mod messenger;
pub mod rate_limiter;
